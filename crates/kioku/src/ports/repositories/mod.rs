//! Repository Ports
//!
//! Abstract interfaces for data persistence operations.

mod kv_store;

pub use kv_store::*;
