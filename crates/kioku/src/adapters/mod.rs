//! Adapters
//!
//! Process-local implementations of the ports. Durable backends live in
//! the kioku-store crate.

mod memory;

pub use memory::InMemoryKvStore;
