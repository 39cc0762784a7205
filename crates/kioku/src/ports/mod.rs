//! Ports (Interfaces)
//!
//! Abstract interfaces that define how the memory core
//! interacts with external collaborators (storage, text generation, tools).
//!
//! Durable implementations live in adapter crates (e.g., kioku-store).

pub mod repositories;
pub mod services;

// Re-exports
pub use repositories::*;
pub use services::*;
