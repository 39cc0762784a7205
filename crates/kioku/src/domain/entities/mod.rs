//! Domain Entities
//!
//! Pure domain models without infrastructure dependencies.
//! - Event: One immutable record in the interaction log
//! - MemoryItem: Short-term compacted summary of evicted history
//! - CognitiveModel: Three-layer long-term model, rewritten per promotion

mod cognitive_model;
mod event;
mod memory_item;

pub use cognitive_model::*;
pub use event::*;
pub use memory_item::*;
