//! Value Objects
//!
//! Immutable objects defined by their attributes rather than identity.

mod event_type;
mod memory_source;
mod model_section;

pub use event_type::*;
pub use memory_source::*;
pub use model_section::*;
