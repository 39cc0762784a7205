//! Service Ports
//!
//! Abstract interfaces for external services.

mod status;
mod text_generator;
mod tool_catalog;

pub use status::*;
pub use text_generator::*;
pub use tool_catalog::*;
