//! Tool Catalog Port
//!
//! The tool subsystem is consumed, not implemented, by the memory core:
//! its definitions are rendered into the prompt and its output is treated
//! as opaque text in the event history.

use async_trait::async_trait;

use crate::domain::entities::ToolOutcome;
use crate::domain::errors::DomainError;

/// Tool collaborator interface
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Tool definitions rendered for prompt assembly
    fn definitions_as_text(&self) -> Result<String, DomainError>;

    /// Execute a tool by name
    async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<ToolOutcome, DomainError>;
}
