//! MemorySource - Which pool a retrieved memory came from

use serde::{Deserialize, Serialize};

/// Candidate pool of a retrieval result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// A short-term memory item
    ShortTerm,
    /// A paragraph of the long-term model's Dynamic section
    LongTermDynamic,
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemorySource::ShortTerm => write!(f, "short_term"),
            MemorySource::LongTermDynamic => write!(f, "long_term_dynamic"),
        }
    }
}
