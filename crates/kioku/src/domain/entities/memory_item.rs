//! MemoryItem - Short-term storage for an owner
//!
//! Pure domain entity without infrastructure dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::TIMESTAMP_FORMAT;

fn default_strength() -> u32 {
    1
}

/// MemoryItem - A compacted narrative of one archived batch of events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier for the memory
    pub id: String,
    /// The owner (conversation/user partition) this memory belongs to
    pub owner_id: String,
    /// The summary text
    pub content: String,
    /// Reserved for vector scoring; the lexical scorer ignores it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Strength ("hp"), always at least 1
    #[serde(default = "default_strength")]
    pub strength: u32,
    /// When this memory was created
    pub timestamp: DateTime<Utc>,
}

impl MemoryItem {
    /// Create a new memory with generated ID and timestamp
    pub fn new(owner_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: format!("mem_{}", uuid::Uuid::new_v4().simple()),
            owner_id: owner_id.into(),
            content: content.into(),
            embedding: None,
            strength: default_strength(),
            timestamp: Utc::now(),
        }
    }

    /// Set timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `[timestamp] content`, the form used in promotion batches
    pub fn stamped_content(&self) -> String {
        format!("[{}] {}", self.timestamp.format(TIMESTAMP_FORMAT), self.content)
    }
}
