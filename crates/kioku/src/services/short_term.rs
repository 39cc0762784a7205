//! Short-Term Memory Store
//!
//! Archived event batches are compressed into narrative summaries by the
//! text generator and kept per owner until the promotion pipeline folds
//! them into the long-term model.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::MemoryConfig;
use crate::domain::entities::{estimate_events_size, Event, MemoryItem};
use crate::domain::errors::DomainError;
use crate::ports::{ChatMessage, CompletionOptions, TextGenerator};
use crate::services::prompts;
use crate::services::tables::MemoryTables;

/// Per-owner collection of compacted summaries
pub struct ShortTermMemoryStore {
    tables: MemoryTables,
    generator: Arc<dyn TextGenerator>,
    tool_result_weight: usize,
}

impl ShortTermMemoryStore {
    pub fn new(
        tables: MemoryTables,
        generator: Arc<dyn TextGenerator>,
        tool_result_weight: usize,
    ) -> Self {
        Self {
            tables,
            generator,
            tool_result_weight,
        }
    }

    /// Summarize an event batch into a new short-term memory.
    ///
    /// Returns `None` without touching storage when the batch is empty or
    /// below `states_token_threshold` (unless `force`), and `None` after
    /// logging when the summary call fails, comes back blank, or cannot be
    /// stored. Callers do not retry.
    pub async fn ingest(
        &self,
        events: &[Event],
        owner_id: &str,
        config: &MemoryConfig,
        force: bool,
    ) -> Option<MemoryItem> {
        if events.is_empty() {
            return None;
        }

        let size = estimate_events_size(events, self.tool_result_weight);
        if !force && size < config.states_token_threshold {
            tracing::debug!(
                owner_id,
                size,
                threshold = config.states_token_threshold,
                "Event batch below summarization threshold"
            );
            return None;
        }

        tracing::info!(owner_id, events = events.len(), size, "Summarizing event batch");

        let summary = match self.summarize(events).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Summary generation failed, dropping batch");
                return None;
            }
        };
        let summary = summary.trim();
        if summary.is_empty() {
            tracing::warn!(owner_id, "Summary generation returned nothing, dropping batch");
            return None;
        }

        let item = MemoryItem::new(owner_id, summary);
        match self.add(item.clone()).await {
            Ok(()) => {
                tracing::info!(owner_id, memory_id = %item.id, "Short-term memory saved");
                Some(item)
            }
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Short-term memory save failed");
                None
            }
        }
    }

    async fn summarize(&self, events: &[Event]) -> Result<String, DomainError> {
        let events_text = events
            .iter()
            .flat_map(Event::archive_lines)
            .collect::<Vec<_>>()
            .join("\n");
        let messages = [ChatMessage::user(prompts::summarize_events(&events_text))];
        let options = CompletionOptions::default()
            .with_max_tokens(1000)
            .with_temperature(0.7);
        self.generator.generate(&messages, &options).await
    }

    /// Append an item to its owner's table
    pub async fn add(&self, item: MemoryItem) -> Result<(), DomainError> {
        let mut items = self.tables.load_short_term(&item.owner_id).await?;
        let owner_id = item.owner_id.clone();
        items.push(item);
        self.tables.save_short_term(&owner_id, &items).await
    }

    /// All items, most recent first (ties: later insertion first)
    pub async fn list(&self, owner_id: &str) -> Result<Vec<MemoryItem>, DomainError> {
        let mut items = self.tables.load_short_term(owner_id).await?;
        items.reverse();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(items)
    }

    pub async fn count(&self, owner_id: &str) -> Result<usize, DomainError> {
        Ok(self.tables.load_short_term(owner_id).await?.len())
    }

    /// Up to `n` items, oldest first (ties: earlier insertion first)
    pub async fn oldest(&self, owner_id: &str, n: usize) -> Result<Vec<MemoryItem>, DomainError> {
        let mut items = self.tables.load_short_term(owner_id).await?;
        items.sort_by_key(|item| item.timestamp);
        items.truncate(n);
        Ok(items)
    }

    /// The single oldest item
    pub async fn oldest_one(&self, owner_id: &str) -> Result<Option<MemoryItem>, DomainError> {
        Ok(self.oldest(owner_id, 1).await?.into_iter().next())
    }

    /// Delete one item; `false` if it was not present
    pub async fn delete(&self, id: &str, owner_id: &str) -> Result<bool, DomainError> {
        Ok(self.delete_many(&[id.to_string()], owner_id).await? == 1)
    }

    /// Delete a set of items in a single write; returns how many were removed
    pub async fn delete_many(&self, ids: &[String], owner_id: &str) -> Result<usize, DomainError> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let items = self.tables.load_short_term(owner_id).await?;
        let before = items.len();
        let kept: Vec<MemoryItem> = items
            .into_iter()
            .filter(|item| !ids.contains(item.id.as_str()))
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.tables.save_short_term(owner_id, &kept).await?;
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for ShortTermMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortTermMemoryStore")
            .field("tables", &self.tables)
            .field("model", &self.generator.model_id())
            .finish()
    }
}
