//! Memory System - Facade over the consolidation and retrieval services
//!
//! Writes for one owner (ingestion and the promotion it triggers) are
//! serialized through a per-owner lock; different owners never contend.
//! A lock lives in the table only while some task holds or waits on it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::{KiokuConfig, MemoryConfig};
use crate::domain::entities::{CognitiveModel, Event, MemoryItem};
use crate::domain::errors::DomainError;
use crate::ports::{KvStore, MemoryStatus, NoopStatusObserver, StatusObserver, TextGenerator};
use crate::services::promotion::{PromotionPipeline, PromotionReport};
use crate::services::retrieval::{RetrievalScorer, ScoredMemory};
use crate::services::short_term::ShortTermMemoryStore;
use crate::services::tables::MemoryTables;

/// Result of `update_memory`
#[derive(Debug, Clone, Serialize)]
pub struct MemoryUpdate {
    /// The short-term memory created from the batch, if any
    pub short_term: Option<MemoryItem>,
    /// Promotion run triggered by the new memory, if one was created
    pub promotion: Option<PromotionReport>,
}

/// Per-owner memory counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub short_term_count: usize,
    pub has_long_term_model: bool,
    pub long_term_chars: usize,
    pub dynamic_segments: usize,
}

#[derive(Default)]
struct OwnerLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    async fn for_owner(&self, owner_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(owner_id.to_string())
            .or_default()
            .clone()
    }

    /// Give back a lock from `for_owner`, dropping the entry once unused
    async fn release(&self, owner_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        // Clones are only handed out under the table lock
        if locks
            .get(owner_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(owner_id);
        }
    }
}

/// Entry point for archiving history and recalling memories
pub struct MemorySystem {
    tables: MemoryTables,
    short_term: Arc<ShortTermMemoryStore>,
    promotion: PromotionPipeline,
    retrieval: RetrievalScorer,
    observer: Arc<dyn StatusObserver>,
    owner_locks: OwnerLocks,
}

impl MemorySystem {
    pub fn new(
        store: Arc<dyn KvStore>,
        generator: Arc<dyn TextGenerator>,
        config: &KiokuConfig,
    ) -> Self {
        Self::with_observer(store, generator, config, Arc::new(NoopStatusObserver))
    }

    pub fn with_observer(
        store: Arc<dyn KvStore>,
        generator: Arc<dyn TextGenerator>,
        config: &KiokuConfig,
        observer: Arc<dyn StatusObserver>,
    ) -> Self {
        let tables = MemoryTables::new(store, config.namespace.clone());
        let short_term = Arc::new(ShortTermMemoryStore::new(
            tables.clone(),
            generator.clone(),
            config.tool_result_weight,
        ));
        let promotion = PromotionPipeline::new(
            short_term.clone(),
            tables.clone(),
            generator,
            observer.clone(),
        );
        let retrieval = RetrievalScorer::new(short_term.clone(), tables.clone());

        tracing::info!(namespace = %config.namespace, "Memory system initialized");

        Self {
            tables,
            short_term,
            promotion,
            retrieval,
            observer,
            owner_locks: OwnerLocks::default(),
        }
    }

    pub fn short_term(&self) -> &ShortTermMemoryStore {
        &self.short_term
    }

    pub fn promotion(&self) -> &PromotionPipeline {
        &self.promotion
    }

    pub fn retrieval(&self) -> &RetrievalScorer {
        &self.retrieval
    }

    pub fn observer(&self) -> &Arc<dyn StatusObserver> {
        &self.observer
    }

    /// Summarize an event batch into short-term memory, then promote any overflow.
    pub async fn update_memory(
        &self,
        events: &[Event],
        owner_id: &str,
        config: &MemoryConfig,
        force: bool,
    ) -> MemoryUpdate {
        if events.is_empty() {
            return MemoryUpdate {
                short_term: None,
                promotion: None,
            };
        }

        let lock = self.owner_locks.for_owner(owner_id).await;
        let update = {
            let _guard = lock.lock().await;
            self.update_locked(events, owner_id, config, force).await
        };
        self.owner_locks.release(owner_id, lock).await;
        update
    }

    async fn update_locked(
        &self,
        events: &[Event],
        owner_id: &str,
        config: &MemoryConfig,
        force: bool,
    ) -> MemoryUpdate {
        self.observer.notify(
            owner_id,
            &MemoryStatus::Summarizing {
                events: events.len(),
            },
        );

        let Some(item) = self.short_term.ingest(events, owner_id, config, force).await else {
            self.observer.notify(owner_id, &MemoryStatus::SummarySkipped);
            return MemoryUpdate {
                short_term: None,
                promotion: None,
            };
        };

        self.observer.notify(
            owner_id,
            &MemoryStatus::ShortTermStored {
                id: item.id.clone(),
            },
        );

        let report = self.promotion.maybe_promote(owner_id, config).await;

        MemoryUpdate {
            short_term: Some(item),
            promotion: Some(report),
        }
    }

    /// Relevant memory contents for a query, most relevant first
    pub async fn relevant_memories(
        &self,
        query: &str,
        owner_id: &str,
        config: &MemoryConfig,
    ) -> Vec<String> {
        self.retrieval.relevant(query, owner_id, config).await
    }

    /// Ranked candidates with scores and provenance
    pub async fn ranked_memories(
        &self,
        query: &str,
        owner_id: &str,
        config: &MemoryConfig,
    ) -> Vec<ScoredMemory> {
        self.retrieval.ranked(query, owner_id, config).await
    }

    /// Relevant memories as a JSON array string; empty when there are none
    pub async fn relevant_memories_json(
        &self,
        query: &str,
        owner_id: &str,
        config: &MemoryConfig,
    ) -> String {
        let memories = self.relevant_memories(query, owner_id, config).await;
        if memories.is_empty() {
            return String::new();
        }
        serde_json::to_string(&memories).unwrap_or_default()
    }

    /// Bedrock and Evolutionary sections of the long-term model
    pub async fn base_memory(&self, owner_id: &str) -> Result<String, DomainError> {
        Ok(match self.tables.load_model_text(owner_id).await? {
            Some(text) => CognitiveModel::from_text(text).base_memory(),
            None => String::new(),
        })
    }

    /// The owner's long-term model, or the skeleton
    pub async fn long_term_model(&self, owner_id: &str) -> CognitiveModel {
        self.tables.load_model(owner_id).await
    }

    pub async fn stats(&self, owner_id: &str) -> Result<MemoryStats, DomainError> {
        let short_term_count = self.short_term.count(owner_id).await?;
        let model_text = self.tables.load_model_text(owner_id).await?;
        let model = model_text
            .as_deref()
            .map(CognitiveModel::from_text)
            .unwrap_or_default();

        Ok(MemoryStats {
            short_term_count,
            has_long_term_model: model_text.is_some(),
            long_term_chars: model_text.as_deref().map_or(0, |t| t.chars().count()),
            dynamic_segments: model.dynamic_segments().len(),
        })
    }

    /// Delete all short-term and long-term memory for an owner
    pub async fn clear_owner(&self, owner_id: &str) -> Result<(), DomainError> {
        let lock = self.owner_locks.for_owner(owner_id).await;
        let cleared = {
            let _guard = lock.lock().await;
            self.tables.clear_owner(owner_id).await
        };
        self.owner_locks.release(owner_id, lock).await;
        cleared?;
        tracing::info!(owner_id, "Cleared memories");
        Ok(())
    }
}

impl std::fmt::Debug for MemorySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySystem")
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryKvStore;
    use crate::ports::{ChannelStatusObserver, ChatMessage, CompletionOptions, CompletionResponse};
    use crate::services::event_log::EventLog;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Counting {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _options: &CompletionOptions,
        ) -> Result<CompletionResponse, DomainError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CompletionResponse::new(
                format!("Planned the Kyoto trip, note {n}."),
                "counting",
            ))
        }

        fn model_id(&self) -> &str {
            "counting"
        }
    }

    fn system() -> (Arc<Counting>, MemorySystem) {
        let generator = Arc::new(Counting::default());
        let system = MemorySystem::new(
            Arc::new(InMemoryKvStore::new()),
            generator.clone(),
            &KiokuConfig::default(),
        );
        (generator, system)
    }

    fn events(text: &str) -> Vec<Event> {
        let mut log = EventLog::new();
        log.append_user_message(text);
        log.snapshot()
    }

    #[tokio::test]
    async fn test_empty_batch_returns_before_any_work() {
        let generator = Arc::new(Counting::default());
        let (observer, mut statuses) = ChannelStatusObserver::new();
        let system = MemorySystem::with_observer(
            Arc::new(InMemoryKvStore::new()),
            generator.clone(),
            &KiokuConfig::default(),
            Arc::new(observer),
        );

        let update = system
            .update_memory(&[], "alice", &MemoryConfig::default(), true)
            .await;

        assert!(update.short_term.is_none());
        assert!(update.promotion.is_none());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert!(statuses.try_recv().is_err());
        assert!(system.owner_locks.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_relevant_memories_json_is_empty_without_matches() {
        let (_, system) = system();
        let config = MemoryConfig::default();

        assert_eq!(system.relevant_memories_json("Kyoto", "alice", &config).await, "");
        assert_eq!(system.relevant_memories_json("", "alice", &config).await, "");
    }

    #[tokio::test]
    async fn test_relevant_memories_json_lists_contents() {
        let (_, system) = system();
        let config = MemoryConfig::default();
        system
            .update_memory(&events("We are going to Kyoto."), "alice", &config, true)
            .await;

        let json = system.relevant_memories_json("Kyoto", "alice", &config).await;
        let contents: Vec<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(contents, vec!["Planned the Kyoto trip, note 1.".to_string()]);
    }

    #[tokio::test]
    async fn test_owner_locks_are_released() {
        let (_, system) = system();
        let config = MemoryConfig::default();

        let update = system
            .update_memory(&events("We are going to Kyoto."), "alice", &config, true)
            .await;
        assert!(update.short_term.is_some());
        system.clear_owner("bob").await.unwrap();

        assert!(system.owner_locks.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_lock_kept_while_another_task_holds_it() {
        let (_, system) = system();
        let held = system.owner_locks.for_owner("alice").await;
        let other = system.owner_locks.for_owner("alice").await;
        assert!(Arc::ptr_eq(&held, &other));

        system.owner_locks.release("alice", other).await;
        assert!(system.owner_locks.locks.lock().await.contains_key("alice"));

        system.owner_locks.release("alice", held).await;
        assert!(system.owner_locks.locks.lock().await.is_empty());
    }
}
