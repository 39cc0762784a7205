//! Promotion Pipeline - Short-term overflow into the long-term model
//!
//! While an owner holds more than `short_term_max_count` short-term
//! memories, the oldest `promotion_batch_size` are handed to the text
//! generator together with the current long-term model. The rewrite
//! replaces the model; only then is the batch deleted.
//!
//! A `PendingPromotion` is written before the model and cleared after the
//! batch is gone. If the delete fails, the next run finds the marker, sees
//! the stored model already matches it, and finishes the delete instead of
//! folding the same batch in twice.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::config::MemoryConfig;
use crate::domain::entities::{CognitiveModel, MemoryItem};
use crate::domain::errors::DomainError;
use crate::ports::{
    ChatMessage, CompletionOptions, MemoryStatus, StatusObserver, TextGenerator,
};
use crate::services::prompts;
use crate::services::short_term::ShortTermMemoryStore;
use crate::services::tables::{MemoryTables, PendingPromotion};

/// How a promotion run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromotionOutcome {
    /// The store was within bounds; nothing was promoted
    NotNeeded,
    /// One or more cycles ran and the store is back within bounds
    Drained,
    /// A cycle failed; its batch is still in the store
    Failed { reason: String },
    /// The cycle cap was hit with backlog remaining
    CapReached,
}

/// Result of one `maybe_promote` run
#[derive(Debug, Clone, Serialize)]
pub struct PromotionReport {
    pub owner_id: String,
    /// Successful cycles
    pub cycles: usize,
    /// Ids of promoted (and deleted) short-term memories, oldest first
    pub promoted_ids: Vec<String>,
    pub outcome: PromotionOutcome,
}

impl PromotionReport {
    fn new(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            cycles: 0,
            promoted_ids: Vec::new(),
            outcome: PromotionOutcome::NotNeeded,
        }
    }

    fn settled(&self) -> PromotionOutcome {
        if self.cycles == 0 && self.promoted_ids.is_empty() {
            PromotionOutcome::NotNeeded
        } else {
            PromotionOutcome::Drained
        }
    }
}

/// Compacts short-term overflow into the long-term cognitive model
pub struct PromotionPipeline {
    short_term: Arc<ShortTermMemoryStore>,
    tables: MemoryTables,
    generator: Arc<dyn TextGenerator>,
    observer: Arc<dyn StatusObserver>,
}

impl PromotionPipeline {
    pub fn new(
        short_term: Arc<ShortTermMemoryStore>,
        tables: MemoryTables,
        generator: Arc<dyn TextGenerator>,
        observer: Arc<dyn StatusObserver>,
    ) -> Self {
        Self {
            short_term,
            tables,
            generator,
            observer,
        }
    }

    /// Promote batches until the owner's short-term store is within bounds,
    /// a cycle fails, or `max_promotion_cycles` is reached.
    pub async fn maybe_promote(&self, owner_id: &str, config: &MemoryConfig) -> PromotionReport {
        let mut report = PromotionReport::new(owner_id);

        if let Err(e) = config.validate() {
            report.outcome = PromotionOutcome::Failed {
                reason: e.to_string(),
            };
            return report;
        }

        match self.resume_pending(owner_id).await {
            Ok(ids) => report.promoted_ids.extend(ids),
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Could not finish interrupted promotion");
                report.outcome = PromotionOutcome::Failed {
                    reason: e.to_string(),
                };
                return report;
            }
        }

        loop {
            let count = match self.short_term.count(owner_id).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(owner_id, error = %e, "Could not count short-term memories");
                    report.outcome = PromotionOutcome::Failed {
                        reason: e.to_string(),
                    };
                    break;
                }
            };

            if count <= config.short_term_max_count {
                report.outcome = report.settled();
                break;
            }

            if report.cycles >= config.max_promotion_cycles {
                tracing::warn!(
                    owner_id,
                    cycles = report.cycles,
                    remaining = count,
                    "Promotion cycle cap reached with backlog remaining"
                );
                self.observer.notify(
                    owner_id,
                    &MemoryStatus::PromotionCapReached {
                        cycles: report.cycles,
                    },
                );
                report.outcome = PromotionOutcome::CapReached;
                break;
            }

            let cycle = report.cycles + 1;
            tracing::info!(owner_id, count, cycle, "Short-term overflow, promoting oldest batch");

            match self.promote_batch(owner_id, config, cycle).await {
                Ok(Some(ids)) => {
                    report.cycles = cycle;
                    report.promoted_ids.extend(ids);
                }
                Ok(None) => {
                    report.outcome = report.settled();
                    break;
                }
                Err(e) => {
                    tracing::warn!(owner_id, cycle, error = %e, "Promotion cycle failed, batch kept");
                    self.observer.notify(
                        owner_id,
                        &MemoryStatus::PromotionFailed {
                            cycle,
                            reason: e.to_string(),
                        },
                    );
                    report.outcome = PromotionOutcome::Failed {
                        reason: e.to_string(),
                    };
                    break;
                }
            }
        }

        report
    }

    /// One cycle. `Ok(None)` when there is nothing to promote.
    async fn promote_batch(
        &self,
        owner_id: &str,
        config: &MemoryConfig,
        cycle: usize,
    ) -> Result<Option<Vec<String>>, DomainError> {
        let batch = self
            .short_term
            .oldest(owner_id, config.promotion_batch_size)
            .await?;
        if batch.is_empty() {
            return Ok(None);
        }

        self.observer.notify(
            owner_id,
            &MemoryStatus::Promoting {
                cycle,
                batch: batch.len(),
            },
        );

        // A failed read must not be mistaken for an absent model, or the
        // rewrite would start from the skeleton and discard the real one.
        let current = match self.tables.load_model_text(owner_id).await? {
            Some(text) => CognitiveModel::from_text(text),
            None => CognitiveModel::skeleton(),
        };

        let rewritten = self.reconstruct(&current, &batch_text(&batch)).await?;
        if rewritten.trim().is_empty() {
            return Err(DomainError::ExternalService(
                "model rewrite returned empty text".to_string(),
            ));
        }

        let pending = PendingPromotion {
            ids: batch.into_iter().map(|item| item.id).collect(),
            model: rewritten,
        };
        self.tables.save_pending(owner_id, &pending).await?;

        if let Err(e) = self.tables.save_model(owner_id, &pending.model).await {
            if let Err(clear) = self.tables.clear_pending(owner_id).await {
                tracing::warn!(owner_id, error = %clear, "Could not clear pending promotion");
            }
            return Err(e);
        }

        let removed = self.short_term.delete_many(&pending.ids, owner_id).await?;
        self.tables.clear_pending(owner_id).await?;
        tracing::info!(
            owner_id,
            cycle,
            promoted = removed,
            model_chars = pending.model.chars().count(),
            "Long-term model rewritten"
        );
        self.observer.notify(
            owner_id,
            &MemoryStatus::Promoted {
                cycle,
                promoted: removed,
            },
        );

        Ok(Some(pending.ids))
    }

    /// Finish a promotion whose batch delete did not land. Returns the ids
    /// removed; a marker whose model was never stored is dropped.
    async fn resume_pending(&self, owner_id: &str) -> Result<Vec<String>, DomainError> {
        let Some(pending) = self.tables.load_pending(owner_id).await? else {
            return Ok(Vec::new());
        };

        let stored = self.tables.load_model_text(owner_id).await?;
        if stored.as_deref() != Some(pending.model.as_str()) {
            tracing::info!(owner_id, "Dropping pending promotion whose model was not stored");
            self.tables.clear_pending(owner_id).await?;
            return Ok(Vec::new());
        }

        let removed = self.short_term.delete_many(&pending.ids, owner_id).await?;
        self.tables.clear_pending(owner_id).await?;
        tracing::info!(owner_id, removed, "Finished interrupted promotion");
        Ok(pending.ids)
    }

    async fn reconstruct(
        &self,
        current: &CognitiveModel,
        new_stimuli: &str,
    ) -> Result<String, DomainError> {
        let (system, user) = prompts::reconstruct_model(current.as_str(), new_stimuli, Utc::now());
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let options = CompletionOptions::default()
            .with_max_tokens(2000)
            .with_temperature(0.7);
        self.generator.generate(&messages, &options).await
    }
}

/// Promotion batch text: each item stamped with its time, separated by a blank line
pub fn batch_text(items: &[MemoryItem]) -> String {
    items
        .iter()
        .map(MemoryItem::stamped_content)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_batch_text_format() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 2, 9, 15, 0).unwrap();
        let items = vec![
            MemoryItem::new("a", "first").with_timestamp(t1),
            MemoryItem::new("a", "second").with_timestamp(t2),
        ];
        assert_eq!(
            batch_text(&items),
            "[2024-01-01 08:00:00] first\n\n[2024-01-02 09:15:00] second"
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(PromotionOutcome::Failed {
            reason: "x".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "failed", "reason": "x"}));
    }
}
