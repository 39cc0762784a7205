//! Memory Tables - Key scheme and (de)serialization over `KvStore`
//!
//! Keys are `{namespace}_{table}_{owner_id}`. The short-term table is a JSON
//! array of `MemoryItem`; the long-term table is the raw model text.
//! Unreadable values degrade to an empty default instead of failing.
//!
//! A third table holds at most one `PendingPromotion` per owner: the batch
//! ids and the model text of a promotion whose batch has not been deleted
//! yet.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::entities::{CognitiveModel, MemoryItem};
use crate::domain::errors::DomainError;
use crate::ports::KvStore;

pub const SHORT_TERM_TABLE: &str = "short_term";
pub const LONG_TERM_TABLE: &str = "long_term";
pub const PENDING_PROMOTION_TABLE: &str = "promotion_pending";

/// A promotion whose model write may have landed before its batch was deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPromotion {
    /// Short-term ids folded into `model`
    pub ids: Vec<String>,
    /// The rewritten model text
    pub model: String,
}

/// Namespaced access to the short-term and long-term tables
#[derive(Clone)]
pub struct MemoryTables {
    store: Arc<dyn KvStore>,
    namespace: String,
}

impl MemoryTables {
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn key(&self, table: &str, owner_id: &str) -> String {
        format!("{}_{}_{}", self.namespace, table, owner_id)
    }

    /// All short-term items for an owner, in stored order
    pub async fn load_short_term(&self, owner_id: &str) -> Result<Vec<MemoryItem>, DomainError> {
        let key = self.key(SHORT_TERM_TABLE, owner_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<MemoryItem>>(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!(
                    owner_id,
                    key = %key,
                    error = %e,
                    "Short-term table unreadable, treating as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    pub async fn save_short_term(
        &self,
        owner_id: &str,
        items: &[MemoryItem],
    ) -> Result<(), DomainError> {
        let raw = serde_json::to_string(items)?;
        self.store
            .set(&self.key(SHORT_TERM_TABLE, owner_id), &raw)
            .await
    }

    /// Stored long-term model text, `None` if absent or blank
    pub async fn load_model_text(&self, owner_id: &str) -> Result<Option<String>, DomainError> {
        let raw = self
            .store
            .get(&self.key(LONG_TERM_TABLE, owner_id))
            .await?;
        Ok(raw.filter(|text| !text.trim().is_empty()))
    }

    /// Stored long-term model, or the empty skeleton when absent or unreadable
    pub async fn load_model(&self, owner_id: &str) -> CognitiveModel {
        match self.load_model_text(owner_id).await {
            Ok(Some(text)) => CognitiveModel::from_text(text),
            Ok(None) => CognitiveModel::skeleton(),
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Long-term model unreadable, using skeleton");
                CognitiveModel::skeleton()
            }
        }
    }

    /// Replace the long-term model in a single write
    pub async fn save_model(&self, owner_id: &str, text: &str) -> Result<(), DomainError> {
        self.store
            .set(&self.key(LONG_TERM_TABLE, owner_id), text)
            .await
    }

    /// Unfinished promotion, `None` if absent or unreadable
    pub async fn load_pending(
        &self,
        owner_id: &str,
    ) -> Result<Option<PendingPromotion>, DomainError> {
        let key = self.key(PENDING_PROMOTION_TABLE, owner_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<PendingPromotion>(&raw) {
            Ok(pending) => Ok(Some(pending)),
            Err(e) => {
                tracing::warn!(
                    owner_id,
                    key = %key,
                    error = %e,
                    "Pending promotion unreadable, ignoring"
                );
                Ok(None)
            }
        }
    }

    pub async fn save_pending(
        &self,
        owner_id: &str,
        pending: &PendingPromotion,
    ) -> Result<(), DomainError> {
        let raw = serde_json::to_string(pending)?;
        self.store
            .set(&self.key(PENDING_PROMOTION_TABLE, owner_id), &raw)
            .await
    }

    pub async fn clear_pending(&self, owner_id: &str) -> Result<(), DomainError> {
        self.store
            .delete(&self.key(PENDING_PROMOTION_TABLE, owner_id))
            .await
    }

    /// Delete every table for an owner
    pub async fn clear_owner(&self, owner_id: &str) -> Result<(), DomainError> {
        for table in [SHORT_TERM_TABLE, LONG_TERM_TABLE, PENDING_PROMOTION_TABLE] {
            self.store.delete(&self.key(table, owner_id)).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTables")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
