//! Key-Value Store Port
//!
//! Abstract interface for the persistence backend. Memory tables are stored
//! under `{namespace}_{table}_{owner_id}` keys as text values.

use async_trait::async_trait;

use crate::domain::errors::DomainError;

/// Repository interface for namespaced key-value persistence
///
/// `set` must replace the value atomically: a concurrent `get` observes
/// either the previous value or the new one, never a partial write.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value, `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Insert or replace a value
    async fn set(&self, key: &str, value: &str) -> Result<(), DomainError>;

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), DomainError>;
}
