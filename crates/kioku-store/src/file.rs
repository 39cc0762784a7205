//! File-backed key-value store
//!
//! One file per key under a root directory. Writes go to a temporary file
//! in the same directory and are renamed into place, so a reader sees
//! either the previous value or the new one, never a partial write.
//!
//! Keys are encoded into file names: ASCII alphanumerics, `_` and `-` are
//! kept, every other byte becomes `%XX`. Encoded names never contain `.`
//! or a path separator, so no key can address a file outside the root.
//!
//! Encoded names longer than `MAX_NAME_LEN` are cut to a readable prefix
//! followed by `~` and the SHA-256 of the key. `~` never appears in a
//! plain encoding, so hashed and plain names cannot collide.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use kioku::ports::KvStore;
use kioku::DomainError;
use sha2::{Digest, Sha256};

/// Longest file name a key maps to. Leaves room under the common 255-byte
/// limit for the `.{pid}.{n}.tmp` suffix of in-flight writes.
const MAX_NAME_LEN: usize = 200;

/// Encoded prefix kept in front of the digest of an over-long key
const HASHED_PREFIX_LEN: usize = 128;

/// `KvStore` persisted to a directory
#[derive(Debug)]
pub struct FileKvStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl FileKvStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, DomainError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error("create store directory", &root, e))?;
        tracing::info!(root = %root.display(), "File store opened");
        Ok(Self {
            root,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!("{}.{}.{}.tmp", encode_key(key), std::process::id(), n))
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), DomainError> {
        let path = self.path_for(key);
        let temp = self.temp_path_for(key);

        if let Err(e) = tokio::fs::write(&temp, value).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(io_error("write", &temp, e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(io_error("replace", &path, e));
        }

        tracing::debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", &path, e)),
        }
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> DomainError {
    tracing::warn!(path = %path.display(), error = %e, "File store {} failed", action);
    DomainError::Repository(format!("failed to {} {}: {}", action, path.display(), e))
}

/// File name for a key
fn encode_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    if name.is_empty() {
        // Empty key
        name.push('%');
    }
    if name.len() > MAX_NAME_LEN {
        // Encoded names are ASCII, so any byte index is a char boundary
        name.truncate(HASHED_PREFIX_LEN);
        name.push('~');
        name.push_str(&hex::encode(Sha256::digest(key.as_bytes())));
    }
    name
}
