//! Kioku Store
//!
//! Durable `KvStore` backends for the kioku memory engine.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kioku::{KiokuConfig, MemorySystem};
//! use kioku_store::FileKvStore;
//!
//! let store = FileKvStore::open("./data/memory").await?;
//! let memory = MemorySystem::new(Arc::new(store), generator, &KiokuConfig::from_env()?);
//! ```

mod file;

pub use file::FileKvStore;
