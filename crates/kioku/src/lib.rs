//! Kioku Memory Library
//!
//! Bounded working memory for a conversational agent: an append-only event
//! log, a context window kept under budget by evicting old history, and a
//! two-tier memory (short-term summaries, a long-term cognitive model) that
//! evicted history is consolidated into and recalled from.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain/`): Pure entities and values
//!   - `entities/`: Event, MemoryItem, CognitiveModel
//!   - `value_objects/`: EventType, ModelSection, MemorySource
//!   - `errors/`: Domain-specific error types
//!
//! - **Ports** (`ports/`): Abstract interfaces (traits)
//!   - `repositories/`: Key-value storage
//!   - `services/`: Text generation, tool catalog, status observation
//!
//! - **Services** (`services/`): Event log, context builder, short-term
//!   store, promotion pipeline, retrieval scorer, archiver
//!
//! - **Adapters** (`adapters/`): In-process port implementations
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kioku::{Archiver, ContextWindowBuilder, EventLog, InMemoryKvStore, KiokuConfig, MemorySystem};
//!
//! let config = KiokuConfig::from_env()?;
//! let memory = Arc::new(MemorySystem::new(Arc::new(InMemoryKvStore::new()), generator, &config));
//! let (archiver, _worker) = Archiver::start(memory.clone());
//! let builder = ContextWindowBuilder::new(memory, archiver, &config);
//!
//! let mut log = EventLog::new();
//! log.append_user_message("Where did we leave off?");
//! let rendered = builder.build(&mut log, "user-1", &config.memory).await;
//! let reply = generator.generate(&rendered.to_messages(), &Default::default()).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

// Re-export commonly used types
pub use adapters::InMemoryKvStore;
pub use config::{KiokuConfig, MemoryConfig};
pub use domain::{
    CognitiveModel, DomainError, Event, EventPayload, EventType, MemoryItem, MemorySource,
    ModelSection, ToolOutcome,
};
pub use ports::{
    ChannelStatusObserver, ChatMessage, CompletionOptions, CompletionResponse, KvStore,
    MemoryStatus, MessageRole, NoopStatusObserver, StatusObserver, TextGenerator, ToolCatalog,
};
pub use services::{
    ArchiveJob, Archiver, ContextWindowBuilder, EventLog, MemoryStats, MemorySystem,
    MemoryUpdate, PromotionOutcome, PromotionReport, RenderedContext, RetrievalScorer,
    ScoredMemory,
};
