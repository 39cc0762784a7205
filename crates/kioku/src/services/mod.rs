//! Services
//!
//! The memory engine proper: the live event log, context assembly,
//! short-term consolidation, promotion into the long-term model and recall.

pub mod archiver;
pub mod context_builder;
pub mod event_log;
pub mod memory_system;
pub mod promotion;
pub mod prompts;
pub mod retrieval;
pub mod short_term;
pub mod tables;

// Re-exports
pub use archiver::{ArchiveJob, Archiver};
pub use context_builder::{ContextWindowBuilder, RenderedContext};
pub use event_log::{EventLog, EventLogStats};
pub use memory_system::{MemoryStats, MemorySystem, MemoryUpdate};
pub use promotion::{PromotionOutcome, PromotionPipeline, PromotionReport};
pub use retrieval::{apply_threshold, keyword_score, RetrievalScorer, ScoredMemory};
pub use short_term::ShortTermMemoryStore;
pub use tables::{MemoryTables, PendingPromotion};
