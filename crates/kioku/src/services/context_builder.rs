//! Context Window Builder - Bounded prompt assembly
//!
//! Renders the live event log together with long-term memory, relevant
//! recalled memories and tool definitions. When the log's estimated size
//! exceeds the budget, the oldest third of the events is evicted and handed
//! to the archiver; the current turn does not wait for it.
//!
//! Section layout:
//!
//! ```text
//! # Today          current date
//! # Tools          tool definitions, or "(tools unavailable)"
//! # Memory         Bedrock + Evolutionary, or "(memory unavailable)"
//! # Recalled       relevant memories above the threshold (omitted if none)
//! # Conversation   rendered history
//! [N earlier events archived to memory]
//! ```

use std::sync::Arc;

use chrono::Utc;

use crate::config::{KiokuConfig, MemoryConfig};
use crate::domain::entities::{Event, EventPayload};
use crate::ports::{ChatMessage, ToolCatalog};
use crate::services::archiver::{ArchiveJob, Archiver};
use crate::services::event_log::EventLog;
use crate::services::memory_system::MemorySystem;
use crate::services::retrieval::apply_threshold;

/// Logs this short are never evicted
pub const MIN_EVICTABLE_EVENTS: usize = 3;

/// Label for the agent's own turns in rendered history
const AGENT_LABEL: &str = "Me";

const EMPTY_HISTORY: &str = "(no conversation history yet)";
const NO_TOOLS: &str = "(no tools available)";
const TOOLS_UNAVAILABLE: &str = "(tools unavailable)";
const NO_LONG_TERM_MEMORY: &str = "(no long-term memory yet)";
const MEMORY_UNAVAILABLE: &str = "(memory unavailable)";

/// Number of events evicted from a log of `len` events that is over budget
pub fn eviction_count(len: usize) -> usize {
    if len <= MIN_EVICTABLE_EVENTS {
        0
    } else {
        (len / 3).max(1)
    }
}

/// Render events as conversation history
pub fn render_history(events: &[Event]) -> String {
    if events.is_empty() {
        return EMPTY_HISTORY.to_string();
    }
    events
        .iter()
        .flat_map(|e| e.payload().render_lines(AGENT_LABEL))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assembled context for one turn
#[derive(Debug, Clone)]
pub struct RenderedContext {
    pub system_prompt: String,
    pub context: String,
    /// Events evicted from the live log during this build
    pub archived: usize,
    /// Whether the evicted events reached the archiver
    pub archive_queued: bool,
    /// Size estimate of the live log after eviction
    pub estimated_size: usize,
}

impl RenderedContext {
    /// `[system(persona), user(context)]`
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(self.context.clone()),
        ]
    }
}

/// Builds bounded contexts from an event log
pub struct ContextWindowBuilder {
    memory: Arc<MemorySystem>,
    archiver: Archiver,
    tools: Option<Arc<dyn ToolCatalog>>,
    context_budget: usize,
    tool_result_weight: usize,
    persona_prompt: String,
}

impl ContextWindowBuilder {
    pub fn new(memory: Arc<MemorySystem>, archiver: Archiver, config: &KiokuConfig) -> Self {
        Self {
            memory,
            archiver,
            tools: None,
            context_budget: config.context_budget,
            tool_result_weight: config.tool_result_weight,
            persona_prompt: config.persona_prompt.clone(),
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolCatalog>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget;
        self
    }

    pub fn context_budget(&self) -> usize {
        self.context_budget
    }

    /// Build the context for the next turn, evicting history if over budget.
    ///
    /// Recall is driven by the most recent user message in the log.
    pub async fn build(
        &self,
        log: &mut EventLog,
        owner_id: &str,
        config: &MemoryConfig,
    ) -> RenderedContext {
        let query = latest_user_message(log);
        self.build_with_query(log, owner_id, config, query.as_deref())
            .await
    }

    /// Like `build`, with an explicit recall query
    pub async fn build_with_query(
        &self,
        log: &mut EventLog,
        owner_id: &str,
        config: &MemoryConfig,
        query: Option<&str>,
    ) -> RenderedContext {
        let (archived, archive_queued) = self.evict_if_needed(log, owner_id, config);

        let mut sections = vec![
            format!("# Today\n{}", Utc::now().format("%Y-%m-%d")),
            format!("# Tools\n{}", self.render_tools()),
            format!("# Memory\n{}", self.render_memory(owner_id).await),
        ];

        if let Some(recalled) = self.render_recalled(query, owner_id, config).await {
            sections.push(format!("# Recalled\n{}", recalled));
        }

        sections.push(format!("# Conversation\n{}", render_history(&log.snapshot())));

        if archived > 0 {
            sections.push(format!("[{} earlier events archived to memory]", archived));
        }

        RenderedContext {
            system_prompt: self.persona_prompt.clone(),
            context: sections.join("\n\n"),
            archived,
            archive_queued,
            estimated_size: log.estimate_size(self.tool_result_weight),
        }
    }

    fn evict_if_needed(
        &self,
        log: &mut EventLog,
        owner_id: &str,
        config: &MemoryConfig,
    ) -> (usize, bool) {
        let size = log.estimate_size(self.tool_result_weight);
        if size <= self.context_budget {
            return (0, false);
        }

        let count = eviction_count(log.len());
        if count == 0 {
            tracing::debug!(
                owner_id,
                size,
                events = log.len(),
                "Over budget but too few events to evict"
            );
            return (0, false);
        }

        let evicted = log.evict_oldest(count);
        let archived = evicted.len();
        tracing::info!(
            owner_id,
            size,
            budget = self.context_budget,
            archived,
            "Context over budget, archiving oldest events"
        );

        let queued = self
            .archiver
            .submit(ArchiveJob::evicted(owner_id, evicted, config.clone()));
        (archived, queued)
    }

    fn render_tools(&self) -> String {
        let Some(tools) = &self.tools else {
            return NO_TOOLS.to_string();
        };
        match tools.definitions_as_text() {
            Ok(text) if text.trim().is_empty() => NO_TOOLS.to_string(),
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Tool definitions unavailable");
                TOOLS_UNAVAILABLE.to_string()
            }
        }
    }

    async fn render_memory(&self, owner_id: &str) -> String {
        match self.memory.base_memory(owner_id).await {
            Ok(text) if text.trim().is_empty() => NO_LONG_TERM_MEMORY.to_string(),
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Long-term memory unavailable");
                MEMORY_UNAVAILABLE.to_string()
            }
        }
    }

    async fn render_recalled(
        &self,
        query: Option<&str>,
        owner_id: &str,
        config: &MemoryConfig,
    ) -> Option<String> {
        let query = query?;
        let ranked = self.memory.ranked_memories(query, owner_id, config).await;
        let recalled = apply_threshold(ranked, config.relevance_threshold);
        if recalled.is_empty() {
            return None;
        }
        Some(
            recalled
                .into_iter()
                .map(|m| format!("- {}", m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

fn latest_user_message(log: &EventLog) -> Option<String> {
    log.snapshot().into_iter().rev().find_map(|e| match e.payload() {
        EventPayload::UserMessage { content } => Some(content.clone()),
        _ => None,
    })
}
