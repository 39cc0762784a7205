//! Configuration
//!
//! - `MemoryConfig`: per-call consolidation and retrieval thresholds
//! - `KiokuConfig`: engine settings, loadable from TOML or the environment

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::services::prompts::DEFAULT_PERSONA_PROMPT;

/// Per-invocation memory thresholds
///
/// Every operation takes one of these explicitly; `Default` carries the
/// standard values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Minimum estimated size of an event batch before it is summarized
    #[serde(default = "default_states_token_threshold")]
    pub states_token_threshold: usize,
    /// Short-term memories allowed before promotion kicks in
    #[serde(default = "default_short_term_max_count")]
    pub short_term_max_count: usize,
    /// Short-term memories folded into the long-term model per cycle
    #[serde(default = "default_promotion_batch_size")]
    pub promotion_batch_size: usize,
    /// Minimum score for a memory to be displayed
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
    /// Maximum memories surfaced per query
    #[serde(default = "default_max_memories_in_context")]
    pub max_memories_in_context: usize,
    /// Most-recent short-term memories considered by retrieval
    #[serde(default = "default_deep_search_limit")]
    pub deep_search_limit: usize,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    /// Reserved for embedding similarity; the lexical scorer ignores it
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    /// Safety cap on promotion cycles per trigger
    #[serde(default = "default_max_promotion_cycles")]
    pub max_promotion_cycles: usize,
}

fn default_states_token_threshold() -> usize {
    5000
}

fn default_short_term_max_count() -> usize {
    50
}

fn default_promotion_batch_size() -> usize {
    3
}

fn default_relevance_threshold() -> f64 {
    0.6
}

fn default_max_memories_in_context() -> usize {
    3
}

fn default_deep_search_limit() -> usize {
    20
}

fn default_keyword_weight() -> f64 {
    0.5
}

fn default_vector_weight() -> f64 {
    0.5
}

fn default_max_promotion_cycles() -> usize {
    64
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            states_token_threshold: default_states_token_threshold(),
            short_term_max_count: default_short_term_max_count(),
            promotion_batch_size: default_promotion_batch_size(),
            relevance_threshold: default_relevance_threshold(),
            max_memories_in_context: default_max_memories_in_context(),
            deep_search_limit: default_deep_search_limit(),
            keyword_weight: default_keyword_weight(),
            vector_weight: default_vector_weight(),
            max_promotion_cycles: default_max_promotion_cycles(),
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.promotion_batch_size == 0 {
            return Err(DomainError::Validation(
                "promotion_batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_promotion_cycles == 0 {
            return Err(DomainError::Validation(
                "max_promotion_cycles must be at least 1".to_string(),
            ));
        }
        if self.keyword_weight < 0.0 || self.vector_weight < 0.0 {
            return Err(DomainError::Validation(
                "scoring weights must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KiokuConfig {
    /// Storage key prefix
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Estimated-size budget of the event history, in characters
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,
    /// Flat size charged per tool-result event
    #[serde(default = "default_tool_result_weight")]
    pub tool_result_weight: usize,
    /// System prompt sent with every assembled context
    #[serde(default = "default_persona_prompt")]
    pub persona_prompt: String,
    #[serde(default)]
    pub memory: MemoryConfig,
}

fn default_namespace() -> String {
    "memory_system".to_string()
}

fn default_context_budget() -> usize {
    8000
}

fn default_tool_result_weight() -> usize {
    200
}

fn default_persona_prompt() -> String {
    DEFAULT_PERSONA_PROMPT.to_string()
}

impl Default for KiokuConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            context_budget: default_context_budget(),
            tool_result_weight: default_tool_result_weight(),
            persona_prompt: default_persona_prompt(),
            memory: MemoryConfig::default(),
        }
    }
}

impl KiokuConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: KiokuConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by `KIOKU_*` environment variables (`.env` honoured)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `KIOKU_*` overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(namespace) = lookup("KIOKU_NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(value) = lookup("KIOKU_CONTEXT_BUDGET") {
            self.context_budget = parse_var("KIOKU_CONTEXT_BUDGET", &value)?;
        }
        if let Some(value) = lookup("KIOKU_TOOL_RESULT_WEIGHT") {
            self.tool_result_weight = parse_var("KIOKU_TOOL_RESULT_WEIGHT", &value)?;
        }
        if let Some(value) = lookup("KIOKU_STATES_TOKEN_THRESHOLD") {
            self.memory.states_token_threshold = parse_var("KIOKU_STATES_TOKEN_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("KIOKU_SHORT_TERM_MAX_COUNT") {
            self.memory.short_term_max_count = parse_var("KIOKU_SHORT_TERM_MAX_COUNT", &value)?;
        }
        if let Some(value) = lookup("KIOKU_PROMOTION_BATCH_SIZE") {
            self.memory.promotion_batch_size = parse_var("KIOKU_PROMOTION_BATCH_SIZE", &value)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            anyhow::bail!("namespace must not be empty");
        }
        self.memory.validate()?;
        Ok(())
    }
}

fn parse_var(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a non-negative integer, got {:?}", name, value))
}
