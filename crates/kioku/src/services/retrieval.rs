//! Retrieval Scorer - Lexical relevance over short-term and long-term memory
//!
//! Candidates come from the most recent short-term memories and from the
//! paragraphs of the long-term model's Dynamic section. Scoring counts
//! shared Latin words and CJK bigrams/trigrams, with a bonus when the
//! whole query appears verbatim.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MemoryConfig;
use crate::domain::value_objects::MemorySource;
use crate::services::short_term::ShortTermMemoryStore;
use crate::services::tables::MemoryTables;

/// Added when the content contains the full query, case-insensitively
pub const VERBATIM_BONUS: f64 = 0.3;

/// A scored retrieval candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMemory {
    pub score: f64,
    pub content: String,
    pub source: MemorySource,
    /// Creation time for short-term memories; Dynamic paragraphs have none
    pub timestamp: Option<DateTime<Utc>>,
}

/// Query/content terms
#[derive(Debug, Default, PartialEq, Eq)]
struct Terms {
    words: HashSet<String>,
    grams: HashSet<String>,
}

impl Terms {
    fn len(&self) -> usize {
        self.words.len() + self.grams.len()
    }

    fn shared_with(&self, other: &Terms) -> usize {
        self.words.intersection(&other.words).count() + self.grams.intersection(&other.grams).count()
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// ASCII alphabetic runs, lower-cased, plus bigrams and trigrams of every
/// contiguous CJK run of length two or more
fn tokenize(text: &str) -> Terms {
    let mut terms = Terms::default();
    let mut word = String::new();
    let mut run: Vec<char> = Vec::new();

    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_alphabetic() {
            word.push(c.to_ascii_lowercase());
        } else if !word.is_empty() {
            terms.words.insert(std::mem::take(&mut word));
        }

        if is_cjk(c) {
            run.push(c);
        } else if !run.is_empty() {
            push_grams(&run, &mut terms.grams);
            run.clear();
        }
    }

    terms
}

fn push_grams(run: &[char], grams: &mut HashSet<String>) {
    for size in [2, 3] {
        for window in run.windows(size) {
            grams.insert(window.iter().collect());
        }
    }
}

/// Lexical relevance of `content` to `query`.
///
/// `shared terms / query terms`, plus `VERBATIM_BONUS` when the content
/// contains the query verbatim. Zero when the query has no terms or
/// nothing is shared.
pub fn keyword_score(query: &str, content: &str) -> f64 {
    let query_terms = tokenize(query);
    let total = query_terms.len();
    if total == 0 {
        return 0.0;
    }

    let matches = query_terms.shared_with(&tokenize(content));
    if matches == 0 {
        return 0.0;
    }

    let mut score = matches as f64 / total as f64;
    if content.to_lowercase().contains(&query.to_lowercase()) {
        score += VERBATIM_BONUS;
    }
    score
}

/// Keep only candidates at or above `threshold`
pub fn apply_threshold(candidates: Vec<ScoredMemory>, threshold: f64) -> Vec<ScoredMemory> {
    candidates
        .into_iter()
        .filter(|c| c.score >= threshold)
        .collect()
}

/// Ranks memories for a query
pub struct RetrievalScorer {
    short_term: Arc<ShortTermMemoryStore>,
    tables: MemoryTables,
}

impl RetrievalScorer {
    pub fn new(short_term: Arc<ShortTermMemoryStore>, tables: MemoryTables) -> Self {
        Self { short_term, tables }
    }

    /// All non-zero candidates, best first, at most `max_memories_in_context`.
    ///
    /// Ties keep pool order: short-term (most recent first) before Dynamic
    /// paragraphs (document order). An unreadable pool contributes nothing.
    pub async fn ranked(
        &self,
        query: &str,
        owner_id: &str,
        config: &MemoryConfig,
    ) -> Vec<ScoredMemory> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();

        match self.short_term.list(owner_id).await {
            Ok(items) => {
                for item in items.into_iter().take(config.deep_search_limit) {
                    let score = keyword_score(query, &item.content);
                    if score > 0.0 {
                        candidates.push(ScoredMemory {
                            score,
                            content: item.content,
                            source: MemorySource::ShortTerm,
                            timestamp: Some(item.timestamp),
                        });
                    }
                }
            }
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Short-term pool unavailable for retrieval");
            }
        }

        let model = self.tables.load_model(owner_id).await;
        for segment in model.dynamic_segments() {
            let score = keyword_score(query, &segment);
            if score > 0.0 {
                candidates.push(ScoredMemory {
                    score,
                    content: segment,
                    source: MemorySource::LongTermDynamic,
                    timestamp: None,
                });
            }
        }

        // Stable sort keeps pool order for equal scores
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(config.max_memories_in_context);

        tracing::debug!(owner_id, found = candidates.len(), "Retrieved relevant memories");
        candidates
    }

    /// Contents of `ranked`, most relevant first
    pub async fn relevant(&self, query: &str, owner_id: &str, config: &MemoryConfig) -> Vec<String> {
        self.ranked(query, owner_id, config)
            .await
            .into_iter()
            .map(|c| c.content)
            .collect()
    }
}
