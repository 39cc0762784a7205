//! Shared test doubles for the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use kioku::adapters::InMemoryKvStore;
use kioku::ports::{ChatMessage, CompletionOptions, CompletionResponse, KvStore, TextGenerator};
use kioku::{DomainError, MemoryItem, MemorySystem};
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test output; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Text generator that tells summary calls (one user message) apart from
/// model rewrites (system + user) and answers each deterministically.
#[derive(Default)]
pub struct FakeGenerator {
    summary_text: Mutex<Option<String>>,
    summaries: AtomicUsize,
    rewrites: AtomicUsize,
    fail_summaries: AtomicBool,
    fail_rewrites: AtomicBool,
    rewrite_prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_summary(text: &str) -> Arc<Self> {
        let generator = Self::default();
        *generator.summary_text.lock().unwrap() = Some(text.to_string());
        Arc::new(generator)
    }

    pub fn fail_summaries(&self, fail: bool) {
        self.fail_summaries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rewrites(&self, fail: bool) {
        self.fail_rewrites.store(fail, Ordering::SeqCst);
    }

    pub fn summary_calls(&self) -> usize {
        self.summaries.load(Ordering::SeqCst)
    }

    pub fn rewrite_calls(&self) -> usize {
        self.rewrites.load(Ordering::SeqCst)
    }

    pub fn rewrite_prompts(&self) -> Vec<String> {
        self.rewrite_prompts.lock().unwrap().clone()
    }

    /// The model text returned by the n-th successful rewrite
    pub fn model_text(n: usize) -> String {
        format!(
            "<Bedrock>\nThe user values honesty.\n</Bedrock>\n\
             <Evolutionary>\nRevision {n}.\n</Evolutionary>\n\
             <Dynamic>\nLast spring we hiked through the cedar forest.\n\n\nRevision {n} note.\n</Dynamic>"
        )
    }

    fn respond(content: String) -> CompletionResponse {
        CompletionResponse::new(content, "fake")
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, DomainError> {
        if messages.len() > 1 {
            if self.fail_rewrites.load(Ordering::SeqCst) {
                return Err(DomainError::ExternalService("rewrite timed out".to_string()));
            }
            self.rewrite_prompts
                .lock()
                .unwrap()
                .push(messages[1].content.clone());
            let n = self.rewrites.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(Self::respond(Self::model_text(n)));
        }

        if self.fail_summaries.load(Ordering::SeqCst) {
            return Err(DomainError::ExternalService("summary timed out".to_string()));
        }
        let n = self.summaries.fetch_add(1, Ordering::SeqCst) + 1;
        let text = self
            .summary_text
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| format!("Summary {n}."));
        Ok(Self::respond(text))
    }

    fn model_id(&self) -> &str {
        "fake"
    }
}

/// `InMemoryKvStore` whose reads or writes can be made to fail for keys
/// containing a given fragment.
#[derive(Default)]
pub struct FlakyKvStore {
    inner: InMemoryKvStore,
    failing_reads: Mutex<Option<String>>,
    failing_writes: Mutex<Option<String>>,
}

impl FlakyKvStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_reads_of(&self, fragment: Option<&str>) {
        *self.failing_reads.lock().unwrap() = fragment.map(str::to_string);
    }

    pub fn fail_writes_of(&self, fragment: Option<&str>) {
        *self.failing_writes.lock().unwrap() = fragment.map(str::to_string);
    }

    fn check(rule: &Mutex<Option<String>>, key: &str) -> Result<(), DomainError> {
        match rule.lock().unwrap().as_deref() {
            Some(fragment) if key.contains(fragment) => {
                Err(DomainError::Repository(format!("storage offline for {key}")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KvStore for FlakyKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        Self::check(&self.failing_reads, key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), DomainError> {
        Self::check(&self.failing_writes, key)?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        Self::check(&self.failing_writes, key)?;
        self.inner.delete(key).await
    }
}

/// Add `n` short-term memories one minute apart, oldest first.
/// Returns their ids in age order.
pub async fn seed_short_term(system: &MemorySystem, owner_id: &str, n: usize) -> Vec<String> {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let item = MemoryItem::new(owner_id, format!("Memory number {i}."))
            .with_timestamp(base + Duration::minutes(i as i64));
        ids.push(item.id.clone());
        system.short_term().add(item).await.unwrap();
    }
    ids
}
