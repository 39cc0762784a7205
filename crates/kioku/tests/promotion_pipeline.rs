//! Promotion scenarios against the in-memory store.
//!
//! Covers overflow draining, failure handling, the cycle cap and the
//! interaction between ingestion and promotion in `MemorySystem`.

mod common;

use std::sync::Arc;

use common::{seed_short_term, FakeGenerator, FlakyKvStore};
use kioku::adapters::InMemoryKvStore;
use kioku::services::{MemoryTables, PendingPromotion};
use kioku::{
    ChannelStatusObserver, EventLog, KiokuConfig, MemoryConfig, MemoryStatus, MemorySystem,
    PromotionOutcome,
};

fn config(max: usize, batch: usize) -> MemoryConfig {
    MemoryConfig {
        short_term_max_count: max,
        promotion_batch_size: batch,
        ..MemoryConfig::default()
    }
}

fn system(generator: Arc<FakeGenerator>) -> MemorySystem {
    MemorySystem::new(
        Arc::new(InMemoryKvStore::new()),
        generator,
        &KiokuConfig::default(),
    )
}

#[tokio::test]
async fn promotion_not_needed_within_bounds() {
    let generator = FakeGenerator::new();
    let system = system(generator.clone());
    seed_short_term(&system, "alice", 5).await;

    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;

    assert_eq!(report.outcome, PromotionOutcome::NotNeeded);
    assert_eq!(report.cycles, 0);
    assert_eq!(generator.rewrite_calls(), 0);
    assert_eq!(system.short_term().count("alice").await.unwrap(), 5);
}

#[tokio::test]
async fn promotion_takes_oldest_batch() {
    let generator = FakeGenerator::new();
    let system = system(generator.clone());
    let ids = seed_short_term(&system, "alice", 7).await;

    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;

    assert_eq!(report.outcome, PromotionOutcome::Drained);
    assert_eq!(report.cycles, 1);
    assert_eq!(report.promoted_ids, ids[..2].to_vec());

    let remaining: Vec<String> = system
        .short_term()
        .oldest("alice", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(remaining, ids[2..].to_vec());

    // The batch is stamped and fed to the rewrite oldest first
    let prompt = &generator.rewrite_prompts()[0];
    let first = prompt.find("Memory number 0.").unwrap();
    let second = prompt.find("Memory number 1.").unwrap();
    assert!(first < second);
    assert!(prompt.contains("[2024-05-01 09:00:00] Memory number 0."));
    assert!(!prompt.contains("Memory number 2."));
}

#[tokio::test]
async fn promotion_drains_backlog_in_a_loop() {
    common::init_tracing();
    let generator = FakeGenerator::new();
    let system = system(generator.clone());
    let ids = seed_short_term(&system, "alice", 10).await;

    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;

    assert_eq!(report.outcome, PromotionOutcome::Drained);
    assert_eq!(report.cycles, 3);
    assert_eq!(report.promoted_ids, ids[..6].to_vec());
    assert_eq!(system.short_term().count("alice").await.unwrap(), 4);

    // Each rewrite replaces the model; the last one is what is stored
    let model = system.long_term_model("alice").await;
    assert_eq!(model.as_str(), FakeGenerator::model_text(3));

    // Each rewrite sees the model written by the previous cycle
    let prompts = generator.rewrite_prompts();
    assert!(prompts[1].contains("Revision 1."));
    assert!(prompts[2].contains("Revision 2."));
}

#[tokio::test]
async fn first_promotion_starts_from_skeleton() {
    let generator = FakeGenerator::new();
    let system = system(generator.clone());
    seed_short_term(&system, "alice", 3).await;

    system.promotion().maybe_promote("alice", &config(2, 1)).await;

    let prompt = &generator.rewrite_prompts()[0];
    assert!(prompt.contains("<Bedrock>"));
    assert!(prompt.contains("<Evolutionary>"));
    assert!(prompt.contains("<Dynamic>"));
}

#[tokio::test]
async fn failed_rewrite_keeps_batch_and_model() {
    common::init_tracing();
    let generator = FakeGenerator::new();
    let kv = Arc::new(InMemoryKvStore::new());
    let system = MemorySystem::new(kv.clone(), generator.clone(), &KiokuConfig::default());
    let tables = MemoryTables::new(kv, "memory_system");
    tables.save_model("alice", "previous model").await.unwrap();
    seed_short_term(&system, "alice", 7).await;

    generator.fail_rewrites(true);
    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;

    assert!(matches!(report.outcome, PromotionOutcome::Failed { .. }));
    assert_eq!(report.cycles, 0);
    assert!(report.promoted_ids.is_empty());
    assert_eq!(system.short_term().count("alice").await.unwrap(), 7);
    assert_eq!(
        tables.load_model_text("alice").await.unwrap().as_deref(),
        Some("previous model")
    );

    // The next trigger retries the same batch
    generator.fail_rewrites(false);
    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;
    assert_eq!(report.outcome, PromotionOutcome::Drained);
    assert_eq!(system.short_term().count("alice").await.unwrap(), 5);
    assert!(generator.rewrite_prompts()[0].contains("previous model"));
}

#[tokio::test]
async fn unreadable_model_aborts_cycle_without_overwrite() {
    let generator = FakeGenerator::new();
    let kv = FlakyKvStore::new();
    let system = MemorySystem::new(kv.clone(), generator.clone(), &KiokuConfig::default());
    let tables = MemoryTables::new(kv.clone(), "memory_system");
    tables.save_model("alice", "precious model").await.unwrap();
    seed_short_term(&system, "alice", 7).await;

    kv.fail_reads_of(Some("long_term"));
    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;
    kv.fail_reads_of(None);

    assert!(matches!(report.outcome, PromotionOutcome::Failed { .. }));
    assert_eq!(generator.rewrite_calls(), 0);
    assert_eq!(system.short_term().count("alice").await.unwrap(), 7);
    assert_eq!(
        tables.load_model_text("alice").await.unwrap().as_deref(),
        Some("precious model")
    );
}

#[tokio::test]
async fn failed_model_write_keeps_batch() {
    let generator = FakeGenerator::new();
    let kv = FlakyKvStore::new();
    let system = MemorySystem::new(kv.clone(), generator.clone(), &KiokuConfig::default());
    seed_short_term(&system, "alice", 7).await;

    kv.fail_writes_of(Some("long_term"));
    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;
    kv.fail_writes_of(None);

    assert!(matches!(report.outcome, PromotionOutcome::Failed { .. }));
    assert_eq!(system.short_term().count("alice").await.unwrap(), 7);
}

#[tokio::test]
async fn failed_batch_delete_is_finished_without_second_rewrite() {
    let generator = FakeGenerator::new();
    let kv = FlakyKvStore::new();
    let system = MemorySystem::new(kv.clone(), generator.clone(), &KiokuConfig::default());
    let tables = MemoryTables::new(kv.clone(), "memory_system");
    let ids = seed_short_term(&system, "alice", 7).await;

    kv.fail_writes_of(Some("short_term"));
    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;
    kv.fail_writes_of(None);

    assert!(matches!(report.outcome, PromotionOutcome::Failed { .. }));
    assert_eq!(generator.rewrite_calls(), 1);
    assert_eq!(system.short_term().count("alice").await.unwrap(), 7);
    assert_eq!(
        tables.load_model_text("alice").await.unwrap(),
        Some(FakeGenerator::model_text(1))
    );

    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;

    assert_eq!(report.outcome, PromotionOutcome::Drained);
    assert_eq!(report.cycles, 0);
    assert_eq!(report.promoted_ids, ids[..2].to_vec());
    assert_eq!(generator.rewrite_calls(), 1);
    assert_eq!(system.short_term().count("alice").await.unwrap(), 5);
    assert_eq!(tables.load_pending("alice").await.unwrap(), None);
}

#[tokio::test]
async fn pending_promotion_without_stored_model_is_dropped() {
    let generator = FakeGenerator::new();
    let kv = FlakyKvStore::new();
    let system = MemorySystem::new(kv.clone(), generator.clone(), &KiokuConfig::default());
    let tables = MemoryTables::new(kv.clone(), "memory_system");
    let ids = seed_short_term(&system, "alice", 3).await;
    tables
        .save_pending(
            "alice",
            &PendingPromotion {
                ids: ids[..2].to_vec(),
                model: "never written".to_string(),
            },
        )
        .await
        .unwrap();

    let report = system.promotion().maybe_promote("alice", &config(5, 2)).await;

    assert_eq!(report.outcome, PromotionOutcome::NotNeeded);
    assert_eq!(system.short_term().count("alice").await.unwrap(), 3);
    assert_eq!(tables.load_pending("alice").await.unwrap(), None);
}

#[tokio::test]
async fn cycle_cap_is_reported() {
    let generator = FakeGenerator::new();
    let system = system(generator.clone());
    seed_short_term(&system, "alice", 10).await;

    let capped = MemoryConfig {
        max_promotion_cycles: 1,
        ..config(5, 2)
    };
    let report = system.promotion().maybe_promote("alice", &capped).await;

    assert_eq!(report.outcome, PromotionOutcome::CapReached);
    assert_eq!(report.cycles, 1);
    assert_eq!(system.short_term().count("alice").await.unwrap(), 8);
}

#[tokio::test]
async fn ingestion_triggers_promotion_and_reports_status() {
    let generator = FakeGenerator::new();
    let (observer, mut statuses) = ChannelStatusObserver::new();
    let system = MemorySystem::with_observer(
        Arc::new(InMemoryKvStore::new()),
        generator.clone(),
        &KiokuConfig::default(),
        Arc::new(observer),
    );
    let config = MemoryConfig {
        states_token_threshold: 10,
        ..config(1, 1)
    };

    let mut log = EventLog::new();
    log.append_user_message("I finally booked the train to Kyoto for April.");
    let first = system.update_memory(&log.snapshot(), "alice", &config, false).await;
    assert!(first.short_term.is_some());
    assert_eq!(first.promotion.unwrap().outcome, PromotionOutcome::NotNeeded);

    let second = system.update_memory(&log.snapshot(), "alice", &config, false).await;
    let promotion = second.promotion.unwrap();
    assert_eq!(promotion.outcome, PromotionOutcome::Drained);
    assert_eq!(promotion.promoted_ids, vec![first.short_term.unwrap().id]);
    assert_eq!(system.short_term().count("alice").await.unwrap(), 1);

    let mut seen = Vec::new();
    while let Ok((owner, status)) = statuses.try_recv() {
        assert_eq!(owner, "alice");
        seen.push(status);
    }
    assert!(matches!(seen[0], MemoryStatus::Summarizing { events: 1 }));
    assert!(matches!(seen[1], MemoryStatus::ShortTermStored { .. }));
    assert!(seen.contains(&MemoryStatus::Promoting { cycle: 1, batch: 1 }));
    assert!(seen.contains(&MemoryStatus::Promoted {
        cycle: 1,
        promoted: 1
    }));
}

#[tokio::test]
async fn below_threshold_batch_is_skipped() {
    let generator = FakeGenerator::new();
    let system = system(generator.clone());

    let mut log = EventLog::new();
    log.append_user_message("ok");
    let update = system
        .update_memory(&log.snapshot(), "alice", &MemoryConfig::default(), false)
        .await;

    assert!(update.short_term.is_none());
    assert!(update.promotion.is_none());
    assert_eq!(generator.summary_calls(), 0);
}

#[tokio::test]
async fn empty_batch_is_a_noop() {
    let generator = FakeGenerator::new();
    let system = system(generator.clone());

    let update = system
        .update_memory(&[], "alice", &MemoryConfig::default(), true)
        .await;

    assert!(update.short_term.is_none());
    assert_eq!(generator.summary_calls(), 0);
    assert_eq!(system.short_term().count("alice").await.unwrap(), 0);
}

#[tokio::test]
async fn owners_are_isolated() {
    let generator = FakeGenerator::new();
    let system = system(generator.clone());
    seed_short_term(&system, "alice", 7).await;
    seed_short_term(&system, "bob", 2).await;

    system.promotion().maybe_promote("alice", &config(5, 2)).await;
    let report = system.promotion().maybe_promote("bob", &config(5, 2)).await;

    assert_eq!(report.outcome, PromotionOutcome::NotNeeded);
    assert_eq!(system.short_term().count("bob").await.unwrap(), 2);
    assert!(system.stats("alice").await.unwrap().has_long_term_model);
    assert!(!system.stats("bob").await.unwrap().has_long_term_model);
}

#[tokio::test]
async fn stats_and_clear_owner() {
    let generator = FakeGenerator::new();
    let system = system(generator.clone());
    seed_short_term(&system, "alice", 4).await;
    system.promotion().maybe_promote("alice", &config(3, 1)).await;

    let stats = system.stats("alice").await.unwrap();
    assert_eq!(stats.short_term_count, 3);
    assert!(stats.has_long_term_model);
    assert_eq!(stats.dynamic_segments, 2);
    assert_eq!(
        stats.long_term_chars,
        FakeGenerator::model_text(1).chars().count()
    );

    system.clear_owner("alice").await.unwrap();
    let stats = system.stats("alice").await.unwrap();
    assert_eq!(stats.short_term_count, 0);
    assert!(!stats.has_long_term_model);
}

#[tokio::test]
async fn base_memory_excludes_dynamic_section() {
    let generator = FakeGenerator::new();
    let system = system(generator.clone());
    assert_eq!(system.base_memory("alice").await.unwrap(), "");

    seed_short_term(&system, "alice", 2).await;
    system.promotion().maybe_promote("alice", &config(1, 1)).await;

    let base = system.base_memory("alice").await.unwrap();
    assert!(base.contains("<Bedrock>"));
    assert!(base.contains("The user values honesty."));
    assert!(base.contains("<Evolutionary>"));
    assert!(!base.contains("cedar forest"));
    assert!(!base.contains("<Dynamic>"));
}
