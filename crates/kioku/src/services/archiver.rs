//! Archiver - Background consolidation of evicted history
//!
//! The context builder hands evicted events to the archiver and returns
//! immediately. A dispatcher task routes each job to a worker for its
//! owner: jobs for one owner run in the order their events were evicted,
//! while a slow summary for one owner never holds up another. Idle
//! workers are dropped and respawned on the owner's next job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::MemoryConfig;
use crate::domain::entities::Event;
use crate::ports::MemoryStatus;
use crate::services::memory_system::MemorySystem;
/// Evicted events waiting to be summarized
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    pub owner_id: String,
    pub events: Vec<Event>,
    pub config: MemoryConfig,
    /// Summarize even when the batch is below `states_token_threshold`
    pub force: bool,
}

impl ArchiveJob {
    /// A forced job, as issued on context eviction
    pub fn evicted(owner_id: impl Into<String>, events: Vec<Event>, config: MemoryConfig) -> Self {
        Self {
            owner_id: owner_id.into(),
            events,
            config,
            force: true,
        }
    }
}

/// Commands for the dispatcher
#[derive(Debug)]
enum ArchiveCommand {
    Archive(ArchiveJob),
    /// Reply once every earlier job, for every owner, has been processed
    Flush(oneshot::Sender<()>),
    /// Finish queued jobs, then stop
    Stop,
}

/// Commands for one owner's worker
#[derive(Debug)]
enum OwnerCommand {
    Archive(ArchiveJob),
    Flush(oneshot::Sender<()>),
}

/// A running per-owner worker
struct OwnerWorker {
    sender: mpsc::UnboundedSender<OwnerCommand>,
    /// Jobs sent but not yet finished
    queued: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl OwnerWorker {
    fn spawn(system: Arc<MemorySystem>, owner_id: String) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<OwnerCommand>();
        let queued = Arc::new(AtomicUsize::new(0));
        let remaining = queued.clone();

        let handle = tokio::spawn(async move {
            while let Some(cmd) = receiver.recv().await {
                match cmd {
                    OwnerCommand::Archive(job) => {
                        Archiver::run_job(&system, job).await;
                        remaining.fetch_sub(1, Ordering::SeqCst);
                    }
                    OwnerCommand::Flush(reply) => {
                        let _ = reply.send(());
                    }
                }
            }
            tracing::debug!(owner_id = %owner_id, "Owner archive worker exited");
        });

        Self {
            sender,
            queued,
            handle,
        }
    }

    fn is_idle(&self) -> bool {
        self.queued.load(Ordering::SeqCst) == 0
    }

    fn submit(&self, job: ArchiveJob) -> bool {
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(OwnerCommand::Archive(job)).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }
}

/// Handle to the background archiver
#[derive(Debug, Clone)]
pub struct Archiver {
    sender: mpsc::UnboundedSender<ArchiveCommand>,
}

impl Archiver {
    /// Spawn the dispatcher task on the current runtime
    pub fn start(system: Arc<MemorySystem>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ArchiveCommand>();

        let handle = tokio::spawn(async move {
            let mut workers: HashMap<String, OwnerWorker> = HashMap::new();

            while let Some(cmd) = receiver.recv().await {
                match cmd {
                    ArchiveCommand::Archive(job) => {
                        // Nothing can be queued for an idle worker except from here
                        workers.retain(|_, worker| !worker.is_idle() && !worker.sender.is_closed());
                        Self::dispatch(&system, &mut workers, job);
                    }
                    ArchiveCommand::Flush(reply) => {
                        let pending: Vec<_> = workers
                            .values()
                            .filter_map(|worker| {
                                let (done, wait) = oneshot::channel();
                                worker.sender.send(OwnerCommand::Flush(done)).ok().map(|_| wait)
                            })
                            .collect();
                        tokio::spawn(async move {
                            join_all(pending).await;
                            let _ = reply.send(());
                        });
                    }
                    ArchiveCommand::Stop => break,
                }
            }

            drop(receiver);
            let handles: Vec<JoinHandle<()>> =
                workers.into_values().map(|worker| worker.handle).collect();
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Owner archive worker panicked");
                }
            }

            tracing::info!("Archive worker stopped");
        });

        (Self { sender }, handle)
    }

    fn dispatch(
        system: &Arc<MemorySystem>,
        workers: &mut HashMap<String, OwnerWorker>,
        job: ArchiveJob,
    ) {
        let owner_id = job.owner_id.clone();
        let events = job.events.len();
        let worker = workers
            .entry(owner_id.clone())
            .or_insert_with(|| OwnerWorker::spawn(system.clone(), owner_id.clone()));

        if !worker.submit(job) {
            tracing::error!(
                owner_id = %owner_id,
                events,
                "Owner archive worker is gone, dropping evicted events"
            );
            workers.remove(&owner_id);
        }
    }

    async fn run_job(system: &MemorySystem, job: ArchiveJob) {
        let ArchiveJob {
            owner_id,
            events,
            config,
            force,
        } = job;

        tracing::debug!(owner_id = %owner_id, events = events.len(), "Archiving evicted events");

        let update = system.update_memory(&events, &owner_id, &config, force).await;
        if update.short_term.is_none() && force && !events.is_empty() {
            tracing::error!(
                owner_id = %owner_id,
                events = events.len(),
                "Archive failed, evicted events were not summarized"
            );
            system.observer().notify(
                &owner_id,
                &MemoryStatus::ArchiveFailed {
                    reason: format!("{} evicted events could not be summarized", events.len()),
                },
            );
        }
    }

    /// Queue a job without waiting. Returns false if the archiver has stopped.
    pub fn submit(&self, job: ArchiveJob) -> bool {
        match self.sender.send(ArchiveCommand::Archive(job)) {
            Ok(()) => true,
            Err(mpsc::error::SendError(cmd)) => {
                if let ArchiveCommand::Archive(job) = cmd {
                    tracing::error!(
                        owner_id = %job.owner_id,
                        events = job.events.len(),
                        "Archiver is gone, dropping evicted events"
                    );
                }
                false
            }
        }
    }

    /// Wait until every job submitted before this call has been processed.
    /// Returns false if the archiver has stopped.
    pub async fn flush(&self) -> bool {
        let (reply, done) = oneshot::channel();
        if self.sender.send(ArchiveCommand::Flush(reply)).is_err() {
            return false;
        }
        done.await.is_ok()
    }

    /// Ask the archiver to stop after the jobs already queued
    pub fn shutdown(&self) {
        let _ = self.sender.send(ArchiveCommand::Stop);
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}
