//! Status Observer Port
//!
//! Progress of background consolidation is reported to an observer owned by
//! the caller instead of a process-wide status signal.

use serde::Serialize;
use tokio::sync::mpsc;

/// Consolidation progress for one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MemoryStatus {
    /// An event batch is being compressed into a short-term memory
    Summarizing { events: usize },
    /// A short-term memory was stored
    ShortTermStored { id: String },
    /// No short-term memory was produced (below threshold, or summarization failed)
    SummarySkipped,
    /// A promotion cycle started
    Promoting { cycle: usize, batch: usize },
    /// A promotion cycle rewrote the model and deleted its batch
    Promoted { cycle: usize, promoted: usize },
    /// A promotion cycle failed; its batch stays in place
    PromotionFailed { cycle: usize, reason: String },
    /// The promotion loop hit its iteration cap with backlog remaining
    PromotionCapReached { cycles: usize },
    /// A background archive job failed
    ArchiveFailed { reason: String },
}

/// Subscriber for consolidation progress
pub trait StatusObserver: Send + Sync {
    fn notify(&self, owner_id: &str, status: &MemoryStatus);
}

/// Observer that discards every status
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusObserver;

impl StatusObserver for NoopStatusObserver {
    fn notify(&self, _owner_id: &str, _status: &MemoryStatus) {}
}

/// Observer that forwards `(owner_id, status)` pairs to a channel
#[derive(Debug, Clone)]
pub struct ChannelStatusObserver {
    sender: mpsc::UnboundedSender<(String, MemoryStatus)>,
}

impl ChannelStatusObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, MemoryStatus)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl StatusObserver for ChannelStatusObserver {
    fn notify(&self, owner_id: &str, status: &MemoryStatus) {
        // Receiver gone means nobody is listening anymore
        let _ = self.sender.send((owner_id.to_string(), status.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards() {
        let (observer, mut rx) = ChannelStatusObserver::new();
        observer.notify("alice", &MemoryStatus::SummarySkipped);
        let (owner, status) = rx.try_recv().unwrap();
        assert_eq!(owner, "alice");
        assert_eq!(status, MemoryStatus::SummarySkipped);
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelStatusObserver::new();
        drop(rx);
        observer.notify("alice", &MemoryStatus::Summarizing { events: 3 });
    }
}
