//! Execution counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the worker.
#[derive(Debug, Default)]
pub struct QueueStats {
    executed: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
    resume_attempts: AtomicU64,
}

/// Point-in-time copy of [`QueueStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Operations that completed and were deleted.
    pub executed: u64,
    /// Attempts that asked for a retry, including failed deletes.
    pub failed: u64,
    /// Operations dropped by the handler.
    pub discarded: u64,
    /// Times the engine tried to leave `Paused`, whether or not it did.
    pub resume_attempts: u64,
}

impl QueueStats {
    pub(crate) fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_resume_attempt(&self) {
        self.resume_attempts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            executed: self.executed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            discarded: self.discarded.load(Ordering::SeqCst),
            resume_attempts: self.resume_attempts.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = QueueStats::default();
        stats.record_executed();
        stats.record_executed();
        stats.record_failed();
        stats.record_discarded();
        stats.record_resume_attempt();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                executed: 2,
                failed: 1,
                discarded: 1,
                resume_attempts: 1,
            }
        );
    }
}
