//! Dispatch counters for health reporting and monitoring.
//!
//! Counters are plain atomics: admission must never suspend, so it cannot
//! wait on an async lock just to bump a number.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Point-in-time view of dispatcher activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Workers whose loop has not yet terminated.
    pub active_workers: usize,
    /// Jobs waiting in the queue. Approximate while producers race, but
    /// never above `capacity`.
    pub queued: usize,
    /// Queue capacity.
    pub capacity: usize,
    /// Sender calls currently in progress.
    pub in_flight: usize,
    /// Submissions admitted since construction.
    pub accepted: u64,
    /// Submissions rejected because the queue was full.
    pub rejected: u64,
    /// Jobs the sender accepted.
    pub delivered: u64,
    /// Jobs whose single attempt failed.
    pub failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    active_workers: AtomicUsize,
    in_flight: AtomicUsize,
    accepted: AtomicU64,
    rejected: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn worker_exited(&self) {
        self.active_workers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn job_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivery_started(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn delivery_finished(&self, succeeded: bool) {
        if succeeded {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn snapshot(&self, queued: usize, capacity: usize) -> DispatchStats {
        DispatchStats {
            active_workers: self.active_workers.load(Ordering::Acquire),
            queued,
            capacity,
            in_flight: self.in_flight.load(Ordering::Acquire),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
