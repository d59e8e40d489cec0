//! Bounded multi-producer, multi-consumer job queue.
//!
//! Admission is non-blocking and fails once `capacity` jobs are waiting.
//! Consumers share a single receiver so jobs leave the queue in admission
//! order. Closing the queue for drain stops admissions while leaving
//! already-queued jobs available to consumers until exhausted.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, PoisonError, RwLock,
};

use pushgate_core::NotificationJob;
use tokio::sync::{mpsc, Mutex};

use crate::error::{DispatchError, Result};

/// Why a job was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    /// Queue already holds `capacity` jobs.
    Full,
    /// Queue was closed for drain.
    Closed,
}

/// Fixed-capacity FIFO between producers and workers.
#[derive(Debug)]
pub struct JobQueue {
    admitter: RwLock<Option<mpsc::Sender<NotificationJob>>>,
    consumer: JobConsumer,
    capacity: usize,
}

impl JobQueue {
    /// Creates an open queue that holds at most `capacity` jobs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DispatchError::configuration("queue capacity must be greater than 0"));
        }

        let (admitter, receiver) = mpsc::channel(capacity);
        let consumer = JobConsumer {
            receiver: Arc::new(Mutex::new(receiver)),
            depth: Arc::new(AtomicUsize::new(0)),
        };

        Ok(Self { admitter: RwLock::new(Some(admitter)), consumer, capacity })
    }

    /// Admits a job without blocking.
    ///
    /// Concurrent callers may race; the number of queued jobs never exceeds
    /// the capacity and a rejected job never displaces a queued one.
    ///
    /// # Errors
    ///
    /// Returns [`AdmitError::Full`] at capacity and [`AdmitError::Closed`]
    /// after [`close_for_drain`](Self::close_for_drain).
    pub fn try_admit(&self, job: NotificationJob) -> std::result::Result<(), AdmitError> {
        let guard = self.admitter.read().unwrap_or_else(PoisonError::into_inner);
        let Some(admitter) = guard.as_ref() else {
            return Err(AdmitError::Closed);
        };

        // Counted before the send so a fast consumer can never drive the
        // depth below zero.
        self.consumer.depth.fetch_add(1, Ordering::AcqRel);
        match admitter.try_send(job) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.consumer.depth.fetch_sub(1, Ordering::AcqRel);
                match error {
                    mpsc::error::TrySendError::Full(_) => Err(AdmitError::Full),
                    mpsc::error::TrySendError::Closed(_) => Err(AdmitError::Closed),
                }
            },
        }
    }

    /// Stops further admissions. Idempotent.
    ///
    /// Jobs already queued stay available to [`JobConsumer::take`]; once
    /// they are exhausted every consumer observes the end of the queue.
    pub fn close_for_drain(&self) {
        self.admitter.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Returns `true` once the queue was closed for drain.
    pub fn is_closed(&self) -> bool {
        self.admitter.read().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    /// Returns the maximum number of queued jobs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the approximate number of queued jobs, never more than the
    /// capacity.
    ///
    /// An admission in progress is counted before it is decided, so racing
    /// producers that are about to be rejected can briefly inflate the raw
    /// counter.
    pub fn len(&self) -> usize {
        self.consumer.depth.load(Ordering::Acquire).min(self.capacity)
    }

    /// Returns `true` if no jobs are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a handle workers use to take jobs.
    pub fn consumer(&self) -> JobConsumer {
        self.consumer.clone()
    }
}

/// Consumer side of a [`JobQueue`], shared by all workers.
#[derive(Debug, Clone)]
pub struct JobConsumer {
    receiver: Arc<Mutex<mpsc::Receiver<NotificationJob>>>,
    depth: Arc<AtomicUsize>,
}

impl JobConsumer {
    /// Waits for the next job in admission order.
    ///
    /// Returns `None` once the queue is closed and empty; that is the
    /// terminal signal for a worker.
    pub async fn take(&self) -> Option<NotificationJob> {
        let job = self.receiver.lock().await.recv().await;
        if job.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        job
    }
}
