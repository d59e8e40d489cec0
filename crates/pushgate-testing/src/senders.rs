//! Deterministic [`PushSender`] fakes.
//!
//! All fakes record the jobs they were handed, in invocation order, so tests
//! can assert exactly-once delivery and FIFO ordering without a provider.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use pushgate_core::{DeliveryId, NotificationJob};
use pushgate_dispatch::{PushSender, SendError};
use tokio::sync::Semaphore;

#[derive(Debug, Default)]
struct CallLog {
    jobs: Mutex<Vec<NotificationJob>>,
}

impl CallLog {
    fn record(&self, job: &NotificationJob) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push(job.clone());
        jobs.len()
    }

    fn jobs(&self) -> Vec<NotificationJob> {
        self.jobs.lock().unwrap().clone()
    }

    fn titles(&self) -> Vec<String> {
        self.jobs.lock().unwrap().iter().map(|job| job.title().to_string()).collect()
    }

    fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

fn delivery_id(sequence: usize) -> DeliveryId {
    DeliveryId::new(format!("projects/test-project/messages/{sequence}"))
}

/// Accepts every job immediately and remembers it.
#[derive(Debug, Default)]
pub struct RecordingSender {
    log: CallLog,
}

impl RecordingSender {
    /// Creates an empty recording sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sender invocations so far.
    pub fn calls(&self) -> usize {
        self.log.len()
    }

    /// Jobs in invocation order.
    pub fn jobs(&self) -> Vec<NotificationJob> {
        self.log.jobs()
    }

    /// Job titles in invocation order.
    pub fn titles(&self) -> Vec<String> {
        self.log.titles()
    }
}

#[async_trait]
impl PushSender for RecordingSender {
    async fn send(&self, job: &NotificationJob) -> Result<DeliveryId, SendError> {
        let sequence = self.log.record(job);
        Ok(delivery_id(sequence))
    }
}

/// Holds every send until a permit is released.
///
/// Lets a test keep workers busy while it probes admission, then release
/// them one at a time or all at once.
#[derive(Debug)]
pub struct GatedSender {
    log: CallLog,
    gate: Semaphore,
    completed: AtomicUsize,
}

impl Default for GatedSender {
    fn default() -> Self {
        Self { log: CallLog::default(), gate: Semaphore::new(0), completed: AtomicUsize::new(0) }
    }
}

impl GatedSender {
    /// Creates a closed gate; no send completes until released.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `count` pending or future sends complete.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Opens the gate permanently.
    pub fn open(&self) {
        self.gate.close();
    }

    /// Number of sends that have started (including ones still held).
    pub fn started(&self) -> usize {
        self.log.len()
    }

    /// Number of sends that have returned.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Job titles in invocation order.
    pub fn titles(&self) -> Vec<String> {
        self.log.titles()
    }
}

#[async_trait]
impl PushSender for GatedSender {
    async fn send(&self, job: &NotificationJob) -> Result<DeliveryId, SendError> {
        let sequence = self.log.record(job);
        // A closed semaphore means the gate was opened for good.
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.completed.fetch_add(1, Ordering::AcqRel);
        Ok(delivery_id(sequence))
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Fail(SendError),
    Panic,
    Hang,
}

/// Returns scripted outcomes keyed by job title; every other job succeeds.
#[derive(Debug, Default)]
pub struct ScriptedSender {
    log: CallLog,
    outcomes: HashMap<String, Outcome>,
    latency: Option<Duration>,
}

impl ScriptedSender {
    /// Creates a sender that accepts every job.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails jobs titled `title` with `error`.
    #[must_use]
    pub fn fail_on(mut self, title: impl Into<String>, error: SendError) -> Self {
        self.outcomes.insert(title.into(), Outcome::Fail(error));
        self
    }

    /// Panics inside `send` for jobs titled `title`.
    #[must_use]
    pub fn panic_on(mut self, title: impl Into<String>) -> Self {
        self.outcomes.insert(title.into(), Outcome::Panic);
        self
    }

    /// Never returns for jobs titled `title`.
    #[must_use]
    pub fn hang_on(mut self, title: impl Into<String>) -> Self {
        self.outcomes.insert(title.into(), Outcome::Hang);
        self
    }

    /// Sleeps for `latency` before every outcome.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of sender invocations so far.
    pub fn calls(&self) -> usize {
        self.log.len()
    }

    /// Job titles in invocation order.
    pub fn titles(&self) -> Vec<String> {
        self.log.titles()
    }
}

#[async_trait]
impl PushSender for ScriptedSender {
    async fn send(&self, job: &NotificationJob) -> Result<DeliveryId, SendError> {
        let sequence = self.log.record(job);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.outcomes.get(job.title()) {
            None => Ok(delivery_id(sequence)),
            Some(Outcome::Fail(error)) => Err(error.clone()),
            Some(Outcome::Panic) => panic!("scripted sender panic for job {}", job.id()),
            Some(Outcome::Hang) => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            },
        }
    }
}

/// Fails every job with the same error.
#[derive(Debug)]
pub struct FailingSender {
    log: CallLog,
    error: SendError,
}

impl FailingSender {
    /// Creates a sender that always returns `error`.
    pub fn new(error: SendError) -> Self {
        Self { log: CallLog::default(), error }
    }

    /// Number of sender invocations so far.
    pub fn calls(&self) -> usize {
        self.log.len()
    }
}

#[async_trait]
impl PushSender for FailingSender {
    async fn send(&self, job: &NotificationJob) -> Result<DeliveryId, SendError> {
        self.log.record(job);
        Err(self.error.clone())
    }
}
