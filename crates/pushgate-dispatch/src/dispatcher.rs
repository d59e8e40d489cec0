//! Dispatcher: owner of the job queue and the worker pool.
//!
//! The dispatcher is the only point of admission and lifecycle control.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──run()──▶ Running ──stop()──▶ Draining ──(all workers exit)──▶ Stopped
//!   │                                                                     ▲
//!   └──────────────────────────────stop()─────────────────────────────────┘
//! ```
//!
//! `submit` is accepted only while `Running`. `stop` closes the queue to new
//! jobs immediately, lets in-flight sends complete and queued jobs drain,
//! and returns once every worker has exited.

use std::{
    fmt,
    sync::{Arc, Mutex, OnceLock, PoisonError},
    time::Duration,
};

use pushgate_core::NotificationJob;
use serde::{Deserialize, Serialize};
use tokio::{runtime::Handle, sync::watch};
use tracing::{debug, error, info, warn};

use crate::{
    error::{DispatchError, Result},
    queue::{AdmitError, JobQueue},
    sender::PushSender,
    stats::{DispatchStats, StatsRecorder},
    worker_pool::WorkerPool,
};

/// Dispatcher sizing and hardening parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Number of concurrent delivery workers.
    pub worker_count: usize,

    /// Maximum number of admitted jobs waiting for a worker.
    pub queue_capacity: usize,

    /// Deadline for one sender call; `None` waits indefinitely.
    ///
    /// A call that exceeds the deadline is abandoned and recorded as a
    /// failed delivery. It is not retried.
    pub send_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::DEFAULT_WORKER_COUNT,
            queue_capacity: crate::DEFAULT_QUEUE_CAPACITY,
            send_timeout: Some(Duration::from_secs(crate::DEFAULT_SEND_TIMEOUT_SECONDS)),
        }
    }
}

impl DispatcherConfig {
    fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(DispatchError::configuration("worker_count must be greater than 0"));
        }
        if self.queue_capacity == 0 {
            return Err(DispatchError::configuration("queue_capacity must be greater than 0"));
        }
        if self.send_timeout == Some(Duration::ZERO) {
            return Err(DispatchError::configuration(
                "send_timeout must be greater than 0 when set",
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherState {
    /// Constructed, workers not started.
    Idle,
    /// Workers active, admissions accepted.
    Running,
    /// Admissions closed, workers emptying the queue.
    Draining,
    /// All workers exited.
    Stopped,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Bounded job queue plus a fixed pool of delivery workers.
///
/// All operations take `&self`, so a dispatcher is typically shared as
/// `Arc<Dispatcher>` between request handlers and process bootstrap.
pub struct Dispatcher {
    config: DispatcherConfig,
    queue: JobQueue,
    sender: Arc<dyn PushSender>,
    stats: Arc<StatsRecorder>,
    state: Arc<watch::Sender<DispatcherState>>,
    worker_pool: Mutex<Option<WorkerPool>>,
    drain_outcome: Arc<OnceLock<Result<()>>>,
}

impl Dispatcher {
    /// Allocates the queue and records the worker configuration without
    /// starting any worker.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero worker count, zero queue
    /// capacity, or zero send deadline.
    pub fn new(config: DispatcherConfig, sender: Arc<dyn PushSender>) -> Result<Self> {
        config.validate()?;
        let queue = JobQueue::new(config.queue_capacity)?;
        let (state, _) = watch::channel(DispatcherState::Idle);

        Ok(Self {
            config,
            queue,
            sender,
            stats: Arc::new(StatsRecorder::default()),
            state: Arc::new(state),
            worker_pool: Mutex::new(None),
            drain_outcome: Arc::new(OnceLock::new()),
        })
    }

    /// Starts all workers and returns immediately.
    ///
    /// Must be called from within a Tokio runtime; workers are spawned on
    /// the current runtime.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyStarted` unless the dispatcher is idle, and
    /// `InvalidConfiguration` when no Tokio runtime is available.
    pub fn run(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|e| {
            DispatchError::configuration(format!("dispatcher requires a tokio runtime: {e}"))
        })?;

        // Held across the transition so a concurrent `stop` cannot observe
        // `Running` before the pool exists.
        let mut worker_pool = self.worker_pool.lock().unwrap_or_else(PoisonError::into_inner);

        let mut observed = DispatcherState::Idle;
        let started = self.state.send_if_modified(|state| {
            observed = *state;
            if *state == DispatcherState::Idle {
                *state = DispatcherState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(DispatchError::AlreadyStarted { state: observed });
        }

        info!(
            worker_count = self.config.worker_count,
            queue_capacity = self.config.queue_capacity,
            send_timeout = ?self.config.send_timeout,
            "starting notification dispatcher"
        );

        *worker_pool = Some(WorkerPool::spawn(
            &runtime,
            self.config.worker_count,
            &self.queue.consumer(),
            &self.sender,
            &self.stats,
            self.config.send_timeout,
        ));

        info!("notification dispatcher started");
        Ok(())
    }

    /// Offers a job for asynchronous delivery. Never blocks.
    ///
    /// Safe to call concurrently from any number of producers. The outcome
    /// of the eventual delivery is not reported back to the caller.
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` when the queue is at capacity and `NotRunning`
    /// outside the running state; the job is dropped in both cases.
    pub fn submit(&self, job: NotificationJob) -> Result<()> {
        let state = self.state();
        if state != DispatcherState::Running {
            warn!(job_id = %job.id(), state = %state, "submission outside running state");
            return Err(DispatchError::NotRunning { state });
        }

        let job_id = job.id();
        match self.queue.try_admit(job) {
            Ok(()) => {
                self.stats.job_accepted();
                debug!(job_id = %job_id, "job admitted");
                Ok(())
            },
            Err(AdmitError::Full) => {
                self.stats.job_rejected();
                warn!(
                    job_id = %job_id,
                    capacity = self.queue.capacity(),
                    "job queue full, submission rejected"
                );
                Err(DispatchError::QueueFull { capacity: self.queue.capacity() })
            },
            // Lost a race with `stop`.
            Err(AdmitError::Closed) => Err(DispatchError::NotRunning { state: self.state() }),
        }
    }

    /// Drains the queue and waits for every worker to exit.
    ///
    /// Admissions are refused from the moment this is called; in-flight
    /// sends complete and every queued job gets its single attempt before
    /// this returns. Calling `stop` on an idle dispatcher stops it without
    /// starting workers. Every call made once draining has begun, whether
    /// concurrent or later, waits for the same drain and returns its
    /// outcome.
    ///
    /// The drain runs as its own task, so cancelling this future (for
    /// example with `tokio::time::timeout`) does not interrupt it and a
    /// later call still completes.
    ///
    /// # Errors
    ///
    /// Returns `WorkerPanic` if a worker task terminated abnormally. Every
    /// other worker is still joined first.
    pub async fn stop(&self) -> Result<()> {
        let mut previous = DispatcherState::Idle;
        self.state.send_if_modified(|state| {
            previous = *state;
            match *state {
                DispatcherState::Idle => {
                    *state = DispatcherState::Stopped;
                    true
                },
                DispatcherState::Running => {
                    *state = DispatcherState::Draining;
                    true
                },
                DispatcherState::Draining | DispatcherState::Stopped => false,
            }
        });

        match previous {
            DispatcherState::Idle => {
                self.queue.close_for_drain();
                info!("dispatcher was not started, stopped immediately");
                return Ok(());
            },
            DispatcherState::Running => self.begin_drain(),
            DispatcherState::Draining => {
                debug!("dispatcher already draining, waiting for completion");
            },
            DispatcherState::Stopped => {},
        }

        let mut state = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = state.wait_for(|state| *state == DispatcherState::Stopped).await;

        self.drain_outcome.get().cloned().unwrap_or(Ok(()))
    }

    /// Closes the queue and hands the worker pool to a detached drain task
    /// that records the outcome and then publishes `Stopped`.
    fn begin_drain(&self) {
        info!(queued = self.queue.len(), "stopping dispatcher, draining queued jobs");
        self.queue.close_for_drain();

        let worker_pool = self.worker_pool.lock().unwrap_or_else(PoisonError::into_inner).take();
        let state = Arc::clone(&self.state);
        let outcome = Arc::clone(&self.drain_outcome);
        let stats = Arc::clone(&self.stats);
        let capacity = self.queue.capacity();

        tokio::spawn(async move {
            let result = match worker_pool {
                Some(pool) => pool.join_all().await,
                None => Ok(()),
            };

            let snapshot = stats.snapshot(0, capacity);
            info!(
                delivered = snapshot.delivered,
                failed = snapshot.failed,
                rejected = snapshot.rejected,
                "dispatcher stopped"
            );

            // Outcome first: waiters read it as soon as they observe `Stopped`.
            let _ = outcome.set(result);
            state.send_replace(DispatcherState::Stopped);
        });
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        *self.state.borrow()
    }

    /// Returns a snapshot of dispatch counters.
    pub fn stats(&self) -> DispatchStats {
        self.stats.snapshot(self.queue.len(), self.queue.capacity())
    }

    /// Returns the configuration this dispatcher was built with.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let pool = self.worker_pool.get_mut().unwrap_or_else(PoisonError::into_inner);
        let still_running = pool.as_ref().is_some_and(WorkerPool::has_active_workers);

        if still_running && !self.queue.is_closed() {
            error!(
                queued = self.queue.len(),
                "Dispatcher dropped while running! Closing queue so workers drain and exit"
            );
            self.queue.close_for_drain();
            warn!("Dispatcher was not stopped gracefully. Call stop() before dropping to wait for delivery.");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pushgate_core::{DeliveryId, NotificationTarget};

    use super::*;
    use crate::error::SendError;

    struct AcceptAll;

    #[async_trait]
    impl PushSender for AcceptAll {
        async fn send(&self, job: &NotificationJob) -> std::result::Result<DeliveryId, SendError> {
            Ok(DeliveryId::new(job.id().to_string()))
        }
    }

    fn dispatcher(worker_count: usize, queue_capacity: usize) -> Dispatcher {
        let config = DispatcherConfig { worker_count, queue_capacity, send_timeout: None };
        Dispatcher::new(config, Arc::new(AcceptAll)).expect("valid config")
    }

    fn job() -> NotificationJob {
        NotificationJob::new("title", "body", NotificationTarget::Topic("news".into())).unwrap()
    }

    #[test]
    fn invalid_configuration_rejected() {
        let sender: Arc<dyn PushSender> = Arc::new(AcceptAll);

        for config in [
            DispatcherConfig { worker_count: 0, ..Default::default() },
            DispatcherConfig { queue_capacity: 0, ..Default::default() },
            DispatcherConfig { send_timeout: Some(Duration::ZERO), ..Default::default() },
        ] {
            let error = Dispatcher::new(config, sender.clone()).unwrap_err();
            assert!(matches!(error, DispatchError::InvalidConfiguration { .. }));
        }
    }

    #[test]
    fn default_config_matches_reference_deployment() {
        let config = DispatcherConfig::default();
        assert_eq!(config.worker_count, 50);
        assert_eq!(config.queue_capacity, 5000);
        assert_eq!(config.send_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn run_outside_runtime_is_configuration_error() {
        let dispatcher = dispatcher(1, 1);
        let error = dispatcher.run().unwrap_err();
        assert!(matches!(error, DispatchError::InvalidConfiguration { .. }));
        assert_eq!(dispatcher.state(), DispatcherState::Idle);
    }

    #[test]
    fn submit_while_idle_is_lifecycle_misuse() {
        let dispatcher = dispatcher(1, 4);
        let error = dispatcher.submit(job()).unwrap_err();
        assert_eq!(error, DispatchError::NotRunning { state: DispatcherState::Idle });
        assert_eq!(dispatcher.stats().accepted, 0);
    }

    #[tokio::test]
    async fn run_twice_is_rejected() {
        let dispatcher = dispatcher(2, 4);
        dispatcher.run().unwrap();

        let error = dispatcher.run().unwrap_err();
        assert_eq!(error, DispatchError::AlreadyStarted { state: DispatcherState::Running });

        dispatcher.stop().await.unwrap();
        let error = dispatcher.run().unwrap_err();
        assert_eq!(error, DispatchError::AlreadyStarted { state: DispatcherState::Stopped });
    }

    #[tokio::test]
    async fn stop_on_idle_dispatcher_completes_immediately() {
        let dispatcher = dispatcher(3, 4);
        dispatcher.stop().await.unwrap();

        assert_eq!(dispatcher.state(), DispatcherState::Stopped);
        assert_eq!(dispatcher.stats().active_workers, 0);
        assert!(dispatcher.run().is_err());
    }

    #[tokio::test]
    async fn state_walks_the_lifecycle() {
        let dispatcher = dispatcher(2, 4);
        assert_eq!(dispatcher.state(), DispatcherState::Idle);

        dispatcher.run().unwrap();
        assert_eq!(dispatcher.state(), DispatcherState::Running);
        assert_eq!(dispatcher.stats().active_workers, 2);

        dispatcher.stop().await.unwrap();
        assert_eq!(dispatcher.state(), DispatcherState::Stopped);
        assert_eq!(dispatcher.stats().active_workers, 0);

        // Second stop is a no-op.
        dispatcher.stop().await.unwrap();
    }

    #[tokio::test]
    async fn submit_after_stop_is_rejected() {
        let dispatcher = dispatcher(1, 4);
        dispatcher.run().unwrap();
        dispatcher.stop().await.unwrap();

        let error = dispatcher.submit(job()).unwrap_err();
        assert_eq!(error, DispatchError::NotRunning { state: DispatcherState::Stopped });
    }

    #[tokio::test]
    async fn every_stop_caller_sees_the_drain_outcome() {
        let dispatcher = dispatcher(1, 4);
        dispatcher.run().unwrap();

        // Swap in a pool whose only worker dies outside any send call.
        let crashed = tokio::spawn(async { panic!("worker loop crashed") });
        let replaced = dispatcher
            .worker_pool
            .lock()
            .unwrap()
            .replace(WorkerPool::from_handles(vec![crashed]));
        drop(replaced);

        let (first, second) = tokio::join!(dispatcher.stop(), dispatcher.stop());
        assert!(matches!(first, Err(DispatchError::WorkerPanic { worker_id: 0, .. })));
        assert_eq!(first, second);

        assert_eq!(dispatcher.state(), DispatcherState::Stopped);
        assert_eq!(dispatcher.stop().await, first);
    }

    #[test]
    fn state_display_is_lowercase() {
        assert_eq!(DispatcherState::Draining.to_string(), "draining");
        assert_eq!(
            serde_json::to_string(&DispatcherState::Running).unwrap(),
            "\"running\"",
        );
    }
}
