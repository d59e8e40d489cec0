//! Worker execution loop.
//!
//! Each worker repeatedly takes the next queued job and hands it to the
//! sender exactly once. Outcomes are logged and counted, never reported
//! back to the producer, and a failed attempt is neither retried nor
//! requeued. The loop ends when the queue is closed and empty.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use pushgate_core::{DeliveryId, NotificationJob};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::{error::SendError, queue::JobConsumer, sender::PushSender, stats::StatsRecorder};

/// One pool slot consuming from the shared queue.
pub(crate) struct Worker {
    id: usize,
    consumer: JobConsumer,
    sender: Arc<dyn PushSender>,
    stats: Arc<StatsRecorder>,
    send_timeout: Option<Duration>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        consumer: JobConsumer,
        sender: Arc<dyn PushSender>,
        stats: Arc<StatsRecorder>,
        send_timeout: Option<Duration>,
    ) -> Self {
        Self { id, consumer, sender, stats, send_timeout }
    }

    /// Runs until the queue is closed and drained.
    pub(crate) async fn run(self) {
        debug!(worker_id = self.id, "dispatch worker ready");

        let mut handled: u64 = 0;
        while let Some(job) = self.consumer.take().await {
            self.deliver(job).await;
            handled += 1;
        }

        self.stats.worker_exited();
        debug!(worker_id = self.id, jobs_handled = handled, "dispatch worker stopped");
    }

    /// Makes the single delivery attempt for `job`; the job is dropped when
    /// this returns.
    async fn deliver(&self, job: NotificationJob) {
        self.stats.delivery_started();
        let started = Instant::now();

        let outcome = self.attempt(&job).await;
        self.stats.delivery_finished(outcome.is_ok());

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(delivery_id) => {
                info!(
                    worker_id = self.id,
                    job_id = %job.id(),
                    target = %job.target(),
                    delivery_id = %delivery_id,
                    duration_ms,
                    "notification delivered"
                );
            },
            Err(error) => {
                warn!(
                    worker_id = self.id,
                    job_id = %job.id(),
                    target = %job.target(),
                    category = %error.category(),
                    error = %error,
                    duration_ms,
                    "notification delivery failed, job discarded"
                );
            },
        }
    }

    async fn attempt(&self, job: &NotificationJob) -> Result<DeliveryId, SendError> {
        let send = AssertUnwindSafe(self.sender.send(job)).catch_unwind();

        let result = match self.send_timeout {
            Some(deadline) => match timeout(deadline, send).await {
                Ok(result) => result,
                Err(_elapsed) => return Err(SendError::timeout(deadline)),
            },
            None => send.await,
        };

        result.unwrap_or_else(|panic| {
            Err(SendError::internal(format!("sender panicked: {}", panic_message(panic.as_ref()))))
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
