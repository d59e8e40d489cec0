//! Fixed-size worker pool with explicit join.
//!
//! The pool owns the join handle of every worker it spawns, so the
//! dispatcher can wait for each of them during drain instead of leaving
//! background tasks behind.

use std::{sync::Arc, time::Duration};

use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{error, info};

use crate::{
    error::{DispatchError, Result},
    queue::JobConsumer,
    sender::PushSender,
    stats::StatsRecorder,
    worker::Worker,
};

/// Handles of the spawned worker tasks, indexed by worker id.
pub(crate) struct WorkerPool {
    worker_handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers on `runtime`, all consuming from
    /// `consumer`. Returns immediately.
    pub(crate) fn spawn(
        runtime: &Handle,
        worker_count: usize,
        consumer: &JobConsumer,
        sender: &Arc<dyn PushSender>,
        stats: &Arc<StatsRecorder>,
        send_timeout: Option<Duration>,
    ) -> Self {
        info!(worker_count, "spawning dispatch workers");

        let worker_handles = (0..worker_count)
            .map(|worker_id| {
                let worker = Worker::new(
                    worker_id,
                    consumer.clone(),
                    sender.clone(),
                    stats.clone(),
                    send_timeout,
                );
                stats.worker_started();
                runtime.spawn(worker.run())
            })
            .collect::<Vec<_>>();

        info!(spawned_workers = worker_handles.len(), "all dispatch workers spawned");
        Self { worker_handles }
    }

    /// Waits for every worker to exit.
    ///
    /// Workers only exit once the queue is closed and empty, so callers
    /// close the queue first. All workers are joined even if some of them
    /// failed; the first failure is returned afterwards.
    pub(crate) async fn join_all(self) -> Result<()> {
        let worker_count = self.worker_handles.len();
        let mut first_failure = None;

        for (worker_id, handle) in self.worker_handles.into_iter().enumerate() {
            if let Err(join_error) = handle.await {
                error!(
                    worker_id,
                    error = %join_error,
                    "dispatch worker terminated abnormally"
                );
                first_failure.get_or_insert(DispatchError::WorkerPanic {
                    worker_id,
                    error: join_error.to_string(),
                });
            }
        }

        info!(worker_count, "all dispatch workers joined");
        first_failure.map_or(Ok(()), Err)
    }

    #[cfg(test)]
    pub(crate) fn from_handles(worker_handles: Vec<JoinHandle<()>>) -> Self {
        Self { worker_handles }
    }

    /// Returns `true` while any worker task is still running.
    pub(crate) fn has_active_workers(&self) -> bool {
        self.worker_handles.iter().any(|handle| !handle.is_finished())
    }
}
