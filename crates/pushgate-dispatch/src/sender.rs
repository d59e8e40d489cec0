//! Delivery capability consumed by the worker pool.
//!
//! The dispatch engine knows nothing about push providers. Anything that can
//! attempt one delivery for a job implements [`PushSender`]; the concrete
//! provider client lives in its own crate and tests plug in deterministic
//! fakes.

use async_trait::async_trait;
use pushgate_core::{DeliveryId, NotificationJob};

use crate::error::SendError;

/// Performs a single delivery attempt for a notification job.
///
/// Implementations must be safe to call from every worker concurrently.
/// A well-behaved implementation bounds its own latency; the dispatcher can
/// additionally enforce a deadline (see
/// [`DispatcherConfig::send_timeout`](crate::DispatcherConfig::send_timeout)).
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Attempts delivery and returns the provider-assigned message id.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] describing why the provider did not accept
    /// the message. The dispatcher never retries.
    async fn send(&self, job: &NotificationJob) -> Result<DeliveryId, SendError>;
}

