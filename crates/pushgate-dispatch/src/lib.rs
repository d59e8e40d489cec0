//! Asynchronous dispatch engine for push notifications.
//!
//! Decouples request acceptance from delivery latency: producers hand jobs
//! to a [`Dispatcher`], which admits them into a bounded queue or rejects
//! them immediately, while a fixed pool of workers delivers queued jobs
//! through a [`PushSender`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐ submit ┌──────────────┐ take ┌──────────┐ send ┌────────────┐
//! │ Producers  │───────▶│ Bounded      │─────▶│ Worker   │─────▶│ PushSender │
//! │ (handlers) │◀───────│ Job Queue    │      │ Pool (N) │      └────────────┘
//! └────────────┘ reject └──────────────┘      └──────────┘
//! ```
//!
//! # Key Properties
//!
//! - **Backpressure without blocking** - admission beyond capacity fails
//!   immediately with [`DispatchError::QueueFull`]
//! - **Single attempt** - every admitted job is handed to the sender exactly
//!   once; failures are logged, never retried
//! - **Coordinated drain** - [`Dispatcher::stop`] refuses new jobs at once
//!   and returns only after every worker has emptied the queue and exited
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pushgate_core::{NotificationJob, NotificationTarget};
//! use pushgate_dispatch::{Dispatcher, DispatcherConfig, PushSender};
//!
//! # async fn example(sender: Arc<dyn PushSender>) -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::new(DispatcherConfig::default(), sender)?;
//! dispatcher.run()?;
//!
//! let job = NotificationJob::new("Hello", "World", NotificationTarget::Topic("news".into()))?;
//! dispatcher.submit(job)?;
//!
//! dispatcher.stop().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod sender;
pub mod stats;
mod worker;
mod worker_pool;

pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherState};
pub use error::{DispatchError, ErrorCategory, Result, SendError};
pub use sender::PushSender;
pub use stats::DispatchStats;

/// Default number of concurrent delivery workers.
pub const DEFAULT_WORKER_COUNT: usize = 50;

/// Default number of jobs the queue holds before rejecting admissions.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5000;

/// Default deadline for a single sender call in seconds.
pub const DEFAULT_SEND_TIMEOUT_SECONDS: u64 = 30;
