//! Core domain models and error taxonomy for the push notification gateway.
//!
//! Provides the notification job value type, strongly-typed identifiers, and
//! the client-facing error codes shared by the HTTP front end and the
//! dispatch engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;

pub use error::{PushgateError, Result};
pub use models::{DeliveryId, JobId, NotificationJob, NotificationTarget};
