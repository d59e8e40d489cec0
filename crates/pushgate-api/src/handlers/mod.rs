//! HTTP request handlers for the pushgate API.
//!
//! Handlers are grouped by functionality:
//! - `send` - notification submission
//! - `health` - health, readiness and liveness probes
//!
//! # Error Handling
//!
//! Every error response carries a stable code from the
//! [`PushgateError`](pushgate_core::PushgateError) taxonomy alongside a
//! human-readable message:
//!
//! ```json
//! {"error": {"code": "E1002", "message": "[E1002] Queue full: ..."}}
//! ```

pub mod health;
pub mod send;

pub use health::{health_check, liveness_check, readiness_check};
pub use send::send_notification;
