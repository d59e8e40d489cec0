//! Test infrastructure for the dispatch engine and its collaborators.
//!
//! Provides deterministic fake senders, notification job builders, FCM and
//! OAuth2 mock endpoints, and polling helpers so tests observe worker
//! progress without sleeping for fixed intervals.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::{future::Future, time::Duration};

pub mod fixtures;
pub mod http;
pub mod senders;

pub use fixtures::{numbered_jobs, service_account_json, JobBuilder};
pub use http::FcmMock;
pub use senders::{FailingSender, GatedSender, RecordingSender, ScriptedSender};

/// Default upper bound for [`wait_for`].
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Polls `condition` until it holds or `limit` elapses.
///
/// Returns `true` if the condition was observed. Yields between polls so
/// workers on a current-thread runtime get to run.
pub async fn wait_for_within(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Polls `condition` for up to [`DEFAULT_WAIT`] and panics if it never
/// holds.
pub async fn wait_for(description: &str, condition: impl FnMut() -> bool) {
    assert!(
        wait_for_within(DEFAULT_WAIT, condition).await,
        "condition not reached within {DEFAULT_WAIT:?}: {description}"
    );
}

/// Runs `future` with a [`DEFAULT_WAIT`] bound, panicking on expiry.
///
/// Used around `Dispatcher::stop` so a drain that never completes fails the
/// test instead of hanging it.
pub async fn within_deadline<F: Future>(description: &str, future: F) -> F::Output {
    match tokio::time::timeout(DEFAULT_WAIT, future).await {
        Ok(output) => output,
        Err(_) => panic!("did not complete within {DEFAULT_WAIT:?}: {description}"),
    }
}
