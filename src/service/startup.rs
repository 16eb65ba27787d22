//! Application-side startup: wraps one-shot storage initialization with
//! retries and an overall deadline, and never aborts the process.

use crate::db::Storage;
use crate::service::retry::{RetryPolicy, retry};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartupOutcome {
    Ready,
    /// Continue without a usable schema; `reason` is for display.
    Degraded { reason: String },
}

impl StartupOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, StartupOutcome::Ready)
    }
}

/// Initialize `storage`, retrying per `policy`, giving up after `timeout`.
pub async fn start_storage(
    storage: &Storage,
    policy: &RetryPolicy,
    timeout: Duration,
) -> StartupOutcome {
    let attempt = retry(|| storage.initialize(), policy);
    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(_)) => {
            info!(location = %storage.location(), "storage ready");
            StartupOutcome::Ready
        }
        Ok(Err(e)) => {
            warn!(error = %e, "storage unavailable; continuing in degraded mode");
            StartupOutcome::Degraded {
                reason: e.to_string(),
            }
        }
        Err(_) => {
            warn!(?timeout, "storage initialization timed out; continuing in degraded mode");
            StartupOutcome::Degraded {
                reason: format!("storage initialization timed out after {timeout:?}"),
            }
        }
    }
}
