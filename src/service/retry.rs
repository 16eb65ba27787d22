use crate::error::StorageError;
use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    Exponential { min: Duration, max: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    pub backoff: Backoff,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                min: Duration::from_millis(500),
                max: Duration::from_secs(3),
            },
            jitter: true,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The last error is returned.
pub async fn retry<T, F, Fut>(op: F, policy: &RetryPolicy) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let retries = policy.max_attempts.saturating_sub(1);
    match policy.backoff {
        Backoff::Fixed(delay) => {
            let mut builder = ConstantBuilder::default()
                .with_delay(delay)
                .with_max_times(retries);
            if policy.jitter {
                builder = builder.with_jitter();
            }
            run(op, builder).await
        }
        Backoff::Exponential { min, max } => {
            let mut builder = ExponentialBuilder::default()
                .with_min_delay(min)
                .with_max_delay(max)
                .with_max_times(retries);
            if policy.jitter {
                builder = builder.with_jitter();
            }
            run(op, builder).await
        }
    }
}

async fn run<T, F, Fut, B>(op: F, backoff: B) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
    B: BackoffBuilder,
{
    op.retry(backoff)
        .when(|e: &StorageError| e.is_retryable())
        .notify(|err: &StorageError, dur: Duration| {
            warn!(error = %err, "storage operation failed; retrying in {:?}", dur);
        })
        .await
}
