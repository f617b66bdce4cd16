//! Retry of the transient authorization failure on create.
//!
//! Right after a connection is created the platform may reject writes under it
//! with a known authorization error code until access policies propagate.
//! Creates that fail that way are re-issued with backoff up to the retry
//! budget. Every other error, and every other operation, propagates on the
//! first failure: creates are not idempotent, so they are never retried
//! blindly.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use quarry_core::{Error, Result, RetryConfig};

use crate::metrics::record_transient_auth_retry;

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// budget is spent.
///
/// # Errors
///
/// Returns the last error from `op`, or [`Error::Cancelled`] if `cancel`
/// fires while waiting between attempts.
pub async fn retry_transient_auth<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.budget.max_attempts();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let Error::TransientAuth { code, message } = &err else {
            return Err(err);
        };
        if attempts >= max_attempts {
            warn!(
                code = %code,
                attempts,
                "transient authorization failure persisted through the retry budget"
            );
            return Err(err);
        }

        let delay = config.backoff.delay_for(attempts);
        debug!(
            code = %code,
            message = %message,
            attempt = attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying create after transient authorization failure"
        );
        record_transient_auth_retry(code);

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled { attempts }),
            () = tokio::time::sleep(delay) => {}
        }
    }
}
