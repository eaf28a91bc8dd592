// src/backend/retry.rs — Linear backoff for the non-streaming request path
//
// Attempt n (1-based) waits n × base_delay before retrying. Every failure is
// retried, matching what users expect from the plain request flow: a dropped
// connection, a 5xx and a `success: false` reply all get another chance.

use std::future::Future;
use std::time::Duration;

use crate::infra::errors::XeerError;

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }
}

/// Run `op` until it succeeds or the policy is exhausted. `on_retry` is told
/// about each retry before the backoff sleep.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
    mut on_retry: impl FnMut(u32, &XeerError),
) -> Result<T, XeerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, XeerError>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if retry >= policy.max_retries => return Err(e),
            Err(e) => {
                retry += 1;
                let delay = policy.delay_for_retry(retry);
                tracing::warn!(
                    attempt = retry,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    transient = e.is_retriable(),
                    "Retrying after error: {}",
                    e
                );
                on_retry(retry, &e);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
