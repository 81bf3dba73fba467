// RELIABILITY: Bounded retry with a single deadline
//
// Wraps any ModelClient. The `timeout` handed to `invoke` is the total budget
// for all attempts; each attempt gets whatever remains of it. Retryable
// failures are retried `max_retries` times with exponential backoff, after
// which the last error surfaces unchanged.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::traits::{ModelClient, ModelOutput, ModelPayload, OperationKind, SharedModelClient};
use crate::error::{InvocationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt + 1`: base, 2x base, 4x base, ...
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

pub struct RetryingClient {
    inner: SharedModelClient,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: SharedModelClient, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ModelClient for RetryingClient {
    async fn invoke(
        &self,
        kind: OperationKind,
        payload: &ModelPayload,
        timeout: Duration,
    ) -> Result<ModelOutput> {
        let deadline = Instant::now() + timeout;
        let mut attempt: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(InvocationError::Timeout(timeout));
            }

            let started = Instant::now();
            let outcome = match tokio::time::timeout(
                remaining,
                self.inner.invoke(kind, payload, remaining),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(InvocationError::Timeout(timeout)),
            };

            let err = match outcome {
                Ok(output) => {
                    tracing::debug!(
                        operation = %kind,
                        backend = self.inner.name(),
                        attempt = attempt + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Model call succeeded"
                    );
                    return Ok(output);
                }
                Err(err) => err,
            };

            tracing::warn!(
                operation = %kind,
                backend = self.inner.name(),
                attempt = attempt + 1,
                max_attempts = self.policy.max_retries + 1,
                error = %err,
                "Model call failed"
            );

            if !err.is_retryable() || attempt >= self.policy.max_retries {
                return Err(err);
            }

            let backoff = self.policy.backoff_for(attempt);
            if Instant::now() + backoff >= deadline {
                return Err(err);
            }
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
