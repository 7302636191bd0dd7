//! Bounded quota retry around a generation backend

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::backend::traits::GenerationBackend;
use crate::config::GenerationConfig;
use crate::error::Result;
use crate::payload::ImagePayload;

/// Retry policy for quota-signature failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (2 retries = 3 attempts overall)
    pub max_retries: u32,
    /// Cool-down between attempts, long enough for the per-minute rate
    /// window to reset
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl From<&GenerationConfig> for RetryPolicy {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_retries: config.quota_max_retries,
            cooldown: Duration::from_millis(config.quota_cooldown_ms),
        }
    }
}

/// Wrapper that re-runs the whole call after a quota-signature failure.
///
/// Any other error, and a quota error once retries are exhausted, propagates
/// unmodified so callers can still classify it.
pub struct QuotaRetry<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: GenerationBackend> QuotaRetry<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<B: GenerationBackend> GenerationBackend for QuotaRetry<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, image: &ImagePayload, instruction: &str) -> Result<ImagePayload> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(image, instruction).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_quota_signature() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        cooldown_ms = self.policy.cooldown.as_millis() as u64,
                        "Quota limit hit, waiting for cool-down before retrying"
                    );
                    tokio::time::sleep(self.policy.cooldown).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
