//! Bounded reload-and-retry around one unit of page interaction.
use lingua_common::{HarvestError, Result};
use lingua_config::RetryConfig;
use lingua_drivers::PageDriver;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_backoff: Duration::from_millis(cfg.base_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Pause before retry number `retry` (1-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

/// Run `action`, reloading the view and retrying while it fails with a
/// retryable error and attempts remain.
///
/// `action` is the whole outer operation, so every attempt starts again from
/// fresh element lookups. Non-retryable errors and the error of the final
/// attempt are returned unchanged.
pub async fn guarded<D, T, F, Fut>(
    driver: &D,
    policy: &RetryPolicy,
    op: &str,
    mut action: F,
) -> Result<T>
where
    D: PageDriver,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let err = match action().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(op, attempt, "retry.recovered");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if attempt >= policy.max_attempts {
            warn!(op, attempts = attempt, error = %err, "retry.exhausted");
            return Err(err);
        }

        let pause = policy.backoff(attempt);
        warn!(op, attempt, error = %err, backoff_ms = pause.as_millis() as u64, "retry.reload");
        reload(driver).await?;
        tokio::time::sleep(pause).await;
        attempt += 1;
    }
}

// A reload that itself fails leaves nothing to retry against.
pub(crate) async fn reload<D: PageDriver>(driver: &D) -> Result<()> {
    driver.refresh().await.map_err(|e| match e {
        HarvestError::Fatal(_) => e,
        other => HarvestError::Fatal(format!("reload failed: {other}")),
    })
}
