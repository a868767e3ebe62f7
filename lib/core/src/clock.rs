//! Injectable suspension point.
//!
//! Poll loops sleep through a [`Sleeper`] instead of calling
//! `tokio::time::sleep` directly, so tests can observe the requested delays
//! and skip wall-clock waiting entirely.

use async_trait::async_trait;
use std::time::Duration;

/// Something that can suspend the current task for a duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
