//! Fixed-window invocation limiter

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug)]
struct Window {
    reset_at: Option<Instant>,
    invokes_left: u32,
}

/// At most `max_invokes` calls per `window`
///
/// The window starts at the first call after a refill. Callers that find it
/// exhausted sleep until it resets, queued behind the state lock in arrival order.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    window: Duration,
    max_invokes: u32,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(name: &'static str, window: Duration, max_invokes: u32) -> Self {
        let max_invokes = max_invokes.max(1);
        Self {
            name,
            window,
            max_invokes,
            state: Mutex::new(Window {
                reset_at: None,
                invokes_left: max_invokes,
            }),
        }
    }

    /// One Identify per 5 seconds
    pub fn identify() -> Self {
        Self::new("identify", Duration::from_secs(5), 1)
    }

    /// 120 outbound payloads per minute
    pub fn outbound() -> Self {
        Self::new("outbound", Duration::from_secs(60), 120)
    }

    /// 5 status updates per minute
    pub fn status_update() -> Self {
        Self::new("status_update", Duration::from_secs(60), 5)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Take one slot, waiting for the window to reset if none are left
    pub async fn invoke(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        let mut state = tokio::select! {
            () = cancel.cancelled() => return Err(GatewayError::Cancelled),
            guard = self.state.lock() => guard,
        };

        let now = Instant::now();
        if state.reset_at.is_some_and(|reset_at| now >= reset_at) {
            state.reset_at = None;
            state.invokes_left = self.max_invokes;
        }

        if state.invokes_left > 0 {
            if state.reset_at.is_none() {
                state.reset_at = Some(now + self.window);
            }
            state.invokes_left -= 1;
            return Ok(());
        }

        let reset_at = state.reset_at.unwrap_or(now);
        tracing::debug!(
            limiter = self.name,
            wait_ms = u64::try_from(reset_at.saturating_duration_since(now).as_millis()).unwrap_or(u64::MAX),
            "Rate limit reached, waiting for window"
        );

        tokio::select! {
            () = cancel.cancelled() => return Err(GatewayError::Cancelled),
            () = tokio::time::sleep_until(reset_at) => {}
        }

        state.reset_at = Some(Instant::now() + self.window);
        state.invokes_left = self.max_invokes - 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_second_call_waits_for_window() {
        let limiter = RateLimiter::new("test", Duration::from_secs(5), 1);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        limiter.invoke(&cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.invoke(&cancel).await.unwrap();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(4_900), "waited {waited:?}");
        assert!(waited <= Duration::from_millis(5_100), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_after_window_does_not_block() {
        let limiter = RateLimiter::identify();
        let cancel = CancellationToken::new();

        limiter.invoke(&cancel).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let start = Instant::now();
        limiter.invoke(&cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_window() {
        let limiter = RateLimiter::status_update();
        let cancel = CancellationToken::new();

        let start = Instant::now();
        for _ in 0..5 {
            limiter.invoke(&cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.invoke(&cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let limiter = RateLimiter::new("test", Duration::from_secs(5), 1);
        let cancel = CancellationToken::new();
        limiter.invoke(&cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = limiter.invoke(&cancel).await;
        assert!(matches!(result, Err(GatewayError::Cancelled)));
    }

    #[test]
    fn test_zero_max_is_clamped() {
        let limiter = RateLimiter::new("test", Duration::from_secs(1), 0);
        assert_eq!(limiter.max_invokes, 1);
        assert_eq!(limiter.name(), "test");
    }
}
