use crate::error::{AppError, Result};

/// Fixed-window request counter for one rate-limit key
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RateLimitRecord {
    /// Requests accepted in the current window
    pub requests_in_window: i64,
    /// Unix timestamp when the window resets
    pub window_reset_at: i64,
    /// Unix timestamp of the last accepted request
    pub last_request_at: Option<i64>,
}

impl RateLimitRecord {
    /// Create a fresh record whose window starts at `now`
    pub fn new(now: i64, window_secs: i64) -> Self {
        Self {
            requests_in_window: 0,
            window_reset_at: now + window_secs,
            last_request_at: None,
        }
    }

    /// Check if the limit allows one more request, and count it if so.
    /// Returns Err(RateLimitExceeded) without touching the counter otherwise.
    pub fn check_and_increment(&mut self, now: i64, max_requests: u32, window_secs: i64) -> Result<()> {
        // Reset counter if the window has expired
        if now >= self.window_reset_at {
            self.requests_in_window = 0;
            self.window_reset_at = now + window_secs;
        }

        if self.requests_in_window >= i64::from(max_requests) {
            tracing::warn!(
                "Rate limit would be exceeded: {}/{}",
                self.requests_in_window,
                max_requests
            );
            return Err(AppError::RateLimitExceeded);
        }

        self.requests_in_window += 1;
        self.last_request_at = Some(now);

        Ok(())
    }

    /// Seconds until the current window resets
    pub fn retry_after(&self, now: i64) -> i64 {
        (self.window_reset_at - now).max(0)
    }
}
