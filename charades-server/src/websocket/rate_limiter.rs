use tokio::time::{Duration, Instant};

/// Token bucket: `max_tokens` burst, refilled continuously at `per_second`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: f64,
    max_tokens: f64,
    per_second: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::new_with_limits(120, 30)
    }

    pub fn new_with_limits(max_tokens: u32, per_second: u32) -> Self {
        Self {
            tokens: max_tokens as f64,
            max_tokens: max_tokens as f64,
            per_second: per_second as f64,
            last_refill: Instant::now(),
        }
    }

    pub fn check_rate_limit(&mut self) -> bool {
        self.refill_tokens();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill_tokens(&mut self) {
        let now = Instant::now();
        let time_passed: Duration = now.duration_since(self.last_refill);
        self.tokens =
            (self.tokens + time_passed.as_secs_f64() * self.per_second).min(self.max_tokens);
        self.last_refill = now;
    }

    pub fn get_remaining_tokens(&mut self) -> u32 {
        self.refill_tokens();
        self.tokens as u32
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_refill() {
        let mut limiter = RateLimiter::new_with_limits(3, 2);
        assert!(limiter.check_rate_limit());
        assert!(limiter.check_rate_limit());
        assert!(limiter.check_rate_limit());
        assert!(!limiter.check_rate_limit());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.check_rate_limit());
        assert!(!limiter.check_rate_limit());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(limiter.get_remaining_tokens(), 3);
    }
}
