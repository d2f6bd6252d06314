//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max room messages per second from one connection (movement + position checks)
pub const MESSAGE_RATE_LIMIT: u32 = 120;

/// Per-session rate limiter state
#[derive(Clone)]
pub struct SessionRateLimiter {
    message_limiter: Arc<Limiter>,
}

impl SessionRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(MESSAGE_RATE_LIMIT)
    }

    pub fn with_rate(per_second: u32) -> Self {
        Self {
            message_limiter: create_limiter(per_second),
        }
    }

    /// Check if a message is allowed (returns true if allowed)
    pub fn check_message(&self) -> bool {
        self.message_limiter.check().is_ok()
    }
}

impl Default for SessionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_refused() {
        let limiter = SessionRateLimiter::with_rate(5);
        let allowed = (0..20).filter(|_| limiter.check_message()).count();
        assert!((5..20).contains(&allowed), "allowed {allowed}");
    }
}
