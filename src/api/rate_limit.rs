//! Request rate limiting

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};

use super::ApiError;
use crate::config::ServerConfig;

/// Global rate limiter
pub type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Limiters for the general, synthesis and transcription routes
#[derive(Clone)]
pub struct RateLimits {
    pub general: SharedLimiter,
    pub synthesis: SharedLimiter,
    pub transcription: SharedLimiter,
}

impl RateLimits {
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            general: create_limiter(config.requests_per_15_minutes, Duration::from_secs(15 * 60)),
            synthesis: create_limiter(config.synthesis_per_minute, Duration::from_secs(60)),
            transcription: create_limiter(config.transcription_per_minute, Duration::from_secs(60)),
        }
    }
}

/// Limiter allowing `requests` per `window`, all of which may arrive at once
#[must_use]
pub fn create_limiter(requests: u32, window: Duration) -> SharedLimiter {
    let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(window / burst.get())
        .map_or_else(|| Quota::per_minute(burst), |q| q.allow_burst(burst));
    Arc::new(RateLimiter::direct(quota))
}

/// Reject the request once the limiter is exhausted
pub async fn rate_limit_middleware(
    State(limiter): State<SharedLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if limiter.check().is_err() {
        tracing::warn!(path = %req.uri().path(), "rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_refuse() {
        let limiter = create_limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check().is_ok());
        }
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_zero_allows_one() {
        let limiter = create_limiter(0, Duration::from_secs(60));
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
