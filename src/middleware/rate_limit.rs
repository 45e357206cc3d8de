//! Rate limiting middleware.
//!
//! Fixed-window attempt counter per client IP, applied to the credential
//! endpoints so passwords and registered emails cannot be probed at full speed.

use crate::error::json_error;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::RETRY_AFTER, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window. Zero disables limiting.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window: Duration::from_secs(60),
        }
    }
}

/// Rate limiter state tracking requests per IP.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, WindowEntry>>>,
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum Decision {
    Allowed { remaining: u32 },
    Exceeded { retry_after: Duration },
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check(&self, ip: IpAddr, now: Instant) -> Decision {
        if self.config.max_requests == 0 {
            return Decision::Allowed {
                remaining: u32::MAX,
            };
        }

        let mut state = self.state.lock();
        let entry = state.entry(ip).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        // Reset window if expired
        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_requests {
            let reset_at = entry.window_start + self.config.window;
            return Decision::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: self.config.max_requests - entry.count,
        }
    }

    /// Drop entries whose window has passed (call from a background task).
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let window = self.config.window;
        state.retain(|_, entry| now.duration_since(entry.window_start) < window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.state.lock().len()
    }
}

/// Rate limiting middleware function.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(ConnectInfo(addr)) = connect_info else {
        debug!("No peer address on request, rate limit not applied");
        return next.run(request).await;
    };

    match limiter.check(addr.ip(), Instant::now()) {
        Decision::Allowed { .. } => next.run(request).await,
        Decision::Exceeded { retry_after } => {
            // Round up so clients never retry inside the window
            let retry_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            warn!(
                ip = %addr.ip(),
                path = %request.uri().path(),
                retry_after_secs = retry_secs,
                "Rate limit exceeded"
            );

            let mut response = json_error(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please slow down.",
            );
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_secs));
            response
        }
    }
}
