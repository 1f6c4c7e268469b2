//! Rate limiting middleware
//!
//! Per-client-IP limits for the login, registration and check-in endpoints,
//! backed by a keyed `governor` limiter.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tracing::{debug, warn};

use crate::config::RateLimitSettings;
use crate::handlers::error::HttpError;
use crate::state::AppState;
use crate::utils::errors::{CulturalCenterError, Result};

type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Rate limiting middleware
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Option<Arc<KeyedLimiter>>,
    requests: u32,
    period: Duration,
}

impl RateLimitMiddleware {
    /// Create a limiter allowing `requests` per `period_seconds` for each client
    pub fn new(config: &RateLimitSettings) -> Result<Self> {
        let period = Duration::from_secs(config.period_seconds);
        if !config.enabled {
            return Ok(Self {
                limiter: None,
                requests: config.requests,
                period,
            });
        }

        let burst = NonZeroU32::new(config.requests)
            .ok_or_else(|| CulturalCenterError::Config("rate_limit.requests must be positive".to_string()))?;
        let quota = Quota::with_period(period / config.requests)
            .ok_or_else(|| CulturalCenterError::Config("rate_limit.period_seconds must be positive".to_string()))?
            .allow_burst(burst);

        Ok(Self {
            limiter: Some(Arc::new(RateLimiter::keyed(quota))),
            requests: config.requests,
            period,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Consume one request from the client's budget
    pub fn check(&self, client: IpAddr) -> Result<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        match limiter.check_key(&client) {
            Ok(()) => {
                debug!(client = %client, "Rate limit check passed");
                Ok(())
            }
            Err(_) => {
                warn!(
                    client = %client,
                    limit = self.requests,
                    period_secs = self.period.as_secs(),
                    "Rate limit exceeded"
                );
                Err(CulturalCenterError::RateLimitExceeded)
            }
        }
    }

    /// Drop state for clients whose budget has fully recovered
    pub fn cleanup(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.limiter.as_ref().map_or(0, |l| l.len())
    }
}

impl std::fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("enabled", &self.is_enabled())
            .field("requests", &self.requests)
            .field("period", &self.period)
            .finish()
    }
}

/// Client address: first `X-Forwarded-For` hop, then the socket peer
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Axum middleware applying the limiter to the routes it wraps
pub async fn limit_by_ip(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_ip(request.headers(), peer);

    if let Err(e) = state.rate_limiter.check(client) {
        return HttpError::from(e).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(requests: u32) -> RateLimitSettings {
        RateLimitSettings {
            enabled: true,
            requests,
            period_seconds: 60,
        }
    }

    #[test]
    fn test_limit_is_per_client() {
        let limiter = RateLimitMiddleware::new(&settings(2)).unwrap();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(a).is_ok());
        assert!(matches!(limiter.check(a), Err(CulturalCenterError::RateLimitExceeded)));
        assert!(limiter.check(b).is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_disabled_limiter_allows_everything() {
        let limiter = RateLimitMiddleware::new(&RateLimitSettings {
            enabled: false,
            requests: 1,
            period_seconds: 60,
        })
        .unwrap();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        for _ in 0..10 {
            assert!(limiter.check(ip).is_ok());
        }
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7".parse::<IpAddr>().unwrap());
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), peer.ip());
    }
}
