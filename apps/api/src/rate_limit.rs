//! Per-client request quotas.
//!
//! Two keyed limiters: a general one for the whole API and a stricter one in
//! front of login and registration. Clients are keyed by peer IP.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

/// Tracked clients before stale entries are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

type KeyedLimiter = DefaultKeyedRateLimiter<IpAddr>;

#[derive(Clone)]
pub struct RateLimits {
    api: Arc<KeyedLimiter>,
    auth: Arc<KeyedLimiter>,
}

impl RateLimits {
    pub fn new(api_per_minute: u32, auth_per_minute: u32) -> Self {
        Self {
            api: Arc::new(per_minute(api_per_minute)),
            auth: Arc::new(per_minute(auth_per_minute)),
        }
    }
}

fn per_minute(n: u32) -> KeyedLimiter {
    let n = NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN);
    RateLimiter::keyed(Quota::per_minute(n))
}

fn check(limiter: &KeyedLimiter, ip: IpAddr) -> Result<(), AppError> {
    if limiter.len() > PRUNE_THRESHOLD {
        limiter.retain_recent();
    }
    limiter.check_key(&ip).map_err(|_| {
        warn!("Rate limit exceeded for {ip}");
        AppError::RateLimited
    })
}

fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn limit_api(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    check(&state.limits.api, client_ip(&req))?;
    Ok(next.run(req).await)
}

pub async fn limit_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    check(&state.limits.auth, client_ip(&req))?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exhaustion_is_rate_limited() {
        let limiter = per_minute(3);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        for _ in 0..3 {
            assert!(check(&limiter, ip).is_ok());
        }
        assert!(matches!(check(&limiter, ip), Err(AppError::RateLimited)));
    }

    #[test]
    fn test_clients_are_limited_independently() {
        let limiter = per_minute(1);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(check(&limiter, a).is_ok());
        assert!(check(&limiter, a).is_err());
        assert!(check(&limiter, b).is_ok());
    }

    #[test]
    fn test_zero_quota_still_admits_one() {
        let limiter = per_minute(0);
        assert!(check(&limiter, IpAddr::V4(Ipv4Addr::LOCALHOST)).is_ok());
    }
}
