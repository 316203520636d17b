//! Rate limiting middleware using keyed GCRA token buckets.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::auth::Identity;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_ip::client_ip;

/// Per-caller request budgets.
///
/// # Limits
///
/// - **Authenticated**: burst of 100, refilled at 25 per minute, keyed by
///   the token subject
/// - **Anonymous**: 5 per minute, keyed by client IP
pub struct RateLimits {
    users: DefaultKeyedRateLimiter<String>,
    anonymous: DefaultKeyedRateLimiter<IpAddr>,
    clock: DefaultClock,
}

fn quota(per_minute: u32, burst: u32) -> Quota {
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::per_minute(per_minute).allow_burst(burst)
}

impl RateLimits {
    pub fn new() -> Self {
        Self::with_quotas(quota(25, 100), quota(5, 5))
    }

    pub fn with_quotas(users: Quota, anonymous: Quota) -> Self {
        Self {
            users: RateLimiter::keyed(users),
            anonymous: RateLimiter::keyed(anonymous),
            clock: DefaultClock::default(),
        }
    }

    /// Takes one token for the user. On rejection returns how long to wait.
    pub fn check_user(&self, subject: &str) -> Result<(), Duration> {
        self.users
            .check_key(&subject.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    pub fn check_anonymous(&self, ip: IpAddr) -> Result<(), Duration> {
        self.anonymous
            .check_key(&ip)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drops buckets that have fully refilled.
    pub fn retain_recent(&self) {
        self.users.retain_recent();
        self.anonymous.retain_recent();
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole seconds to advertise in `Retry-After`, never zero.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Applies the authenticated or anonymous budget to each request.
///
/// Must run after [`crate::api::middleware::auth::authenticate`] so the
/// caller's identity is known.
///
/// # Errors
///
/// Returns `429 Too Many Requests` with a `Retry-After` header when the
/// budget is exhausted.
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let verdict = match req.extensions().get::<Identity>() {
        Some(identity) => st.rate_limits.check_user(&identity.subject),
        None => {
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            let ip = client_ip(req.headers(), peer, st.behind_proxy)
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
            st.rate_limits.check_anonymous(ip)
        }
    };

    if let Err(wait) = verdict {
        let secs = retry_after_secs(wait);
        tracing::debug!(retry_after_secs = secs, "Request rate limited");
        return Err(AppError::too_many_requests(secs));
    }

    Ok(next.run(req).await)
}
