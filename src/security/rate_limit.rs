//! Rate limiting for abuse protection.
//!
//! Provides governor-based rate limiting for:
//! - API request rate per client IP
//! - Login attempt rate per client IP
//! - Upload chunk rate per user
//!
//! # Architecture
//!
//! Uses the `governor` crate's token bucket algorithm with configurable
//! rates and bursts. Each limiter type has its own storage to prevent
//! interference.

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovRateLimiter};
use nonzero_ext::nonzero;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

/// Type alias for governor's direct rate limiter.
type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Thread-safe rate limit manager using governor.
#[derive(Debug)]
pub struct RateLimitManager {
    /// Per-IP request rate limiters.
    request_limiters: DashMap<IpAddr, DirectRateLimiter>,
    /// Per-IP login attempt limiters.
    login_limiters: DashMap<IpAddr, DirectRateLimiter>,
    /// Per-user upload chunk limiters.
    upload_limiters: DashMap<i64, DirectRateLimiter>,
    /// Configuration values.
    config: Arc<RateLimitConfig>,
}

impl RateLimitManager {
    /// Create a new rate limit manager with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            request_limiters: DashMap::new(),
            login_limiters: DashMap::new(),
            upload_limiters: DashMap::new(),
            config: Arc::new(config),
        }
    }

    /// Check if an IP may issue another API request.
    ///
    /// Returns `true` if allowed, `false` if rate limited.
    pub fn check_request_rate(&self, ip: IpAddr) -> bool {
        let limiter = self.request_limiters.entry(ip).or_insert_with(|| {
            let rate = NonZeroU32::new(self.config.requests_per_second)
                .unwrap_or(nonzero!(20u32));
            GovRateLimiter::direct(Quota::per_second(rate).allow_burst(
                rate.saturating_mul(nonzero!(2u32)),
            ))
        });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(ip = %ip, "request rate limit exceeded");
        }
        allowed
    }

    /// Check if an IP may attempt another login.
    ///
    /// Logins refill slowly (one per 10 seconds) with a configurable burst,
    /// which keeps credential stuffing expensive without locking out a
    /// user who typoes a password a few times.
    pub fn check_login_rate(&self, ip: IpAddr) -> bool {
        let limiter = self.login_limiters.entry(ip).or_insert_with(|| {
            let burst = NonZeroU32::new(self.config.login_burst_per_ip)
                .unwrap_or(nonzero!(5u32));
            GovRateLimiter::direct(
                Quota::with_period(std::time::Duration::from_secs(10))
                    .unwrap_or_else(|| Quota::per_second(nonzero!(1u32)))
                    .allow_burst(burst),
            )
        });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(ip = %ip, "login rate limit exceeded");
        }
        allowed
    }

    /// Check if a user may send another upload chunk.
    ///
    /// Returns `true` if allowed, `false` if rate limited.
    pub fn check_upload_rate(&self, user_id: i64) -> bool {
        let limiter = self.upload_limiters.entry(user_id).or_insert_with(|| {
            let burst = NonZeroU32::new(self.config.upload_burst_per_user)
                .unwrap_or(nonzero!(10u32));
            GovRateLimiter::direct(Quota::per_second(nonzero!(10u32)).allow_burst(burst))
        });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(user_id = user_id, "upload rate limit exceeded");
        }
        allowed
    }

    /// Drop limiters whose buckets are full again.
    ///
    /// The maps are keyed by IP/user and grow unbounded without pruning;
    /// a background task calls this periodically.
    pub fn cleanup(&self) {
        self.request_limiters
            .retain(|_, limiter| limiter.check().is_err());
        self.login_limiters
            .retain(|_, limiter| limiter.check().is_err());
        self.upload_limiters
            .retain(|_, limiter| limiter.check().is_err());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn manager(requests: u32, login_burst: u32, upload_burst: u32) -> RateLimitManager {
        RateLimitManager::new(RateLimitConfig {
            requests_per_second: requests,
            login_burst_per_ip: login_burst,
            upload_burst_per_user: upload_burst,
        })
    }

    #[test]
    fn request_burst_exhausts() {
        let manager = manager(1, 5, 10);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);

        // rate 1/s with burst 2
        assert!(manager.check_request_rate(ip));
        assert!(manager.check_request_rate(ip));
        assert!(!manager.check_request_rate(ip));
    }

    #[test]
    fn login_burst_exhausts() {
        let manager = manager(1000, 3, 10);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        for _ in 0..3 {
            assert!(manager.check_login_rate(ip));
        }
        assert!(!manager.check_login_rate(ip));
    }

    #[test]
    fn limits_are_per_key() {
        let manager = manager(1, 5, 2);

        assert!(manager.check_upload_rate(1));
        assert!(manager.check_upload_rate(1));
        assert!(!manager.check_upload_rate(1));
        // A different user has their own bucket
        assert!(manager.check_upload_rate(2));
    }
}
