//! Security configuration: sessions, password policy, rate limiting.

use serde::Deserialize;

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Hours a session token stays valid (default: 720 = 30 days).
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,

    /// Minimum accepted password length (default: 8).
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,

    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            min_password_len: default_min_password_len(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

/// Rate limiting configuration.
///
/// Token-bucket limits enforced by the `governor`-backed
/// [`RateLimitManager`](crate::security::RateLimitManager).
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained API requests per second per client IP (default: 20).
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Login attempts allowed in a burst per client IP (default: 5).
    /// Refills at one attempt per 10 seconds.
    #[serde(default = "default_login_burst_per_ip")]
    pub login_burst_per_ip: u32,

    /// Upload chunk requests allowed in a burst per user (default: 10).
    /// Refills at ten chunks per second.
    #[serde(default = "default_upload_burst_per_user")]
    pub upload_burst_per_user: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            login_burst_per_ip: default_login_burst_per_ip(),
            upload_burst_per_user: default_upload_burst_per_user(),
        }
    }
}

fn default_session_ttl_hours() -> u64 {
    720
}

fn default_min_password_len() -> usize {
    8
}

fn default_requests_per_second() -> u32 {
    20
}

fn default_login_burst_per_ip() -> u32 {
    5
}

fn default_upload_burst_per_user() -> u32 {
    10
}
