//! Rate limiting for flood protection.
//!
//! Token buckets via `governor`: one limiter per user for message rate,
//! one per IP for connection rate.

use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovRateLimiter};
use nonzero_ext::nonzero;
use std::net::IpAddr;
use std::num::NonZeroU32;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::state::UserId;

type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Thread-safe rate limit manager.
#[derive(Debug)]
pub struct RateLimitManager {
    /// Per-user message rate limiters.
    message_limiters: DashMap<UserId, DirectRateLimiter>,
    /// Per-IP connection rate limiters.
    connection_limiters: DashMap<IpAddr, DirectRateLimiter>,
    config: RateLimitConfig,
}

impl RateLimitManager {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            message_limiters: DashMap::new(),
            connection_limiters: DashMap::new(),
            config,
        }
    }

    /// Check if a user can send a message. Returns `false` when limited.
    pub fn check_message_rate(&self, user: &str) -> bool {
        let limiter = self
            .message_limiters
            .entry(user.to_string())
            .or_insert_with(|| {
                let rate = NonZeroU32::new(self.config.message_rate_per_second)
                    .unwrap_or(nonzero!(5u32));
                GovRateLimiter::direct(Quota::per_second(rate))
            });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(user = %user, "Message rate limit exceeded");
        }
        allowed
    }

    /// Check if an IP can open a new connection.
    pub fn check_connection_rate(&self, ip: IpAddr) -> bool {
        let limiter = self.connection_limiters.entry(ip).or_insert_with(|| {
            let burst = NonZeroU32::new(self.config.connection_burst_per_ip)
                .unwrap_or(nonzero!(10u32));
            GovRateLimiter::direct(Quota::per_second(nonzero!(1u32)).allow_burst(burst))
        });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(ip = %ip, "Connection rate limit exceeded");
        }
        allowed
    }

    /// Drop a user's limiter on disconnect.
    pub fn remove_user(&self, user: &str) {
        self.message_limiters.remove(user);
    }

    /// Bound memory growth; call from a maintenance task.
    pub fn cleanup(&self) {
        const MAX_ENTRIES: usize = 10_000;

        if self.message_limiters.len() > MAX_ENTRIES {
            self.message_limiters.clear();
            debug!("Cleared message rate limiters (exceeded {MAX_ENTRIES} entries)");
        }
        if self.connection_limiters.len() > MAX_ENTRIES {
            self.connection_limiters.clear();
            debug!("Cleared connection rate limiters (exceeded {MAX_ENTRIES} entries)");
        }
    }
}
