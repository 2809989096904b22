// # Rate Limiter
//
// Bounds how many times a mapping's IP may change per wall-clock hour.
//
// The window is the clock hour the last change fell in (truncated to the top
// of the hour), not a rolling 60 minutes: a change at 10:59:59 and a check at
// 11:00:00 are in different windows. Only accepted changes consume budget;
// polls that report the stored IP never reach the limiter.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::mapping::Mapping;
use crate::{Error, Result};

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the change may proceed
    pub allowed: bool,
    /// Time until the window reopens; zero when allowed
    pub retry_after: Duration,
}

impl RateLimitDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }
}

/// Per-mapping hourly change limiter
///
/// Stateless: the window lives inside [`Mapping`] as `last_ip_change_at` and
/// `hourly_change_count`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    max_changes_per_hour: u32,
}

impl RateLimiter {
    /// Create a limiter allowing `max_changes_per_hour` changes per clock hour
    pub fn new(max_changes_per_hour: u32) -> Self {
        Self {
            max_changes_per_hour,
        }
    }

    /// Create a limiter from configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_changes_per_hour)
    }

    /// Configured hourly limit
    pub fn max_changes_per_hour(&self) -> u32 {
        self.max_changes_per_hour
    }

    /// Decide whether a change to `mapping` is allowed at `now`
    ///
    /// # Parameters
    ///
    /// - `mapping`: The stored mapping, or `None` for a first write
    /// - `now`: Evaluation time
    ///
    /// # Returns
    ///
    /// A decision; when denied, `retry_after` is the time remaining until the
    /// next hour boundary.
    pub fn check(&self, mapping: Option<&Mapping>, now: DateTime<Utc>) -> RateLimitDecision {
        let Some(mapping) = mapping else {
            return RateLimitDecision::allow();
        };

        if !in_same_window(mapping.last_ip_change_at, now) {
            return RateLimitDecision::allow();
        }

        if mapping.hourly_change_count < self.max_changes_per_hour {
            return RateLimitDecision::allow();
        }

        RateLimitDecision::deny(until_next_hour(now))
    }

    /// [`check`](Self::check), converted into a `RateLimited` error when denied
    pub fn enforce(&self, mapping: Option<&Mapping>, now: DateTime<Utc>) -> Result<()> {
        let decision = self.check(mapping, now);
        if decision.allowed {
            Ok(())
        } else {
            Err(Error::rate_limited(
                decision.retry_after,
                self.max_changes_per_hour,
            ))
        }
    }

    /// Record an accepted IP change on `mapping`
    ///
    /// Increments the counter within the same hour, otherwise resets it to 1.
    /// Always sets `last_ip_change_at = now`.
    pub fn update_counters(mapping: &mut Mapping, now: DateTime<Utc>) {
        if in_same_window(mapping.last_ip_change_at, now) {
            mapping.hourly_change_count = mapping.hourly_change_count.saturating_add(1);
        } else {
            mapping.hourly_change_count = 1;
        }
        mapping.last_ip_change_at = Some(now);
    }
}

fn hour_bucket(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis().div_euclid(MILLIS_PER_HOUR)
}

fn in_same_window(last_change: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    last_change.is_some_and(|at| hour_bucket(at) == hour_bucket(now))
}

fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let next_boundary = (hour_bucket(now) + 1) * MILLIS_PER_HOUR;
    let remaining = next_boundary - now.timestamp_millis();
    Duration::from_millis(u64::try_from(remaining).unwrap_or(0))
}
