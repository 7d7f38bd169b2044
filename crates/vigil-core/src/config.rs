//! Lease tuning knobs (§3, `LeaseConfig`).

use std::time::Duration;

use crate::error::ConfigError;

/// Tuning knobs for the heartbeat and lease state machines.
///
/// Defaults: TTLs 30s, intervals 10s (≈ TTL/3), grace 10s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseConfig {
    pub lease_ttl: Duration,
    pub renewal_interval: Duration,
    pub heartbeat_ttl: Duration,
    pub heartbeat_interval: Duration,
    pub node_discovery_interval: Duration,
    pub init_grace_period: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(30),
            renewal_interval: Duration::from_secs(10),
            heartbeat_ttl: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
            node_discovery_interval: Duration::from_secs(10),
            init_grace_period: Duration::from_secs(10),
        }
    }
}

impl LeaseConfig {
    /// Validate the invariant from §3: every interval must be strictly
    /// less than half its corresponding TTL, so a single missed refresh
    /// cannot expire the key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::check("renewal_interval", self.renewal_interval, self.lease_ttl)?;
        Self::check(
            "heartbeat_interval",
            self.heartbeat_interval,
            self.heartbeat_ttl,
        )?;
        Ok(())
    }

    fn check(field: &'static str, interval: Duration, ttl: Duration) -> Result<(), ConfigError> {
        if interval * 2 >= ttl {
            return Err(ConfigError::IntervalTooLong {
                field,
                interval_ms: interval.as_millis(),
                ttl_ms: ttl.as_millis(),
            });
        }
        Ok(())
    }
}
