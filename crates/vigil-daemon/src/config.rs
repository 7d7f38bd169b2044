//! Process-wide configuration loading (§3.1, ambient A1).

use std::time::Duration;

use anyhow::Context;
use vigil_core::LeaseConfig;

use crate::cli::RunOpts;

const DEFAULT_KV_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_UPSTREAM_BASE_URL: &str = "http://127.0.0.1:8080";

/// Process-wide settings read once at boot, separate from the pure
/// [`LeaseConfig`] tuning knobs it carries.
pub struct ProcessConfig {
    pub kv_url: String,
    pub node_name: Option<String>,
    pub log_filter: String,
    pub upstream_base_url: String,
    pub lease: LeaseConfig,
}

impl ProcessConfig {
    /// Reads the `VIGIL_*` environment variables on top of `opts`,
    /// validates the lease interval/TTL invariant, and fails fast on any
    /// violation rather than starting a misconfigured instance.
    pub fn load(opts: &RunOpts) -> anyhow::Result<Self> {
        let kv_url = opts
            .kv_url
            .clone()
            .or_else(|| std::env::var("VIGIL_KV_URL").ok())
            .unwrap_or_else(|| DEFAULT_KV_URL.to_string());

        let node_name = opts.node_name.clone().or_else(|| std::env::var("VIGIL_NODE_NAME").ok());

        let upstream_base_url = opts
            .upstream_base_url
            .clone()
            .or_else(|| std::env::var("VIGIL_UPSTREAM_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string());

        let log_filter = std::env::var("VIGIL_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        let defaults = LeaseConfig::default();
        let lease = LeaseConfig {
            lease_ttl: duration_ms_from_env("VIGIL_LEASE_TTL_MS", defaults.lease_ttl)?,
            renewal_interval: duration_ms_from_env("VIGIL_RENEWAL_INTERVAL_MS", defaults.renewal_interval)?,
            heartbeat_ttl: duration_ms_from_env("VIGIL_HEARTBEAT_TTL_MS", defaults.heartbeat_ttl)?,
            heartbeat_interval: duration_ms_from_env("VIGIL_HEARTBEAT_INTERVAL_MS", defaults.heartbeat_interval)?,
            node_discovery_interval: duration_ms_from_env(
                "VIGIL_NODE_DISCOVERY_INTERVAL_MS",
                defaults.node_discovery_interval,
            )?,
            init_grace_period: duration_ms_from_env("VIGIL_INIT_GRACE_PERIOD_MS", defaults.init_grace_period)?,
        };
        lease.validate().context("lease configuration invalid")?;

        Ok(Self {
            kv_url,
            node_name,
            log_filter,
            upstream_base_url,
            lease,
        })
    }
}

fn duration_ms_from_env(name: &str, default: Duration) -> anyhow::Result<Duration> {
    match std::env::var(name) {
        Ok(raw) => {
            let ms: u64 = raw.parse().with_context(|| format!("{name} must be an integer number of milliseconds"))?;
            Ok(Duration::from_millis(ms))
        }
        Err(_) => Ok(default),
    }
}
