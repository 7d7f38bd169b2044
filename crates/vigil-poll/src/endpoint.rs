//! Per-endpoint poller parameters (§4.6).

use std::time::Duration;

/// `{endpoint, event_type, interval}` tuple driving one poller task.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    /// Path segment appended to the upstream base URL, under the session.
    pub path: &'static str,
    pub event_type: &'static str,
    pub interval: Duration,
    pub timeout: Duration,
    /// Time-series endpoints carry a non-zero `game_time_id`; the status
    /// probe and other identity/configuration endpoints always emit 0.
    pub is_time_series: bool,
    /// Only the status probe accumulates the consecutive-failure count
    /// that flips the cached "upstream down" flag (§4.6).
    pub is_status_probe: bool,
}

impl EndpointSpec {
    pub fn data_default() -> Self {
        Self {
            path: "data",
            event_type: "data",
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(2),
            is_time_series: true,
            is_status_probe: false,
        }
    }

    pub fn status_probe_default() -> Self {
        Self {
            path: "status",
            event_type: "status",
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(1),
            is_time_series: false,
            is_status_probe: true,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::data_default(), Self::status_probe_default()]
    }
}
