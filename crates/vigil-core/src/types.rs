//! Wire and in-memory data model for heartbeats and leases (§3).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LeaseParseError;
use crate::ids::InstanceId;

// ─── Node status ───────────────────────────────────────────────────

/// Self-reported lifecycle status of a fleet instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum NodeStatus {
    /// Boot-time grace window; never acquires or is handed a lease.
    Init,
    /// Fully available for lease acquisition and voluntary handoff.
    Online,
}

impl NodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Online => "online",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = LeaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "online" => Ok(Self::Online),
            other => Err(LeaseParseError::InvalidStatus(other.to_string())),
        }
    }
}

/// Readiness of a node as observed through the directory (§4.4).
///
/// Distinct from [`NodeStatus`]: a missing heartbeat key collapses to
/// `Offline`, which has no self-reported counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NodeReadiness {
    Init,
    Online,
    Offline,
}

impl From<NodeStatus> for NodeReadiness {
    fn from(status: NodeStatus) -> Self {
        match status {
            NodeStatus::Init => Self::Init,
            NodeStatus::Online => Self::Online,
        }
    }
}

// ─── Heartbeat ─────────────────────────────────────────────────────

/// Value stored at `node:{InstanceID}` (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub status: NodeStatus,
    pub startup_time: DateTime<Utc>,
}

// ─── Lease wire record ─────────────────────────────────────────────

/// Value stored at `lease:{SessionID}` (§3, current wire format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub owner_id: InstanceId,
    pub acquired_at: DateTime<Utc>,
    pub last_renewed_at: DateTime<Utc>,
}

impl LeaseRecord {
    pub fn new(owner_id: InstanceId, now: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            acquired_at: now,
            last_renewed_at: now,
        }
    }

    pub fn renewed(&self, now: DateTime<Utc>) -> Self {
        Self {
            owner_id: self.owner_id.clone(),
            acquired_at: self.acquired_at,
            last_renewed_at: now,
        }
    }

    /// Parse a raw KV value, accepting the legacy bare-string format
    /// (§6: "implementations must accept a plain-string lease value").
    ///
    /// A legacy value carries only an owner id; `acquired_at` and
    /// `last_renewed_at` are set to `now` since the original timestamps
    /// are unrecoverable. The very next renewal writes the current JSON
    /// format, transparently upgrading the key.
    pub fn parse(raw: &str, now: DateTime<Utc>) -> Result<Self, LeaseParseError> {
        if let Some(record) = Self::try_parse_json(raw)? {
            return Ok(record);
        }
        let owner = raw.trim();
        if owner.is_empty() {
            return Err(LeaseParseError::Empty);
        }
        Ok(Self::new(InstanceId::new(owner), now))
    }

    fn try_parse_json(raw: &str) -> Result<Option<Self>, LeaseParseError> {
        let trimmed = raw.trim_start();
        if !trimmed.starts_with('{') {
            return Ok(None);
        }
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| LeaseParseError::MalformedJson(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, LeaseParseError> {
        serde_json::to_string(self).map_err(|e| LeaseParseError::MalformedJson(e.to_string()))
    }
}

// ─── In-memory lease view ──────────────────────────────────────────

/// Per-instance view of ownership for a single lease (§3, in memory).
///
/// `Other` is part of the public enum for observability but is never
/// inserted into the owned-lease map — a lease this instance does not
/// believe it owns is simply absent from the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum LeaseState {
    Unknown,
    Owned,
    Other,
    Uncertain,
}

/// Mirror of a lease this instance believes it owns (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseInfo {
    pub session_id: crate::ids::SessionId,
    pub owner_id: InstanceId,
    pub state: LeaseState,
    pub acquired_at: DateTime<Utc>,
    pub last_renewed_at: DateTime<Utc>,
    pub uncertain_since: Option<DateTime<Utc>>,
}

impl LeaseInfo {
    pub fn owned(session_id: crate::ids::SessionId, owner_id: InstanceId, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            owner_id,
            state: LeaseState::Owned,
            acquired_at: now,
            last_renewed_at: now,
            uncertain_since: None,
        }
    }
}

// ─── Event envelope (C7) ───────────────────────────────────────────

/// Typed event envelope handed from the Poll Scheduler to the external
/// fan-out layer (§4.7).
///
/// `game_time_id` is non-zero only for time-series event types; it is
/// the dedup/ordering key consumers use (`game_time_id > last_seen_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub session_id: crate::ids::SessionId,
    pub event_type: String,
    pub data: serde_json::Value,
    pub game_time_id: u64,
}
