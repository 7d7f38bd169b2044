//! Aggregation behind `GET /v1/nodes` (§6): a plain function over the
//! Lease Manager, callable by whatever router the binary is embedded in.
//! The router/transport itself is an external collaborator.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use vigil_core::{InstanceId, LeaseRecord, LeaseState, NodeReadiness, SessionId};
use vigil_lease::{CoordinatorError, LeaseManager};

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub owner_id: InstanceId,
    pub state: LeaseState,
    pub preferred_owner_id: Option<InstanceId>,
    pub acquired_at: DateTime<Utc>,
    pub last_renewed_at: DateTime<Utc>,
    pub uncertain_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub instance_id: InstanceId,
    pub is_this_instance: bool,
    pub status: NodeReadiness,
    pub owned_sessions: Vec<SessionSummary>,
}

/// Builds one summary row per live node, by aggregating `LiveNodes()`
/// and a per-session `GetLeaseValue` / `PreferredOwner` over the
/// `tracked_sessions` the caller knows about (the core has no global
/// session registry of its own).
pub async fn nodes_summary(
    manager: &LeaseManager,
    tracked_sessions: &[SessionId],
) -> Result<Vec<NodeSummary>, CoordinatorError> {
    let mut by_owner: HashMap<InstanceId, Vec<SessionSummary>> = HashMap::new();

    for session_id in tracked_sessions {
        let Some(raw) = manager.get_lease_value(session_id).await? else {
            continue;
        };
        let record = LeaseRecord::parse(&raw, Utc::now())
            .map_err(|e| CoordinatorError::Validation(session_id.to_string(), e.to_string()))?;
        let preferred_owner_id = manager.preferred_owner(session_id).await?;
        let local = manager.get_lease_info(session_id).await;
        let state = local.as_ref().map(|i| i.state).unwrap_or(LeaseState::Other);
        let uncertain_since = local.and_then(|i| i.uncertain_since);

        by_owner.entry(record.owner_id.clone()).or_default().push(SessionSummary {
            session_id: session_id.clone(),
            owner_id: record.owner_id,
            state,
            preferred_owner_id,
            acquired_at: record.acquired_at,
            last_renewed_at: record.last_renewed_at,
            uncertain_since,
        });
    }

    let mut summaries = Vec::new();
    for node in manager.live_nodes().await? {
        let status = manager.node_status(&node).await?;
        let is_this_instance = &node == manager.id();
        let owned_sessions = by_owner.remove(&node).unwrap_or_default();
        summaries.push(NodeSummary {
            instance_id: node,
            is_this_instance,
            status,
            owned_sessions,
        });
    }
    Ok(summaries)
}
