//! Instance Identity (C3): id synthesis and heartbeat publication.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use vigil_core::{Heartbeat, InstanceId, NodeStatus};
use vigil_kv::KvStore;

use crate::error::CoordinatorError;

fn node_key(id: &InstanceId) -> String {
    format!("node:{id}")
}

/// Synthesises a restart-safe instance id when the operator does not
/// supply one: `{hostname}-{process-start-nanos}-{8 hex of a random uuid}`.
pub fn generate_instance_id(operator_name: Option<&str>) -> InstanceId {
    if let Some(name) = operator_name {
        return InstanceId::new(name.to_string());
    }

    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    let start_nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
    InstanceId::new(format!("{host}-{start_nanos}-{suffix}"))
}

/// Registers the initial heartbeat for `id`, failing `Start` if it cannot
/// be published (§4.5).
pub async fn register_heartbeat(
    store: &Arc<dyn KvStore>,
    id: &InstanceId,
    status: NodeStatus,
    startup_time: DateTime<Utc>,
    ttl: Duration,
) -> Result<(), CoordinatorError> {
    refresh_heartbeat(store, id, status, startup_time, ttl).await
}

/// Overwrites the heartbeat value, used both for the initial publish and
/// every subsequent `heartbeat_interval` tick.
pub async fn refresh_heartbeat(
    store: &Arc<dyn KvStore>,
    id: &InstanceId,
    status: NodeStatus,
    startup_time: DateTime<Utc>,
    ttl: Duration,
) -> Result<(), CoordinatorError> {
    let heartbeat = Heartbeat {
        status,
        startup_time,
    };
    let value = serde_json::to_string(&heartbeat)
        .map_err(|e| CoordinatorError::Validation(id.to_string(), e.to_string()))?;
    store
        .set(&node_key(id), &value, ttl)
        .await
        .map_err(CoordinatorError::StoreUnavailable)
}

/// Deletes the heartbeat key on graceful `Stop`.
pub async fn remove_heartbeat(
    store: &Arc<dyn KvStore>,
    id: &InstanceId,
) -> Result<(), CoordinatorError> {
    store
        .delete(&node_key(id))
        .await
        .map_err(CoordinatorError::StoreUnavailable)
}

/// Reads `id`'s self-reported status. A missing key is `offline` (§4.3).
pub async fn get_node_status(
    store: &Arc<dyn KvStore>,
    id: &InstanceId,
) -> Result<vigil_core::NodeReadiness, CoordinatorError> {
    match store
        .get(&node_key(id))
        .await
        .map_err(CoordinatorError::StoreUnavailable)?
    {
        None => Ok(vigil_core::NodeReadiness::Offline),
        Some(raw) => {
            let heartbeat: Heartbeat = serde_json::from_str(&raw)
                .map_err(|e| CoordinatorError::Validation(id.to_string(), e.to_string()))?;
            Ok(heartbeat.status.into())
        }
    }
}
