//! Node Directory (C4): live-node cache refreshed by scanning `node:*`.
//!
//! Grounded on the teacher's source-registry staleness tracking, but
//! the store itself (not an in-process heartbeat timer) is ground
//! truth here, so the directory only ever reads — the KV Adapter's TTL
//! already expires stale entries.

use std::sync::Arc;

use tokio::sync::RwLock;
use vigil_core::{InstanceId, NodeReadiness};
use vigil_kv::KvStore;

use crate::error::CoordinatorError;
use crate::identity;

const NODE_PREFIX: &str = "node:";

/// Caches the live-node set, refreshed every `node_discovery_interval`.
///
/// The cache is deliberately stale by up to one discovery interval
/// (§4.4) — rendezvous decisions are advisory and self-correct on the
/// next cycle.
pub struct NodeDirectory {
    store: Arc<dyn KvStore>,
    cached_nodes: RwLock<Vec<InstanceId>>,
}

impl NodeDirectory {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            cached_nodes: RwLock::new(Vec::new()),
        }
    }

    /// Rescans `node:*` and replaces the cached snapshot.
    pub async fn refresh(&self) -> Result<(), CoordinatorError> {
        let keys = self
            .store
            .scan(NODE_PREFIX)
            .await
            .map_err(CoordinatorError::StoreUnavailable)?;
        let nodes: Vec<InstanceId> = keys
            .iter()
            .filter_map(|k| k.strip_prefix(NODE_PREFIX))
            .map(InstanceId::new)
            .collect();
        *self.cached_nodes.write().await = nodes;
        Ok(())
    }

    /// Returns the cached snapshot, falling back to a fresh scan if the
    /// cache is empty (§4.4).
    pub async fn live_nodes(&self) -> Result<Vec<InstanceId>, CoordinatorError> {
        {
            let cached = self.cached_nodes.read().await;
            if !cached.is_empty() {
                return Ok(cached.clone());
            }
        }
        self.refresh().await?;
        Ok(self.cached_nodes.read().await.clone())
    }

    /// True iff `id`'s self-reported status is `online`. Always a live
    /// store query — the cached node set only records liveness, not
    /// readiness.
    pub async fn is_node_ready(&self, id: &InstanceId) -> Result<bool, CoordinatorError> {
        let readiness = identity::get_node_status(&self.store, id).await?;
        Ok(readiness == NodeReadiness::Online)
    }
}
