//! Lease Manager (C5): the core of the design (§4.5).
//!
//! Acquire / renew / release / re-acquire / voluntary-handoff, guarded
//! by three independent locks in the order status → owned-leases →
//! cached-nodes (never more than one held at once here — the directory
//! owns its own lock internally). Background loops share a single
//! [`CancellationToken`] and a join-handle wait group, mirroring the
//! teacher's `tokio::select!` + token shutdown pattern.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vigil_core::{
    preferred_owner, InstanceId, LeaseConfig, LeaseInfo, LeaseRecord, LeaseState, NodeStatus,
    SessionId,
};
use vigil_kv::KvStore;

use crate::directory::NodeDirectory;
use crate::error::CoordinatorError;
use crate::identity;

fn lease_key(session_id: &SessionId) -> String {
    format!("lease:{session_id}")
}

/// Per-instance state of every lease this node holds, plus the
/// background loops that keep it converged with the shared store.
pub struct LeaseManager {
    id: InstanceId,
    config: LeaseConfig,
    store: Arc<dyn KvStore>,
    directory: Arc<NodeDirectory>,
    owned: RwLock<HashMap<SessionId, LeaseInfo>>,
    status: RwLock<NodeStatus>,
    startup_time: chrono::DateTime<Utc>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LeaseManager {
    pub fn new(id: InstanceId, config: LeaseConfig, store: Arc<dyn KvStore>) -> Arc<Self> {
        let directory = Arc::new(NodeDirectory::new(store.clone()));
        Arc::new(Self {
            id,
            config,
            store,
            directory,
            owned: RwLock::new(HashMap::new()),
            status: RwLock::new(NodeStatus::Init),
            startup_time: Utc::now(),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Registers the heartbeat, performs the first directory scan, and
    /// spawns the four background loops (§5).
    pub async fn start(self: &Arc<Self>) -> Result<(), CoordinatorError> {
        identity::register_heartbeat(
            &self.store,
            &self.id,
            NodeStatus::Init,
            self.startup_time,
            self.config.heartbeat_ttl,
        )
        .await?;
        self.directory.refresh().await?;

        self.spawn_status_transition_loop();
        self.spawn_heartbeat_loop();
        self.spawn_renewal_loop();
        self.spawn_node_discovery_loop();

        Ok(())
    }

    /// Releases every held lease, removes the heartbeat, and joins all
    /// background loops. Best-effort: always returns (§4.5).
    pub async fn stop(&self) {
        self.cancel.cancel();

        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        let sessions: Vec<SessionId> = self.owned.read().await.keys().cloned().collect();
        for session_id in sessions {
            if let Err(err) = self.release(&session_id).await {
                tracing::warn!(session_id = %session_id, error = %err, "release during stop failed");
            }
        }

        if let Err(err) = identity::remove_heartbeat(&self.store, &self.id).await {
            tracing::warn!(error = %err, "heartbeat removal during stop failed");
        }
    }

    // ── Public operations (§4.5 table) ──────────────────────────────

    pub async fn try_acquire(&self, session_id: &SessionId) -> Result<bool, CoordinatorError> {
        if self.is_owned(session_id).await {
            return Ok(true);
        }
        if *self.status.read().await != NodeStatus::Online {
            // Anti-churn clause: new instances never steal leases during grace.
            return Ok(false);
        }

        let nodes = self.directory.live_nodes().await?;
        let preferred = preferred_owner(session_id, &nodes);
        if preferred.as_ref() != Some(&self.id) {
            let existing = self
                .store
                .get(&lease_key(session_id))
                .await
                .map_err(CoordinatorError::StoreUnavailable)?;
            if existing.is_some() {
                // Defer to the current holder; don't race the preferred owner.
                return Ok(false);
            }
        }

        let now = Utc::now();
        let record = LeaseRecord::new(self.id.clone(), now);
        let value = record
            .to_json()
            .map_err(|e| CoordinatorError::Validation(session_id.to_string(), e.to_string()))?;

        match self
            .store
            .set_if_absent(&lease_key(session_id), &value, self.config.lease_ttl)
            .await
            .map_err(CoordinatorError::StoreUnavailable)?
        {
            true => {
                self.owned.write().await.insert(
                    session_id.clone(),
                    LeaseInfo::owned(session_id.clone(), self.id.clone(), now),
                );
                Ok(true)
            }
            false => Ok(false),
        }
    }

    /// Idempotent: succeeds even if this instance does not currently own
    /// the lease. Fails only on store I/O (§4.5).
    pub async fn release(&self, session_id: &SessionId) -> Result<(), CoordinatorError> {
        self.store
            .conditional_delete(&lease_key(session_id), self.id.as_str())
            .await
            .map_err(CoordinatorError::StoreUnavailable)?;
        self.owned.write().await.remove(session_id);
        Ok(())
    }

    pub async fn is_owned(&self, session_id: &SessionId) -> bool {
        matches!(
            self.owned.read().await.get(session_id),
            Some(info) if info.state == LeaseState::Owned
        )
    }

    pub async fn is_uncertain(&self, session_id: &SessionId) -> bool {
        matches!(
            self.owned.read().await.get(session_id),
            Some(info) if info.state == LeaseState::Uncertain
        )
    }

    /// Goes to the store directly, for pre-critical-operation checks.
    pub async fn is_owned_strict(&self, session_id: &SessionId) -> Result<bool, CoordinatorError> {
        Ok(self.get_lease_owner(session_id).await? == Some(self.id.clone()))
    }

    pub async fn owned_sessions(&self) -> Vec<SessionId> {
        self.owned
            .read()
            .await
            .iter()
            .filter(|(_, info)| info.state == LeaseState::Owned)
            .map(|(session_id, _)| session_id.clone())
            .collect()
    }

    pub async fn preferred_owner(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InstanceId>, CoordinatorError> {
        let nodes = self.directory.live_nodes().await?;
        Ok(preferred_owner(session_id, &nodes))
    }

    pub async fn is_preferred_owner(&self, session_id: &SessionId) -> Result<bool, CoordinatorError> {
        Ok(self.preferred_owner(session_id).await? == Some(self.id.clone()))
    }

    pub async fn get_lease_info(&self, session_id: &SessionId) -> Option<LeaseInfo> {
        self.owned.read().await.get(session_id).cloned()
    }

    pub async fn get_lease_owner(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<InstanceId>, CoordinatorError> {
        match self.get_lease_value(session_id).await? {
            None => Ok(None),
            Some(raw) => {
                let record = LeaseRecord::parse(&raw, Utc::now())
                    .map_err(|e| CoordinatorError::Validation(session_id.to_string(), e.to_string()))?;
                Ok(Some(record.owner_id))
            }
        }
    }

    pub async fn get_lease_value(&self, session_id: &SessionId) -> Result<Option<String>, CoordinatorError> {
        self.store
            .get(&lease_key(session_id))
            .await
            .map_err(CoordinatorError::StoreUnavailable)
    }

    /// Cached live-node snapshot, for callers (e.g. a nodes-summary
    /// aggregation) that need the directory without reaching into it.
    pub async fn live_nodes(&self) -> Result<Vec<InstanceId>, CoordinatorError> {
        self.directory.live_nodes().await
    }

    /// Self-reported readiness of any node, including this one.
    pub async fn node_status(&self, id: &InstanceId) -> Result<vigil_core::NodeReadiness, CoordinatorError> {
        identity::get_node_status(&self.store, id).await
    }

    // ── Background loops (§5) ───────────────────────────────────────

    fn spawn_status_transition_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let grace = self.config.init_grace_period;
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(grace) => {
                    *this.status.write().await = NodeStatus::Online;
                    tracing::info!(instance = %this.id, "status transitioned to online");
                }
                () = cancel.cancelled() => {}
            }
        });
        self.tasks.try_lock().expect("start() is not reentrant").push(handle);
    }

    fn spawn_heartbeat_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let interval = self.config.heartbeat_interval;
        let ttl = self.config.heartbeat_ttl;
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let status = *this.status.read().await;
                        if let Err(err) = identity::refresh_heartbeat(
                            &this.store,
                            &this.id,
                            status,
                            this.startup_time,
                            ttl,
                        )
                        .await
                        {
                            tracing::warn!(error = %err, "heartbeat refresh failed");
                        }
                    }
                    () = cancel.cancelled() => break,
                }
            }
        });
        self.tasks.try_lock().expect("start() is not reentrant").push(handle);
    }

    fn spawn_node_discovery_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let interval = self.config.node_discovery_interval;
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = this.directory.refresh().await {
                            tracing::warn!(error = %err, "node discovery refresh failed");
                        }
                    }
                    () = cancel.cancelled() => break,
                }
            }
        });
        self.tasks.try_lock().expect("start() is not reentrant").push(handle);
    }

    fn spawn_renewal_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let interval = self.config.renewal_interval;
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.renewal_tick().await,
                    () = cancel.cancelled() => break,
                }
            }
        });
        self.tasks.try_lock().expect("start() is not reentrant").push(handle);
    }

    /// One renewal-tick: renew owned leases, re-acquire uncertain ones,
    /// then run voluntary handoff — serialised in that order (§5).
    async fn renewal_tick(&self) {
        let now = Utc::now();
        let snapshot: Vec<(SessionId, LeaseInfo)> = self
            .owned
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (session_id, info) in &snapshot {
            match info.state {
                LeaseState::Owned => self.renew_one(session_id, info, now).await,
                LeaseState::Uncertain => self.reacquire_one(session_id).await,
                LeaseState::Unknown | LeaseState::Other => {}
            }
        }

        let owned_now: Vec<SessionId> = self
            .owned
            .read()
            .await
            .iter()
            .filter(|(_, info)| info.state == LeaseState::Owned)
            .map(|(session_id, _)| session_id.clone())
            .collect();
        for session_id in owned_now {
            self.handoff_check(&session_id).await;
        }
    }

    async fn renew_one(&self, session_id: &SessionId, info: &LeaseInfo, now: chrono::DateTime<Utc>) {
        let record = LeaseRecord {
            owner_id: self.id.clone(),
            acquired_at: info.acquired_at,
            last_renewed_at: now,
        };
        let value = match record.to_json() {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "failed to serialise lease record");
                self.mark_uncertain(session_id, now).await;
                return;
            }
        };

        match self
            .store
            .conditional_update(&lease_key(session_id), self.id.as_str(), &value, self.config.lease_ttl)
            .await
        {
            Ok(true) => {
                let mut owned = self.owned.write().await;
                if let Some(entry) = owned.get_mut(session_id) {
                    entry.state = LeaseState::Owned;
                    entry.last_renewed_at = now;
                    entry.uncertain_since = None;
                }
            }
            Ok(false) => {
                tracing::warn!(session_id = %session_id, "renewal lost the lease, marking uncertain");
                self.mark_uncertain(session_id, now).await;
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "renewal store error, marking uncertain");
                self.mark_uncertain(session_id, now).await;
            }
        }
    }

    async fn mark_uncertain(&self, session_id: &SessionId, now: chrono::DateTime<Utc>) {
        let mut owned = self.owned.write().await;
        if let Some(entry) = owned.get_mut(session_id) {
            entry.state = LeaseState::Uncertain;
            if entry.uncertain_since.is_none() {
                entry.uncertain_since = Some(now);
            }
        }
    }

    /// Re-acquisition of an uncertain lease, piggybacked on the renewal
    /// loop (§4.5).
    async fn reacquire_one(&self, session_id: &SessionId) {
        let now = Utc::now();
        let raw = match self.store.get(&lease_key(session_id)).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "reacquire store error, retrying next tick");
                return;
            }
        };

        let Some(raw) = raw else {
            tracing::info!(session_id = %session_id, "lease expired");
            self.owned.write().await.remove(session_id);
            return;
        };

        let record = match LeaseRecord::parse(&raw, now) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "malformed lease value, dropping");
                self.owned.write().await.remove(session_id);
                return;
            }
        };

        if record.owner_id != self.id {
            tracing::info!(session_id = %session_id, "lease taken over by another instance");
            self.owned.write().await.remove(session_id);
            return;
        }

        let value = match record.renewed(now).to_json() {
            Ok(v) => v,
            Err(_) => {
                self.owned.write().await.remove(session_id);
                return;
            }
        };
        match self
            .store
            .conditional_update(&lease_key(session_id), self.id.as_str(), &value, self.config.lease_ttl)
            .await
        {
            Ok(true) => {
                let mut owned = self.owned.write().await;
                if let Some(entry) = owned.get_mut(session_id) {
                    entry.state = LeaseState::Owned;
                    entry.last_renewed_at = now;
                    entry.uncertain_since = None;
                }
            }
            _ => {
                self.owned.write().await.remove(session_id);
            }
        }
    }

    /// Voluntary handoff: release an owned lease once the rendezvous-
    /// preferred owner is live and fully `online` (§4.5).
    async fn handoff_check(&self, session_id: &SessionId) {
        let preferred = match self.preferred_owner(session_id).await {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "handoff preferred-owner lookup failed, skipping");
                return;
            }
        };
        let Some(preferred_id) = preferred else {
            return;
        };
        if preferred_id == self.id {
            return;
        }
        match self.directory.is_node_ready(&preferred_id).await {
            Ok(true) => {
                if let Err(err) = self.release(session_id).await {
                    tracing::warn!(session_id = %session_id, error = %err, "voluntary handoff release failed");
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "handoff readiness check failed, skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vigil_core::NodeReadiness;
    use vigil_kv::MemoryKvStore;

    fn config() -> LeaseConfig {
        LeaseConfig {
            lease_ttl: Duration::from_secs(30),
            renewal_interval: Duration::from_secs(10),
            heartbeat_ttl: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
            node_discovery_interval: Duration::from_secs(10),
            init_grace_period: Duration::from_secs(10),
        }
    }

    async fn online(manager: &Arc<LeaseManager>) {
        *manager.status.write().await = NodeStatus::Online;
    }

    #[tokio::test(start_paused = true)]
    async fn init_instance_never_acquires() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = LeaseManager::new(InstanceId::new("a"), config(), store);
        let session = SessionId::new("s1");
        assert_eq!(manager.try_acquire(&session).await.unwrap(), false);
        assert!(!manager.is_owned(&session).await);
    }

    #[tokio::test(start_paused = true)]
    async fn solo_online_instance_acquires() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = LeaseManager::new(InstanceId::new("a"), config(), store);
        online(&manager).await;
        let session = SessionId::new("s1");
        assert!(manager.try_acquire(&session).await.unwrap());
        assert!(manager.is_owned(&session).await);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_try_acquire_on_owned_lease_is_a_noop() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = LeaseManager::new(InstanceId::new("a"), config(), store);
        online(&manager).await;
        let session = SessionId::new("s1");
        assert!(manager.try_acquire(&session).await.unwrap());
        assert!(manager.try_acquire(&session).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn non_preferred_acquirer_defers_to_existing_holder() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let a = LeaseManager::new(InstanceId::new("a"), config(), store.clone());
        let b = LeaseManager::new(InstanceId::new("b"), config(), store.clone());
        online(&a).await;
        online(&b).await;

        // Seed the directory with both nodes so preference is computed
        // over the real set, not an empty cache.
        identity::register_heartbeat(&store, &InstanceId::new("a"), NodeStatus::Online, Utc::now(), Duration::from_secs(30))
            .await
            .unwrap();
        identity::register_heartbeat(&store, &InstanceId::new("b"), NodeStatus::Online, Utc::now(), Duration::from_secs(30))
            .await
            .unwrap();
        a.directory.refresh().await.unwrap();
        b.directory.refresh().await.unwrap();

        let session = SessionId::new("s1");
        let preferred = preferred_owner(&session, &[InstanceId::new("a"), InstanceId::new("b")]).unwrap();
        let (holder, other) = if preferred == InstanceId::new("a") { (&a, &b) } else { (&b, &a) };

        assert!(holder.try_acquire(&session).await.unwrap());
        assert_eq!(other.try_acquire(&session).await.unwrap(), false);
        assert!(!other.is_owned(&session).await);
    }

    #[tokio::test(start_paused = true)]
    async fn release_is_idempotent() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = LeaseManager::new(InstanceId::new("a"), config(), store);
        online(&manager).await;
        let session = SessionId::new("s1");
        manager.try_acquire(&session).await.unwrap();
        manager.release(&session).await.unwrap();
        manager.release(&session).await.unwrap();
        assert!(!manager.is_owned(&session).await);
        assert_eq!(manager.get_lease_value(&session).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_advances_last_renewed_at() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = LeaseManager::new(InstanceId::new("a"), config(), store);
        online(&manager).await;
        let session = SessionId::new("s1");
        manager.try_acquire(&session).await.unwrap();
        let before = manager.get_lease_info(&session).await.unwrap().last_renewed_at;

        tokio::time::advance(Duration::from_secs(5)).await;
        manager.renewal_tick().await;

        let after = manager.get_lease_info(&session).await.unwrap().last_renewed_at;
        assert!(after > before);
        assert!(manager.is_owned(&session).await);
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_failure_marks_uncertain_then_reacquires() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = LeaseManager::new(InstanceId::new("a"), config(), store.clone());
        online(&manager).await;
        let session = SessionId::new("s1");
        manager.try_acquire(&session).await.unwrap();

        // Simulate a lost lease key (e.g. transient store hiccup that
        // expired it early) without the manager knowing yet.
        store.delete(&format!("lease:{session}")).await.unwrap();

        manager.renewal_tick().await;
        // Renewal of a missing key returns false -> Uncertain.
        assert!(manager.is_uncertain(&session).await);

        // Re-acquire it out of band (pretend it's still unclaimed) and
        // run another tick to exercise the re-acquisition path.
        let record = LeaseRecord::new(InstanceId::new("a"), Utc::now());
        store
            .set(&format!("lease:{session}"), &record.to_json().unwrap(), Duration::from_secs(30))
            .await
            .unwrap();
        manager.renewal_tick().await;
        assert!(manager.is_owned(&session).await);
    }

    #[tokio::test(start_paused = true)]
    async fn uncertain_lease_taken_over_is_dropped() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = LeaseManager::new(InstanceId::new("a"), config(), store.clone());
        online(&manager).await;
        let session = SessionId::new("s1");
        manager.try_acquire(&session).await.unwrap();

        let other = LeaseRecord::new(InstanceId::new("b"), Utc::now());
        store
            .set(&format!("lease:{session}"), &other.to_json().unwrap(), Duration::from_secs(30))
            .await
            .unwrap();

        manager.mark_uncertain(&session, Utc::now()).await;
        manager.reacquire_one(&session).await;

        assert!(!manager.is_owned(&session).await);
        assert!(manager.get_lease_info(&session).await.is_none());
    }

    /// Finds a peer id that rendezvous-hashing prefers over `a` for `session`.
    fn find_preferred_peer(session: &SessionId, a: &InstanceId) -> InstanceId {
        for i in 0..1000 {
            let candidate = InstanceId::new(format!("peer-{i}"));
            let winner = preferred_owner(session, &[a.clone(), candidate.clone()]).unwrap();
            if winner == candidate {
                return candidate;
            }
        }
        panic!("no preferred peer found in search space");
    }

    #[tokio::test(start_paused = true)]
    async fn voluntary_handoff_releases_to_online_preferred_peer() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let a_id = InstanceId::new("a");
        let a = LeaseManager::new(a_id.clone(), config(), store.clone());
        online(&a).await;
        let session = SessionId::new("s1");
        a.try_acquire(&session).await.unwrap();

        let preferred_id = find_preferred_peer(&session, &a_id);
        identity::register_heartbeat(
            &store,
            &preferred_id,
            NodeStatus::Online,
            Utc::now(),
            Duration::from_secs(30),
        )
        .await
        .unwrap();
        a.directory.refresh().await.unwrap();

        a.handoff_check(&session).await;
        assert!(!a.is_owned(&session).await);
    }

    #[tokio::test(start_paused = true)]
    async fn handoff_keeps_lease_while_preferred_peer_is_init() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let a_id = InstanceId::new("a");
        let a = LeaseManager::new(a_id.clone(), config(), store.clone());
        online(&a).await;
        let session = SessionId::new("s1");
        a.try_acquire(&session).await.unwrap();

        let candidate = find_preferred_peer(&session, &a_id);
        identity::register_heartbeat(&store, &candidate, NodeStatus::Init, Utc::now(), Duration::from_secs(30))
            .await
            .unwrap();
        a.directory.refresh().await.unwrap();

        a.handoff_check(&session).await;
        assert!(a.is_owned(&session).await, "must not hand off to an init peer");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_releases_all_leases_and_removes_heartbeat() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = LeaseManager::new(InstanceId::new("a"), config(), store.clone());
        manager.start().await.unwrap();
        online(&manager).await;
        let s1 = SessionId::new("s1");
        let s2 = SessionId::new("s2");
        manager.try_acquire(&s1).await.unwrap();
        manager.try_acquire(&s2).await.unwrap();

        manager.stop().await;

        assert_eq!(store.get("lease:s1").await.unwrap(), None);
        assert_eq!(store.get("lease:s2").await.unwrap(), None);
        assert_eq!(store.get(&format!("node:{}", manager.id())).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn status_transitions_to_online_after_grace_period() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let manager = LeaseManager::new(InstanceId::new("a"), config(), store);
        manager.start().await.unwrap();
        assert_eq!(*manager.status.read().await, NodeStatus::Init);

        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;

        assert_eq!(*manager.status.read().await, NodeStatus::Online);
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn missing_heartbeat_does_not_trigger_release() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let a = LeaseManager::new(InstanceId::new("a"), config(), store.clone());
        online(&a).await;
        let session = SessionId::new("s1");
        a.try_acquire(&session).await.unwrap();

        // A ghost node id with no heartbeat key is offline and must not
        // trigger a handoff even if rendezvous prefers it.
        let ghost = InstanceId::new("zzz-ghost");
        a.directory.refresh().await.unwrap();
        assert!(!a.directory.is_node_ready(&ghost).await.unwrap());
        let readiness = identity::get_node_status(&a.store, &ghost).await.unwrap();
        assert_eq!(readiness, NodeReadiness::Offline);
    }
}
