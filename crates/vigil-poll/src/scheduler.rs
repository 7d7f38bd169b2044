//! Poll Scheduler (C6): one background task per `(session, endpoint)`,
//! gated on the Lease Manager's ownership state (§4.6, §5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vigil_core::{Event, SessionId};
use vigil_lease::LeaseManager;

use crate::endpoint::EndpointSpec;
use crate::sink::EventSink;
use crate::upstream::UpstreamClient;

/// Consecutive-failure count and cached backoff signal shared by every
/// endpoint poller of one session.
#[derive(Default)]
struct SessionPollState {
    upstream_down: AtomicBool,
    status_failure_streak: AtomicU32,
    game_time: AtomicU64,
}

struct ActiveSession {
    handles: Vec<JoinHandle<()>>,
    state: Arc<SessionPollState>,
}

pub struct PollScheduler {
    lease: Arc<LeaseManager>,
    upstream: Arc<dyn UpstreamClient>,
    base_url: String,
    sink: Arc<dyn EventSink>,
    endpoints: Vec<EndpointSpec>,
    discovery_interval: Duration,
    active: Mutex<HashMap<SessionId, ActiveSession>>,
    cancel: CancellationToken,
    discovery_task: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(
        lease: Arc<LeaseManager>,
        upstream: Arc<dyn UpstreamClient>,
        base_url: String,
        sink: Arc<dyn EventSink>,
        endpoints: Vec<EndpointSpec>,
        discovery_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            lease,
            upstream,
            base_url,
            sink,
            endpoints,
            discovery_interval,
            active: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            discovery_task: Mutex::new(None),
        })
    }

    /// Spawns the session-discovery loop, which starts pollers for newly
    /// owned sessions and reaps tasks for sessions this instance no
    /// longer owns (the pollers themselves stop on losing ownership).
    pub async fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        let interval = self.discovery_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.discovery_tick().await,
                    () = cancel.cancelled() => break,
                }
            }
        });
        *self.discovery_task.lock().await = Some(handle);
    }

    /// Cancels every poller task and the discovery loop, then joins them.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.discovery_task.lock().await.take() {
            let _ = handle.await;
        }
        let sessions: Vec<_> = self.active.lock().await.drain().collect();
        for (_, session) in sessions {
            for handle in session.handles {
                let _ = handle.await;
            }
        }
    }

    pub async fn is_upstream_down(&self, session_id: &SessionId) -> bool {
        match self.active.lock().await.get(session_id) {
            Some(session) => session.state.upstream_down.load(Ordering::Relaxed),
            None => false,
        }
    }

    async fn discovery_tick(self: &Arc<Self>) {
        let owned = self.lease.owned_sessions().await;
        let mut active = self.active.lock().await;

        active.retain(|_, session| {
            session.handles.retain(|h| !h.is_finished());
            !session.handles.is_empty()
        });

        for session_id in owned {
            if active.contains_key(&session_id) {
                continue;
            }
            let state = Arc::new(SessionPollState::default());
            let handles = self
                .endpoints
                .iter()
                .map(|endpoint| self.spawn_poller(session_id.clone(), endpoint.clone(), state.clone()))
                .collect();
            active.insert(session_id, ActiveSession { handles, state });
        }
    }

    fn spawn_poller(
        self: &Arc<Self>,
        session_id: SessionId,
        endpoint: EndpointSpec,
        state: Arc<SessionPollState>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            this.run_poller(session_id, endpoint, state, cancel).await;
        })
    }

    async fn run_poller(
        self: Arc<Self>,
        session_id: SessionId,
        endpoint: EndpointSpec,
        state: Arc<SessionPollState>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(endpoint.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel.cancelled() => break,
            }

            if self.lease.is_uncertain(&session_id).await {
                tracing::debug!(session_id = %session_id, endpoint = endpoint.event_type, "lease uncertain, pausing poll");
                continue;
            }
            if !self.lease.is_owned(&session_id).await {
                tracing::info!(session_id = %session_id, endpoint = endpoint.event_type, "lease gone, stopping poller");
                break;
            }

            self.poll_once(&session_id, &endpoint, &state).await;
        }
    }

    async fn poll_once(&self, session_id: &SessionId, endpoint: &EndpointSpec, state: &SessionPollState) {
        let outcome = tokio::time::timeout(
            endpoint.timeout,
            self.upstream.fetch(&self.base_url, session_id, endpoint),
        )
        .await;

        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                tracing::warn!(session_id = %session_id, endpoint = endpoint.event_type, error = %err, "upstream poll failed");
                self.record_failure(endpoint, state);
                return;
            }
            Err(_elapsed) => {
                tracing::warn!(session_id = %session_id, endpoint = endpoint.event_type, "upstream poll timed out");
                self.record_failure(endpoint, state);
                return;
            }
        };

        if endpoint.is_status_probe {
            state.status_failure_streak.store(0, Ordering::Relaxed);
            state.upstream_down.store(false, Ordering::Relaxed);
        }

        let game_time_id = if endpoint.is_time_series {
            let elapsed = value.get("elapsed_seconds").and_then(|v| v.as_u64()).unwrap_or(0);
            state.game_time.fetch_max(elapsed, Ordering::Relaxed).max(elapsed)
        } else {
            0
        };

        let event = Event {
            session_id: session_id.clone(),
            event_type: endpoint.event_type.to_string(),
            data: value,
            game_time_id,
        };
        self.sink.publish(event).await;
    }

    fn record_failure(&self, endpoint: &EndpointSpec, state: &SessionPollState) {
        if !endpoint.is_status_probe {
            return;
        }
        let streak = state.status_failure_streak.fetch_add(1, Ordering::Relaxed) + 1;
        if streak >= 2 {
            state.upstream_down.store(true, Ordering::Relaxed);
        }
    }
}
