//! Poll Scheduler error taxonomy (§7).

use thiserror::Error;

/// Failures from a single upstream fetch. Pollers log-and-continue on
/// every variant (§4.6: "record one failure, continue next tick") — this
/// type never escapes a poller task.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}
