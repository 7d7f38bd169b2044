//! Lease Manager error taxonomy (§7).

use thiserror::Error;
use vigil_kv::KvError;

/// Failures surfaced by the public [`crate::manager::LeaseManager`] operations.
///
/// Background loops never propagate these — they log and transition the
/// affected lease to `Uncertain` instead (§7: "all background loops
/// swallow-and-log").
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] KvError),
    #[error("lease {0} not owned by this instance")]
    LeaseNotOwned(String),
    #[error("malformed lease value for {0}: {1}")]
    Validation(String, String),
    #[error("operation attempted after shutdown")]
    ShutdownInFlight,
}
