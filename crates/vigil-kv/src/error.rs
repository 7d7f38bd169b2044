//! KV adapter error taxonomy (§1, the `IOError` family from §4.1).

use thiserror::Error;

/// Failures surfaced by the [`crate::KvStore`] boundary.
///
/// A `missing` result is modeled as `Ok(None)`, never an error — only
/// connectivity and protocol failures land here (§4.1: "a `missing`
/// result is distinct from an error").
#[derive(Debug, Error)]
pub enum KvError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store protocol error: {0}")]
    Protocol(String),
}

impl From<redis::RedisError> for KvError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            KvError::Unavailable(err.to_string())
        } else {
            KvError::Protocol(err.to_string())
        }
    }
}
