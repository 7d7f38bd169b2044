//! `KvStore`: the thin boundary over the shared key-value store (§4.1, C1).
//!
//! Every other component depends on this trait, never on a concrete
//! backend — the Lease Manager and Node Directory are testable against
//! [`crate::memory::MemoryKvStore`] without a running Redis.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::KvError;

/// Typed get/set-with-TTL, atomic conditional mutation, and key-space
/// scan over the shared store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Unconditional set with a TTL. Overwrites any existing value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Set `key` to `value` with `ttl` only if it does not already
    /// exist. Returns `true` iff this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError>;

    /// Read `key`. `Ok(None)` means the key is absent — distinct from
    /// an I/O error (§4.1).
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Unconditionally remove `key`. Idempotent: removing an absent key
    /// is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Incremental, non-blocking enumeration of every key under `prefix`.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>, KvError>;

    /// Atomic conditional update, implementing the two-statement script
    /// from §6:
    ///
    /// ```text
    /// val = GET key
    /// if val missing -> return 0
    /// if parse(val).owner_id == owner_id:
    ///     SET key new_value; PEXPIRE key ttl; return 1
    /// else:
    ///     return 0
    /// ```
    ///
    /// Returns `true` on success (result `1`), `false` otherwise
    /// (result `0`: missing or owned by someone else).
    async fn conditional_update(
        &self,
        key: &str,
        owner_id: &str,
        new_value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError>;

    /// Atomic conditional delete: removes `key` only if its current
    /// value's owner matches `owner_id`. Returns `true` on success.
    async fn conditional_delete(&self, key: &str, owner_id: &str) -> Result<bool, KvError>;
}
