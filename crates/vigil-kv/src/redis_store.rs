//! Production [`KvStore`] backend over a Redis-compatible server.
//!
//! Atomic conditional operations are implemented as Lua scripts
//! evaluated server-side (`EVALSHA`/`EVAL`), matching the two-statement
//! GET + conditional SET/DEL contract from §6. `ConnectionManager`
//! transparently reconnects, so a dropped connection surfaces as a
//! single failed call rather than requiring manual retry plumbing here.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::KvError;
use crate::store::KvStore;

/// Extracts `owner_id` from either the current JSON lease format or the
/// legacy bare-string format, then compares against `ARGV[1]`.
const OWNER_MATCH_PRELUDE: &str = r#"
local val = redis.call('GET', KEYS[1])
if not val then return 0 end
local owner = val
local ok, decoded = pcall(cjson.decode, val)
if ok and type(decoded) == 'table' and decoded.owner_id then
  owner = decoded.owner_id
end
if owner ~= ARGV[1] then return 0 end
"#;

fn conditional_update_script() -> redis::Script {
    redis::Script::new(&format!(
        r#"
{OWNER_MATCH_PRELUDE}
redis.call('SET', KEYS[1], ARGV[2])
redis.call('PEXPIRE', KEYS[1], ARGV[3])
return 1
"#
    ))
}

fn conditional_delete_script() -> redis::Script {
    redis::Script::new(&format!(
        r#"
{OWNER_MATCH_PRELUDE}
redis.call('DEL', KEYS[1])
return 1
"#
    ))
}

pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url).map_err(KvError::from)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(KvError::from)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(KvError::from)?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(KvError::from)?;
        Ok(result.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(KvError::from)
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(KvError::from)?;
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<'_, String> = conn
            .scan_match(&pattern)
            .await
            .map_err(KvError::from)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn conditional_update(
        &self,
        key: &str,
        owner_id: &str,
        new_value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let result: i64 = conditional_update_script()
            .key(key)
            .arg(owner_id)
            .arg(new_value)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(KvError::from)?;
        Ok(result == 1)
    }

    async fn conditional_delete(&self, key: &str, owner_id: &str) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let result: i64 = conditional_delete_script()
            .key(key)
            .arg(owner_id)
            .invoke_async(&mut conn)
            .await
            .map_err(KvError::from)?;
        Ok(result == 1)
    }
}
