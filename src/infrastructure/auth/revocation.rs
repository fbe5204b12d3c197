//! Revoked token ids.
//!
//! Signing out and refresh-token rotation revoke the `jti` of the affected
//! tokens until they would have expired anyway. Redis holds the deny-list when
//! configured; otherwise it lives in process memory.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use deadpool_redis::{Pool, Runtime};
use redis::AsyncCommands;

use crate::errors::AuthError;

const DENY_PREFIX: &str = "token_deny";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRevocations: Send + Sync {
    /// Revokes `jti` for `ttl_seconds`.
    async fn revoke(&self, jti: &str, ttl_seconds: u64) -> Result<(), AuthError>;

    /// Revokes `jti` only if it is not revoked yet. Returns `false` when
    /// another caller already holds it; the check and the write are one step.
    async fn revoke_if_new(&self, jti: &str, ttl_seconds: u64) -> Result<bool, AuthError>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError>;

    /// Drops entries past their expiry, returning how many were removed.
    async fn purge_expired(&self) -> usize;

    async fn ping(&self) -> Result<(), AuthError>;

    fn backend_name(&self) -> &'static str;
}

pub struct RedisRevocations {
    pool: Pool,
}

impl RedisRevocations {
    pub fn new(pool: Pool) -> Self {
        RedisRevocations { pool }
    }

    pub fn from_url(url: &str) -> Result<Self, AuthError> {
        let cfg = deadpool_redis::Config::from_url(url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| AuthError::RedisConnection(e.to_string()))?;
        Ok(RedisRevocations { pool })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, AuthError> {
        self.pool
            .get()
            .await
            .map_err(|e| AuthError::RedisConnection(e.to_string()))
    }
}

fn deny_key(jti: &str) -> String {
    format!("{DENY_PREFIX}:{jti}")
}

#[async_trait]
impl TokenRevocations for RedisRevocations {
    async fn revoke(&self, jti: &str, ttl_seconds: u64) -> Result<(), AuthError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(deny_key(jti), 1, ttl_seconds.max(1))
            .await
            .map_err(|e| AuthError::RedisOperation(e.to_string()))
    }

    async fn revoke_if_new(&self, jti: &str, ttl_seconds: u64) -> Result<bool, AuthError> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(deny_key(jti))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::RedisOperation(e.to_string()))?;
        Ok(reply.is_some())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        let mut conn = self.connection().await?;
        conn.exists(deny_key(jti))
            .await
            .map_err(|e| AuthError::RedisOperation(e.to_string()))
    }

    async fn purge_expired(&self) -> usize {
        // Redis expires keys on its own.
        0
    }

    async fn ping(&self) -> Result<(), AuthError> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::RedisOperation(e.to_string()))?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(AuthError::RedisOperation(format!("unexpected PING reply: {pong}")))
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Process-local deny-list, keyed by `jti` with the unix expiry as value.
#[derive(Default)]
pub struct MemoryRevocations {
    entries: DashMap<String, i64>,
}

impl MemoryRevocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn expiry_after(ttl_seconds: u64) -> i64 {
    let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX / 2);
    Utc::now().timestamp().saturating_add(ttl)
}

#[async_trait]
impl TokenRevocations for MemoryRevocations {
    async fn revoke(&self, jti: &str, ttl_seconds: u64) -> Result<(), AuthError> {
        self.entries.insert(jti.to_string(), expiry_after(ttl_seconds));
        Ok(())
    }

    async fn revoke_if_new(&self, jti: &str, ttl_seconds: u64) -> Result<bool, AuthError> {
        let now = Utc::now().timestamp();
        match self.entries.entry(jti.to_string()) {
            Entry::Occupied(entry) if *entry.get() > now => Ok(false),
            // Expired entries count as free.
            Entry::Occupied(mut entry) => {
                entry.insert(expiry_after(ttl_seconds));
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(expiry_after(ttl_seconds));
                Ok(true)
            }
        }
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        let now = Utc::now().timestamp();
        Ok(self
            .entries
            .get(jti)
            .is_some_and(|expires_at| *expires_at > now))
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now().timestamp();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
