//! Target-database sessions and the process-wide session cache.
//!
//! A [`SessionCache`] is created once by the host and injected into every
//! runner. It memoizes one session per target endpoint behind a
//! [`tokio::sync::OnceCell`], so concurrent cold invocations for the same
//! cluster share a single connect and never see a half-built session. A
//! failed connect leaves the slot empty and the next caller retries.
//!
//! Sessions are shared across invocations, which requires them to be
//! `Send + Sync`; the sqlx pool behind [`crate::mysql::MySqlSession`] is.
//!
//! Every pipeline run provisions a fresh cluster, so endpoints go stale.
//! With an idle TTL set, entries unused for longer than the TTL are dropped
//! on the next lookup, which closes their pools.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;

use actionrunner_core::job::TargetEndpoint;

use crate::error::SqlError;

/// One result set: column names plus rows rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Generic SQL execution capability against the target.
#[async_trait]
pub trait SqlSession: Send + Sync {
    /// Execute a statement, discarding rows. Returns rows affected.
    async fn execute(&self, statement: &str) -> Result<u64, SqlError>;

    /// Execute one or more statements and collect every result set.
    async fn query(&self, statement: &str) -> Result<Vec<RecordSet>, SqlError>;
}

/// Opens sessions to a target endpoint.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, target: &TargetEndpoint) -> Result<Arc<dyn SqlSession>, SqlError>;
}

type Slot = Arc<OnceCell<Arc<dyn SqlSession>>>;

struct Entry {
    slot: Slot,
    last_used: Instant,
}

/// Memoized sessions, one per target endpoint.
pub struct SessionCache {
    connector: Arc<dyn SessionConnector>,
    slots: Mutex<HashMap<String, Entry>>,
    idle_ttl: Option<Duration>,
}

impl SessionCache {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            connector,
            slots: Mutex::new(HashMap::new()),
            idle_ttl: None,
        }
    }

    /// Drop endpoints that have not been used for `ttl`.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    /// Return the session for `target`, connecting on first use.
    pub async fn get_or_connect(
        &self,
        target: &TargetEndpoint,
    ) -> Result<Arc<dyn SqlSession>, SqlError> {
        // Hold the map lock only long enough to find or create the slot;
        // the connect itself is serialised by the slot's OnceCell.
        let key = target.key();
        let slot = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            if let Some(ttl) = self.idle_ttl {
                let before = slots.len();
                slots.retain(|k, entry| *k == key || now.duration_since(entry.last_used) < ttl);
                let evicted = before - slots.len();
                if evicted > 0 {
                    tracing::info!(evicted, "Evicted idle target sessions");
                }
            }
            let entry = slots.entry(key).or_insert_with(|| Entry {
                slot: Arc::default(),
                last_used: now,
            });
            entry.last_used = now;
            Arc::clone(&entry.slot)
        };

        let session = slot
            .get_or_try_init(|| async {
                tracing::info!(target = %target, "Opening target session");
                self.connector.connect(target).await
            })
            .await?;

        Ok(Arc::clone(session))
    }

    /// Number of endpoints with an established session.
    pub async fn connected(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|entry| entry.slot.initialized())
            .count()
    }
}
