//! Process-wide keyed connection pool for vector-store adapters (§4.7).
//!
//! Keyed by `(address, username, has-token)`: the first caller for a key
//! builds the connection; everyone after shares it via a refcounted handle.
//! A reaper (driven externally, see [`ConnectionPool::reap_idle`]) closes
//! entries nobody holds once they've sat idle past the configured threshold.
//! The `ConnectionPool` itself is the only legitimate process-wide mutable
//! state in this codebase — everything else (`HashStore`, status, caches,
//! audit trail) is owned per codebase.

use semantic_code_shared::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Identifies a distinct pooled connection target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub address: Box<str>,
    pub username: Option<Box<str>>,
    pub has_token: bool,
}

impl PoolKey {
    #[must_use]
    pub fn new(address: impl Into<Box<str>>, username: Option<Box<str>>, has_token: bool) -> Self {
        Self {
            address: address.into(),
            username,
            has_token,
        }
    }
}

struct PoolEntry<C> {
    connection: Arc<C>,
    refcount: usize,
    /// Set when `refcount` drops to zero; cleared whenever it's reacquired.
    idle_since: Option<Instant>,
}

/// Process-wide pool shared across per-codebase `VectorStore` adapter
/// instances. Construct one per backend (Milvus gRPC, Milvus REST, ...) and
/// hold it behind an `Arc` in the infra wiring layer.
pub struct ConnectionPool<C> {
    entries: Mutex<HashMap<PoolKey, PoolEntry<C>>>,
    idle_threshold: Duration,
}

impl<C: Send + Sync + 'static> ConnectionPool<C> {
    #[must_use]
    pub fn new(idle_threshold: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_threshold,
        }
    }

    /// Retrieves the pooled connection for `key`, building it with `build`
    /// if this is the first request for that key. Bumps the refcount.
    pub async fn acquire<F, Fut>(
        self: &Arc<Self>,
        key: PoolKey,
        build: F,
    ) -> Result<PooledConnection<C>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C>>,
    {
        if let Some(connection) = self.try_reuse(&key) {
            return Ok(PooledConnection {
                pool: Arc::clone(self),
                key,
                connection,
            });
        }

        // Built outside the lock: connection setup is the slow, fallible
        // part and must not block other keys. If another caller raced us
        // for the same brand-new key, `insert_or_reuse` discards ours.
        let built = Arc::new(build().await?);
        let connection = self.insert_or_reuse(&key, built);
        Ok(PooledConnection {
            pool: Arc::clone(self),
            key,
            connection,
        })
    }

    fn try_reuse(&self, key: &PoolKey) -> Option<Arc<C>> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = guard.get_mut(key)?;
        entry.refcount += 1;
        entry.idle_since = None;
        Some(Arc::clone(&entry.connection))
    }

    fn insert_or_reuse(&self, key: &PoolKey, built: Arc<C>) -> Arc<C> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = guard.entry(key.clone()).or_insert_with(|| PoolEntry {
            connection: Arc::clone(&built),
            refcount: 0,
            idle_since: None,
        });
        entry.refcount += 1;
        entry.idle_since = None;
        Arc::clone(&entry.connection)
    }

    fn release(&self, key: &PoolKey) {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = guard.get_mut(key) {
            entry.refcount = entry.refcount.saturating_sub(1);
            if entry.refcount == 0 {
                entry.idle_since = Some(Instant::now());
            }
        }
    }

    /// Drops entries with `refcount == 0` idle past the configured
    /// threshold. Returns how many were reaped.
    pub fn reap_idle(&self) -> usize {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        let threshold = self.idle_threshold;
        guard.retain(|_, entry| {
            entry.refcount > 0
                || entry
                    .idle_since
                    .is_none_or(|since| since.elapsed() < threshold)
        });
        before - guard.len()
    }

    /// Number of distinct keys currently pooled (observability, §4.9).
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Spawns the background reaper, polling every `interval`. Intended to
    /// run once per pool for the life of the process.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let reaped = pool.reap_idle();
                if reaped > 0 {
                    tracing::debug!(reaped, "connection pool reaper closed idle entries");
                }
            }
        })
    }
}

/// A checked-out handle to a pooled connection. Decrements the pool's
/// refcount for its key when dropped.
pub struct PooledConnection<C> {
    pool: Arc<ConnectionPool<C>>,
    key: PoolKey,
    connection: Arc<C>,
}

impl<C: Send + Sync + 'static> PooledConnection<C> {
    #[must_use]
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }
}

impl<C: Send + Sync + 'static> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        self.pool.release(&self.key);
    }
}
