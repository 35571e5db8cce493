//! Realtime sync coordination state: cache entries, audit trail, counters.

use serde::{Deserialize, Serialize};

/// Why a sync or reindex cycle was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditTrigger {
    /// A filesystem watch event fired for a single file.
    Watch,
    /// The periodic full-scan timer elapsed.
    FullScan,
    /// A caller explicitly requested a reindex.
    Manual,
    /// Startup initialization (snapshot load or first index).
    Startup,
}

/// One entry in the bounded audit trail of sync activity for a codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// What triggered this cycle.
    pub trigger: AuditTrigger,
    /// Relative paths affected, when known (empty for full scans that found nothing).
    pub paths: Vec<Box<str>>,
    /// Unix millis timestamp supplied by the caller (domain code never reads the clock).
    pub at_ms: u64,
    /// Whether the cycle completed successfully.
    pub succeeded: bool,
    /// Human-readable detail, e.g. an error message, when `succeeded` is false.
    pub detail: Option<Box<str>>,
}

impl AuditEntry {
    /// Build a successful audit entry.
    #[must_use]
    pub fn success(trigger: AuditTrigger, paths: Vec<Box<str>>, at_ms: u64) -> Self {
        Self {
            trigger,
            paths,
            at_ms,
            succeeded: true,
            detail: None,
        }
    }

    /// Build a failed audit entry.
    #[must_use]
    pub fn failure(trigger: AuditTrigger, paths: Vec<Box<str>>, at_ms: u64, detail: impl Into<Box<str>>) -> Self {
        Self {
            trigger,
            paths,
            at_ms,
            succeeded: false,
            detail: Some(detail.into()),
        }
    }
}

/// A cached search result kept alive for the freshness-gate TTL window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCacheEntry {
    /// Cache key (typically a hash of query + options).
    pub key: Box<str>,
    /// Serialized search response payload.
    pub payload: Box<str>,
    /// Unix millis timestamp when the entry was stored.
    pub stored_at_ms: u64,
    /// Unix millis timestamp after which the entry is considered stale.
    pub expires_at_ms: u64,
}

impl SyncCacheEntry {
    /// Returns whether the entry is still valid at `now_ms`.
    #[must_use]
    pub const fn is_fresh(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// Monotonic counters tracked per codebase for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncCounters {
    /// Count of single-file updates applied via the watch path.
    pub watch_updates: u64,
    /// Count of full rescans performed.
    pub full_scans: u64,
    /// Count of watch events coalesced away by debouncing.
    pub debounced_events: u64,
    /// Count of sync cycles that failed.
    pub failures: u64,
    /// Count of freshness-gate cache hits.
    pub cache_hits: u64,
    /// Count of freshness-gate cache misses.
    pub cache_misses: u64,
}

impl SyncCounters {
    /// Record a successful watch-triggered single-file update.
    pub const fn record_watch_update(&mut self) {
        self.watch_updates += 1;
    }

    /// Record a completed full scan.
    pub const fn record_full_scan(&mut self) {
        self.full_scans += 1;
    }

    /// Record a debounced-away event.
    pub const fn record_debounced(&mut self) {
        self.debounced_events += 1;
    }

    /// Record a failed cycle.
    pub const fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Record a cache hit or miss.
    pub const fn record_cache(&mut self, hit: bool) {
        if hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }
}
