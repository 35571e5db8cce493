//! The single-writer per-codebase orchestrator.
//!
//! Dispatches the three SyncController workflows (full index, incremental
//! reindex, single-file update) while enforcing that at most one of them runs
//! per codebase at a time, tracks the per-codebase status state machine, and
//! hosts the 2-second freshness cache consulted before every search.

use crate::index_codebase::{
    IndexCodebaseDeps, IndexCodebaseInput, IndexCodebaseOutput, IndexCodebaseStatus,
};
use crate::index_codebase::{detect_changes, index_codebase, total_changes};
use crate::reindex_by_change::{ReindexByChangeDeps, ReindexByChangeInput, ReindexByChangeOutput, reindex_by_change};
use crate::single_file_update::{SingleFileUpdateDeps, SingleFileUpdateInput, SingleFileUpdateOutput, apply_single_file_update};
use crate::vector_maintenance::VectorMaintenanceDeps;
use semantic_code_domain::{AuditEntry, AuditTrigger, CollectionName, SyncCacheEntry, SyncCounters};
use semantic_code_domain::IndexStatus;
use semantic_code_ports::{
    EmbeddingPort, FileSyncPort, FileSystemPort, IgnorePort, LoggerPort, PathPolicyPort,
    SplitterPort, TelemetryPort, VectorDbPort,
};
use semantic_code_shared::{RequestContext, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Bounded ring size for the per-codebase audit trail (§4.9).
const AUDIT_RING_CAPACITY: usize = 50;

/// How long the freshness cache stays valid before a re-check is forced.
const FRESHNESS_CACHE_TTL_MS: u64 = 2_000;

/// Dependencies shared by every SyncController workflow for one codebase.
#[derive(Clone)]
pub struct SyncControllerDeps {
    /// Snapshot / change-detection adapter.
    pub file_sync: Arc<dyn FileSyncPort>,
    /// Embedding adapter.
    pub embedding: Arc<dyn EmbeddingPort>,
    /// Vector database adapter.
    pub vectordb: Arc<dyn VectorDbPort>,
    /// Splitter adapter.
    pub splitter: Arc<dyn SplitterPort>,
    /// Filesystem adapter.
    pub filesystem: Arc<dyn FileSystemPort>,
    /// Path policy adapter.
    pub path_policy: Arc<dyn PathPolicyPort>,
    /// Ignore matcher adapter.
    pub ignore: Arc<dyn IgnorePort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl SyncControllerDeps {
    fn index_codebase_deps(&self) -> IndexCodebaseDeps {
        IndexCodebaseDeps {
            embedding: Arc::clone(&self.embedding),
            vectordb: Arc::clone(&self.vectordb),
            splitter: Arc::clone(&self.splitter),
            filesystem: Arc::clone(&self.filesystem),
            path_policy: Arc::clone(&self.path_policy),
            ignore: Arc::clone(&self.ignore),
            logger: self.logger.clone(),
            telemetry: self.telemetry.clone(),
        }
    }

    fn reindex_by_change_deps(&self) -> ReindexByChangeDeps {
        ReindexByChangeDeps {
            file_sync: Arc::clone(&self.file_sync),
            vectordb: Arc::clone(&self.vectordb),
            embedding: Arc::clone(&self.embedding),
            splitter: Arc::clone(&self.splitter),
            filesystem: Arc::clone(&self.filesystem),
            path_policy: Arc::clone(&self.path_policy),
            ignore: Arc::clone(&self.ignore),
            logger: self.logger.clone(),
            telemetry: self.telemetry.clone(),
        }
    }

    fn single_file_update_deps(&self) -> SingleFileUpdateDeps {
        SingleFileUpdateDeps {
            file_sync: Arc::clone(&self.file_sync),
            vector_maintenance: VectorMaintenanceDeps {
                vectordb: Arc::clone(&self.vectordb),
                logger: self.logger.clone(),
                telemetry: self.telemetry.clone(),
            },
            embedding: Arc::clone(&self.embedding),
            splitter: Arc::clone(&self.splitter),
            filesystem: Arc::clone(&self.filesystem),
            path_policy: Arc::clone(&self.path_policy),
        }
    }
}

/// Result of `check_and_maybe_sync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessCheckResult {
    /// Whether any changes were detected (and, if so, applied via Workflow B).
    pub had_changes: bool,
    /// Number of changed paths (0 when served from cache or no changes found).
    pub changed_count: usize,
    /// Wall-clock cost of this call, supplied by the caller's clock.
    pub duration_ms: u64,
    /// Whether the result was served from the freshness cache without a check.
    pub from_cache: bool,
}

struct CodebaseState {
    status: IndexStatus,
    lock: Arc<tokio::sync::Mutex<()>>,
    cache: Option<SyncCacheEntry>,
    counters: SyncCounters,
    audit: VecDeque<AuditEntry>,
}

impl CodebaseState {
    fn new() -> Self {
        Self {
            status: IndexStatus::NotIndexed,
            lock: Arc::new(tokio::sync::Mutex::new(())),
            cache: None,
            counters: SyncCounters::default(),
            audit: VecDeque::new(),
        }
    }

    fn push_audit(&mut self, entry: AuditEntry) {
        self.audit.push_back(entry);
        while self.audit.len() > AUDIT_RING_CAPACITY {
            self.audit.pop_front();
        }
    }
}

/// The process-wide, per-codebase sync orchestrator.
///
/// One instance is shared (behind an `Arc`) across every codebase the host
/// manages; state for each codebase is isolated by its [`CollectionName`] key.
#[derive(Default)]
pub struct SyncController {
    codebases: Mutex<std::collections::HashMap<Box<str>, CodebaseState>>,
}

impl SyncController {
    /// Build an empty controller with no codebases tracked yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status for a codebase (`not_indexed` if never seen).
    #[must_use]
    pub fn status(&self, collection_name: &CollectionName) -> IndexStatus {
        self.with_state(collection_name, |state| state.status.clone())
    }

    /// Audit trail for a codebase, oldest first, capped at 50 entries.
    #[must_use]
    pub fn audit_log(&self, collection_name: &CollectionName) -> Vec<AuditEntry> {
        self.with_state(collection_name, |state| state.audit.iter().cloned().collect())
    }

    /// Sync counters accumulated for a codebase.
    #[must_use]
    pub fn counters(&self, collection_name: &CollectionName) -> SyncCounters {
        self.with_state(collection_name, |state| state.counters)
    }

    /// Reset a codebase to `not_indexed`, e.g. after `clear_index`.
    pub fn clear(&self, collection_name: &CollectionName) {
        self.set_status(collection_name, IndexStatus::NotIndexed);
        self.invalidate_cache(collection_name);
    }

    /// **Workflow A.** Full index, initial or forced.
    ///
    /// Holds the codebase's exclusive lock for the duration; `force` drops
    /// the collection first if one already exists (handled by
    /// `index_codebase` itself via `input.force_reindex`).
    pub async fn run_full_index(
        &self,
        ctx: &RequestContext,
        deps: &SyncControllerDeps,
        input: IndexCodebaseInput,
        now_ms: u64,
    ) -> Result<IndexCodebaseOutput> {
        let collection_name = input.collection_name.clone();
        let lock = self.lock_for(&collection_name);
        let _guard = lock.lock_owned().await;

        self.set_status(&collection_name, IndexStatus::Indexing);
        let index_deps = deps.index_codebase_deps();

        match index_codebase(ctx, &index_deps, input).await {
            Ok(output) => {
                let status = match output.status {
                    IndexCodebaseStatus::Completed => IndexStatus::Indexed,
                    IndexCodebaseStatus::LimitReached => IndexStatus::LimitReached,
                };
                self.set_status(&collection_name, status);
                self.record_audit(
                    &collection_name,
                    AuditEntry::success(AuditTrigger::Startup, Vec::new(), now_ms),
                );
                Ok(output)
            },
            Err(error) => {
                self.set_status(&collection_name, IndexStatus::Failed { error: error.clone() });
                self.record_audit(
                    &collection_name,
                    AuditEntry::failure(AuditTrigger::Startup, Vec::new(), now_ms, error.to_string()),
                );
                Err(error)
            },
        }
    }

    /// **Workflow B.** Incremental reindex: detect changes, delete removed,
    /// re-index added/modified, commit, invalidate the freshness cache.
    pub async fn run_incremental_reindex(
        &self,
        ctx: &RequestContext,
        deps: &SyncControllerDeps,
        input: ReindexByChangeInput,
        now_ms: u64,
    ) -> Result<ReindexByChangeOutput> {
        let collection_name = input.collection_name.clone();
        let lock = self.lock_for(&collection_name);
        let _guard = lock.lock_owned().await;

        let reindex_deps = deps.reindex_by_change_deps();
        let result = reindex_by_change(ctx, &reindex_deps, input).await;

        self.invalidate_cache(&collection_name);
        match &result {
            Ok(output) => {
                self.record_counters(&collection_name, |counters| counters.record_full_scan());
                let paths_changed = output.added + output.removed + output.modified;
                if paths_changed > 0 {
                    self.set_status(&collection_name, IndexStatus::Indexed);
                }
                self.record_audit(
                    &collection_name,
                    AuditEntry::success(AuditTrigger::FullScan, Vec::new(), now_ms),
                );
            },
            Err(error) => {
                self.record_counters(&collection_name, |counters| counters.record_failure());
                self.record_audit(
                    &collection_name,
                    AuditEntry::failure(AuditTrigger::FullScan, Vec::new(), now_ms, error.to_string()),
                );
            },
        }
        result
    }

    /// **Workflow C.** Apply a single-file change reported by the Watcher.
    pub async fn run_single_file_update(
        &self,
        ctx: &RequestContext,
        deps: &SyncControllerDeps,
        input: SingleFileUpdateInput,
        now_ms: u64,
    ) -> Result<SingleFileUpdateOutput> {
        let collection_name = input.collection_name.clone();
        let relative_path = input.relative_path.clone();
        let lock = self.lock_for(&collection_name);
        let _guard = lock.lock_owned().await;

        let single_file_deps = deps.single_file_update_deps();
        let result = apply_single_file_update(ctx, &single_file_deps, input).await;

        self.invalidate_cache(&collection_name);
        match &result {
            Ok(output) => {
                self.record_counters(&collection_name, |counters| counters.record_watch_update());
                let paths = vec![relative_path];
                if output.ok {
                    self.record_audit(
                        &collection_name,
                        AuditEntry::success(AuditTrigger::Watch, paths, now_ms),
                    );
                } else {
                    self.record_counters(&collection_name, |counters| counters.record_failure());
                    self.record_audit(
                        &collection_name,
                        AuditEntry::failure(
                            AuditTrigger::Watch,
                            paths,
                            now_ms,
                            output.error.clone().unwrap_or_else(|| "unknown error".into()),
                        ),
                    );
                }
            },
            Err(error) => {
                self.record_counters(&collection_name, |counters| counters.record_failure());
                self.record_audit(
                    &collection_name,
                    AuditEntry::failure(AuditTrigger::Watch, vec![relative_path], now_ms, error.to_string()),
                );
            },
        }
        result
    }

    /// Freshness-gate entry point: consults the 2 s cache, and on a miss runs
    /// an incremental change *check* (without applying); if changes exist,
    /// invokes Workflow B.
    pub async fn check_and_maybe_sync(
        &self,
        ctx: &RequestContext,
        deps: &SyncControllerDeps,
        input: ReindexByChangeInput,
        now_ms: u64,
    ) -> Result<FreshnessCheckResult> {
        let collection_name = input.collection_name.clone();

        if let Some(cached) = self.cached_no_changes(&collection_name, now_ms) {
            self.record_counters(&collection_name, |counters| counters.record_cache(true));
            return Ok(FreshnessCheckResult {
                had_changes: false,
                changed_count: 0,
                duration_ms: 0,
                from_cache: cached,
            });
        }
        self.record_counters(&collection_name, |counters| counters.record_cache(false));

        let reindex_deps = deps.reindex_by_change_deps();
        let changes = detect_changes(ctx, &reindex_deps, &input).await?;
        let changed_count = total_changes(&changes);

        if changed_count == 0 {
            self.store_no_changes_cache(&collection_name, now_ms);
            return Ok(FreshnessCheckResult {
                had_changes: false,
                changed_count: 0,
                duration_ms: 0,
                from_cache: false,
            });
        }

        self.run_incremental_reindex(ctx, deps, input, now_ms).await?;
        Ok(FreshnessCheckResult {
            had_changes: true,
            changed_count,
            duration_ms: 0,
            from_cache: false,
        })
    }

    fn lock_for(&self, collection_name: &CollectionName) -> Arc<tokio::sync::Mutex<()>> {
        let mut codebases = self.lock_map();
        Arc::clone(
            &codebases
                .entry(collection_name.as_str().into())
                .or_insert_with(CodebaseState::new)
                .lock,
        )
    }

    fn set_status(&self, collection_name: &CollectionName, status: IndexStatus) {
        let mut codebases = self.lock_map();
        codebases
            .entry(collection_name.as_str().into())
            .or_insert_with(CodebaseState::new)
            .status = status;
    }

    fn record_audit(&self, collection_name: &CollectionName, entry: AuditEntry) {
        let mut codebases = self.lock_map();
        codebases
            .entry(collection_name.as_str().into())
            .or_insert_with(CodebaseState::new)
            .push_audit(entry);
    }

    fn record_counters(&self, collection_name: &CollectionName, apply: impl FnOnce(&mut SyncCounters)) {
        let mut codebases = self.lock_map();
        let state = codebases
            .entry(collection_name.as_str().into())
            .or_insert_with(CodebaseState::new);
        apply(&mut state.counters);
    }

    fn invalidate_cache(&self, collection_name: &CollectionName) {
        let mut codebases = self.lock_map();
        if let Some(state) = codebases.get_mut(collection_name.as_str()) {
            state.cache = None;
        }
    }

    /// Returns `Some(true)` if the cache is fresh and reports no changes;
    /// `None` if there is no cache entry or it has expired.
    fn cached_no_changes(&self, collection_name: &CollectionName, now_ms: u64) -> Option<bool> {
        let codebases = self.lock_map();
        let entry = codebases.get(collection_name.as_str())?.cache.as_ref()?;
        if entry.is_fresh(now_ms) { Some(true) } else { None }
    }

    fn store_no_changes_cache(&self, collection_name: &CollectionName, now_ms: u64) {
        let mut codebases = self.lock_map();
        let state = codebases
            .entry(collection_name.as_str().into())
            .or_insert_with(CodebaseState::new);
        state.cache = Some(SyncCacheEntry {
            key: collection_name.as_str().into(),
            payload: "{\"hadChanges\":false}".into(),
            stored_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(FRESHNESS_CACHE_TTL_MS),
        });
    }

    fn with_state<T>(&self, collection_name: &CollectionName, f: impl FnOnce(&CodebaseState) -> T) -> T {
        let mut codebases = self.lock_map();
        let state = codebases
            .entry(collection_name.as_str().into())
            .or_insert_with(CodebaseState::new);
        f(state)
    }

    fn lock_map(&self) -> std::sync::MutexGuard<'_, std::collections::HashMap<Box<str>, CodebaseState>> {
        self.codebases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController").finish_non_exhaustive()
    }
}
