//! Sync / change detection boundary contract.

use crate::BoxFuture;
use semantic_code_shared::{RequestContext, Result};
use std::path::PathBuf;

/// Set of detected file changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileChangeSet {
    /// Added files (relative paths).
    pub added: Vec<Box<str>>,
    /// Removed files (relative paths).
    pub removed: Vec<Box<str>>,
    /// Modified files (relative paths).
    pub modified: Vec<Box<str>>,
}

/// Options for initial snapshot creation.
#[derive(Debug, Clone)]
pub struct FileSyncInitOptions {
    /// Absolute codebase root.
    pub codebase_root: PathBuf,
    /// Ignore patterns applied before file access.
    pub ignore_patterns: Option<Vec<Box<str>>>,
}

/// Options for sync operations.
#[derive(Debug, Clone)]
pub struct FileSyncOptions {
    /// Skip mtime pre-filtering and rehash every non-ignored file.
    pub force_full_scan: bool,
    /// Minimum age (ms) of the last full scan before the next
    /// `check_for_changes` call falls back to one even without
    /// `force_full_scan` set. Mirrors `SyncConfig::full_scan_interval_ms`.
    pub full_scan_interval_ms: u64,
}

/// Default interval mirroring `SyncConfig::full_scan_interval_ms`'s default.
pub const DEFAULT_FULL_SCAN_INTERVAL_MS: u64 = 300_000;

impl Default for FileSyncOptions {
    fn default() -> Self {
        Self {
            force_full_scan: false,
            full_scan_interval_ms: DEFAULT_FULL_SCAN_INTERVAL_MS,
        }
    }
}

/// The change a single-file update applies to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleFileChangeAction {
    /// File content changed; re-hash and update the stored entry.
    Modified,
    /// File was removed; drop the stored entry.
    Removed,
}

/// Options for an incremental single-file snapshot update.
#[derive(Debug, Clone)]
pub struct SingleFileUpdateOptions {
    /// Absolute codebase root the path is relative to.
    pub codebase_root: PathBuf,
    /// Path relative to `codebase_root`.
    pub relative_path: Box<str>,
    /// The kind of change observed for this path.
    pub action: SingleFileChangeAction,
}

/// Boundary contract for change detection (snapshot + diff).
pub trait FileSyncPort: Send + Sync {
    /// Initialize state for a codebase root (e.g. create an initial snapshot).
    fn initialize(
        &self,
        ctx: &RequestContext,
        options: FileSyncInitOptions,
    ) -> BoxFuture<'_, Result<()>>;

    /// Check for changes since the last snapshot.
    fn check_for_changes(
        &self,
        ctx: &RequestContext,
        options: FileSyncOptions,
    ) -> BoxFuture<'_, Result<FileChangeSet>>;

    /// Apply a single-file change to the persisted snapshot without a full rescan.
    ///
    /// Used by the realtime watch path, where a debounced filesystem event already
    /// names the exact path and action; a full `check_for_changes` rescan would be
    /// wasteful for a single-file edit.
    fn update_single_file(
        &self,
        ctx: &RequestContext,
        options: SingleFileUpdateOptions,
    ) -> BoxFuture<'_, Result<()>>;

    /// Delete any persisted snapshot state for the codebase root.
    fn delete_snapshot(
        &self,
        ctx: &RequestContext,
        codebase_root: PathBuf,
    ) -> BoxFuture<'_, Result<()>>;
}
