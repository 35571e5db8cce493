//! Local file sync adapter backed by Merkle snapshots.

use crate::ignore::IgnoreMatcher;
use fs2::FileExt;
use semantic_code_config::SnapshotStorageMode;
use semantic_code_ports::{
    FileChangeSet, FileSyncInitOptions, FileSyncOptions, FileSyncPort, IgnoreMatchInput, IgnorePort,
    SingleFileChangeAction, SingleFileUpdateOptions,
};
use semantic_code_shared::merkle::{MerkleDag, MerkleDagSerialized};
use semantic_code_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_DIR: &str = "sync";
const SNAPSHOT_FILE_EXT: &str = "json";
const SNAPSHOT_LOCK_EXT: &str = "lock";
const CONTEXT_DIR_PATTERN: &str = ".context/";

/// Local filesystem-based file sync adapter.
#[derive(Clone)]
pub struct LocalFileSync {
    codebase_root: PathBuf,
    storage_mode: SnapshotStorageMode,
    state: Arc<RwLock<SyncState>>,
    /// Advisory lock on the snapshot directory, held for the lifetime of this
    /// handle once `initialize` succeeds. Detects a second writer process
    /// targeting the same codebase rather than silently racing it.
    lock_handle: Arc<std::sync::Mutex<Option<File>>>,
}

#[derive(Debug, Clone)]
struct SyncState {
    ignore_patterns: Vec<Box<str>>,
    file_hashes: BTreeMap<Box<str>, Box<str>>,
    mtime_cache: BTreeMap<Box<str>, u64>,
    merkle_dag: MerkleDag,
    last_full_scan_ms: u64,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            file_hashes: BTreeMap::new(),
            mtime_cache: BTreeMap::new(),
            merkle_dag: MerkleDag::new(),
            last_full_scan_ms: 0,
        }
    }
}

impl LocalFileSync {
    /// Create a local file sync adapter scoped to a codebase root.
    #[must_use]
    pub fn new(codebase_root: PathBuf, storage_mode: SnapshotStorageMode) -> Self {
        Self {
            codebase_root,
            storage_mode,
            state: Arc::new(RwLock::new(SyncState::default())),
            lock_handle: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    fn snapshot_root(&self) -> Option<PathBuf> {
        self.storage_mode
            .resolve_root(&self.codebase_root)
            .map(|root| root.join(SNAPSHOT_DIR))
    }

    fn snapshot_path(&self) -> Option<PathBuf> {
        let root = self.snapshot_root()?;
        let normalized = normalize_root_path(&self.codebase_root);
        let digest = md5::compute(normalized.to_string_lossy().as_bytes());
        let hash = format!("{digest:x}");
        Some(root.join(format!("{hash}.{SNAPSHOT_FILE_EXT}")))
    }

    fn snapshot_lock_path(&self) -> Option<PathBuf> {
        Some(self.snapshot_path()?.with_extension(SNAPSHOT_LOCK_EXT))
    }

    /// Acquire the advisory cross-process lock for this codebase's snapshot.
    /// Returns an error if another process already holds it.
    async fn acquire_codebase_lock(&self) -> Result<()> {
        let Some(lock_path) = self.snapshot_lock_path() else {
            return Ok(());
        };
        if let Some(parent) = lock_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ErrorEnvelope::from)?;
        }

        let handle = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = File::create(&lock_path).map_err(ErrorEnvelope::from)?;
            file.try_lock_exclusive().map_err(|_error| {
                ErrorEnvelope::expected(
                    ErrorCode::new("sync", "codebase_locked"),
                    "codebase already locked by another process",
                )
                .with_metadata("lock_path", lock_path.to_string_lossy().to_string())
            })?;
            Ok(file)
        })
        .await
        .map_err(|error| {
            snapshot_error("snapshot_lock_join_failed", "lock task panicked", error)
        })??;

        let mut guard = self
            .lock_handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(handle);
        Ok(())
    }

    fn resolve_snapshot_mode(&self) -> bool {
        self.snapshot_root().is_some()
    }

    async fn load_snapshot(&self) -> Result<Option<SyncSnapshot>> {
        let Some(path) = self.snapshot_path() else {
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(payload) => {
                let snapshot: SyncSnapshot = serde_json::from_slice(&payload).map_err(|error| {
                    snapshot_error("snapshot_parse_failed", "failed to parse snapshot", error)
                })?;
                Ok(Some(snapshot))
            },
            Err(error) => {
                if error.kind() == std::io::ErrorKind::NotFound {
                    Ok(None)
                } else {
                    Err(ErrorEnvelope::from(error))
                }
            },
        }
    }

    async fn write_snapshot(&self, snapshot: &SyncSnapshot) -> Result<()> {
        let Some(path) = self.snapshot_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ErrorEnvelope::from)?;
        }
        let payload = serde_json::to_vec_pretty(snapshot).map_err(|error| {
            snapshot_error(
                "snapshot_serialize_failed",
                "failed to serialize snapshot",
                error,
            )
        })?;

        // The codebase-level advisory lock acquired in `initialize` already
        // serializes writers across processes; this call only needs atomicity
        // against a crash mid-write, not against a concurrent writer.
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &payload)
            .await
            .map_err(ErrorEnvelope::from)?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(ErrorEnvelope::from)?;
        Ok(())
    }

    fn ensure_root_matches(&self, provided: &Path) -> Result<()> {
        let expected = normalize_root_path(&self.codebase_root);
        let provided = normalize_root_path(provided);
        if expected != provided {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "codebase root mismatch",
            )
            .with_metadata("expected", expected.to_string_lossy().to_string())
            .with_metadata("provided", provided.to_string_lossy().to_string()));
        }
        Ok(())
    }

    fn merged_ignore_patterns(input: Option<Vec<Box<str>>>) -> Vec<Box<str>> {
        let mut patterns = input.unwrap_or_default();
        if !patterns
            .iter()
            .any(|pattern| pattern.as_ref() == CONTEXT_DIR_PATTERN)
        {
            patterns.push(CONTEXT_DIR_PATTERN.into());
        }
        patterns
    }

    /// Full scan with no mtime reuse.
    async fn generate_file_hashes(&self, ignore_patterns: &[Box<str>]) -> Result<FileHashMap> {
        let (hashes, _mtimes) = self
            .scan_tree(ignore_patterns, &FileHashMap::new(), &MtimeMap::new(), false)
            .await?;
        Ok(hashes)
    }

    /// Walk the codebase tree, producing both the content-hash map and the
    /// mtime cache needed for the next incremental scan (§4.2).
    ///
    /// Directory-read and per-entry metadata errors are logged and skipped
    /// rather than aborting the walk, so one unreadable subtree or file never
    /// fails the whole scan. When `incremental` is set and a file's mtime is
    /// unchanged from `previous_mtimes`, its stored hash is reused instead of
    /// re-reading the file; a file that can't be read at all (e.g. a
    /// permission error) falls back to its previous hash/mtime so it is
    /// never reported as removed just because it became unreadable.
    async fn scan_tree(
        &self,
        ignore_patterns: &[Box<str>],
        previous_hashes: &FileHashMap,
        previous_mtimes: &MtimeMap,
        incremental: bool,
    ) -> Result<(FileHashMap, MtimeMap)> {
        let mut file_hashes = BTreeMap::new();
        let mut mtimes = BTreeMap::new();
        let mut pending = VecDeque::new();
        pending.push_back(self.codebase_root.clone());

        while let Some(current) = pending.pop_front() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(error) => {
                    tracing::warn!(
                        path = %current.display(),
                        error = %error,
                        "skipping unreadable directory"
                    );
                    continue;
                },
            };

            let mut collected = Vec::new();
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => collected.push(entry),
                    Ok(None) => break,
                    Err(error) => {
                        tracing::warn!(
                            path = %current.display(),
                            error = %error,
                            "stopped reading directory entries early"
                        );
                        break;
                    },
                }
            }
            collected.sort_by_key(tokio::fs::DirEntry::file_name);

            for entry in collected {
                let path = entry.path();
                let Some(relative) = self.relative_path_for(&path) else {
                    continue;
                };
                if is_ignored(ignore_patterns, &relative) {
                    continue;
                }

                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(error) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %error,
                            "skipping entry with unreadable metadata"
                        );
                        carry_forward(&relative, previous_hashes, previous_mtimes, &mut file_hashes, &mut mtimes);
                        continue;
                    },
                };

                if metadata.is_dir() {
                    pending.push_back(path);
                    continue;
                }
                if !metadata.is_file() {
                    tracing::warn!(path = %path.display(), "skipping symlink or non-regular file");
                    continue;
                }

                let relative_key: Box<str> = relative.into_boxed_str();
                let mtime_ms = file_mtime_ms(&metadata);
                let previous_mtime = previous_mtimes.get(relative_key.as_ref()).copied();
                let unchanged = incremental
                    && previous_mtime == Some(mtime_ms)
                    && previous_hashes.contains_key(relative_key.as_ref());

                if unchanged {
                    if let Some(hash) = previous_hashes.get(relative_key.as_ref()) {
                        file_hashes.insert(relative_key.clone(), hash.clone());
                        mtimes.insert(relative_key, mtime_ms);
                    }
                    continue;
                }

                match hash_file(&path).await {
                    Ok(hash) => {
                        file_hashes.insert(relative_key.clone(), hash.into_boxed_str());
                        mtimes.insert(relative_key, mtime_ms);
                    },
                    Err(error) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %error,
                            "skipping unreadable file"
                        );
                        carry_forward(
                            relative_key.as_ref(),
                            previous_hashes,
                            previous_mtimes,
                            &mut file_hashes,
                            &mut mtimes,
                        );
                    },
                }
            }
        }
        Ok((file_hashes, mtimes))
    }

    fn relative_path_for(&self, path: &Path) -> Option<String> {
        let stripped = path.strip_prefix(&self.codebase_root).ok()?;
        let raw = stripped.to_string_lossy();
        let normalized = raw.replace('\\', "/");
        let normalized = normalized.trim_start_matches("./");
        let normalized = normalized.trim_start_matches('/');
        if normalized.is_empty() {
            None
        } else {
            Some(normalized.to_owned())
        }
    }

    fn build_merkle_dag(file_hashes: &FileHashMap) -> MerkleDag {
        let mut dag = MerkleDag::new();
        let mut values = String::new();
        for hash in file_hashes.values() {
            values.push_str(hash.as_ref());
        }
        let root_data = format!("root:{values}");
        let root_id = dag.add_node(&root_data, None);

        for (path, hash) in file_hashes {
            let file_data = format!("{path}:{hash}");
            dag.add_node(&file_data, Some(&root_id));
        }
        dag
    }

    fn diff_file_hashes(old: &FileHashMap, new: &FileHashMap) -> FileChangeSet {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut modified = Vec::new();

        for (path, hash) in new {
            match old.get(path) {
                None => added.push(path.clone()),
                Some(previous) => {
                    if previous != hash {
                        modified.push(path.clone());
                    }
                },
            }
        }

        for path in old.keys() {
            if !new.contains_key(path) {
                removed.push(path.clone());
            }
        }

        FileChangeSet {
            added,
            removed,
            modified,
        }
    }
}

impl FileSyncPort for LocalFileSync {
    fn initialize(
        &self,
        ctx: &RequestContext,
        options: FileSyncInitOptions,
    ) -> semantic_code_ports::BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        let sync = self.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("file_sync.initialize")?;
            sync.ensure_root_matches(&options.codebase_root)?;

            let ignore_patterns = Self::merged_ignore_patterns(options.ignore_patterns);
            let snapshot = if sync.resolve_snapshot_mode() {
                sync.acquire_codebase_lock().await?;
                sync.load_snapshot().await?
            } else {
                None
            };

            let (file_hashes, mtime_cache, last_full_scan_ms, merkle_dag) =
                if let Some(snapshot) = snapshot {
                    snapshot.into_state()?
                } else {
                    (FileHashMap::new(), MtimeMap::new(), 0, MerkleDag::new())
                };

            let mut state = sync.state.write().await;
            state.ignore_patterns = ignore_patterns;
            state.file_hashes = file_hashes;
            state.mtime_cache = mtime_cache;
            state.merkle_dag = merkle_dag;
            state.last_full_scan_ms = last_full_scan_ms;
            drop(state);
            Ok(())
        })
    }

    fn check_for_changes(
        &self,
        ctx: &RequestContext,
        options: FileSyncOptions,
    ) -> semantic_code_ports::BoxFuture<'_, Result<FileChangeSet>> {
        let ctx = ctx.clone();
        let sync = self.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("file_sync.check_for_changes")?;
            let (previous_hashes, previous_mtimes, previous_dag, ignore_patterns, last_full_scan_ms) = {
                let state = sync.state.read().await;
                (
                    state.file_hashes.clone(),
                    state.mtime_cache.clone(),
                    state.merkle_dag.clone(),
                    state.ignore_patterns.clone(),
                    state.last_full_scan_ms,
                )
            };

            // ChangeDetector incremental_scan (§4.2): mtime pre-filter, with a
            // mandatory full rehash on first run or once the configured
            // interval since the last full scan has elapsed.
            let now_ms = now_epoch_ms();
            let due_for_full_scan =
                now_ms.saturating_sub(last_full_scan_ms) >= options.full_scan_interval_ms;
            let is_full_scan = options.force_full_scan || previous_hashes.is_empty() || due_for_full_scan;

            let (new_hashes, new_mtimes) = sync
                .scan_tree(&ignore_patterns, &previous_hashes, &previous_mtimes, !is_full_scan)
                .await?;
            let new_dag = Self::build_merkle_dag(&new_hashes);
            let new_last_full_scan_ms = if is_full_scan { now_ms } else { last_full_scan_ms };

            let dag_changes = MerkleDag::compare(&previous_dag, &new_dag);
            let changes = if dag_changes.is_empty() {
                FileChangeSet::default()
            } else {
                Self::diff_file_hashes(&previous_hashes, &new_hashes)
            };

            let snapshot = if sync.resolve_snapshot_mode() {
                Some(SyncSnapshot::from_state(
                    SNAPSHOT_VERSION,
                    &new_hashes,
                    &new_mtimes,
                    new_last_full_scan_ms,
                    &new_dag,
                ))
            } else {
                None
            };

            let mut state = sync.state.write().await;
            state.file_hashes = new_hashes;
            state.mtime_cache = new_mtimes;
            state.merkle_dag = new_dag;
            state.last_full_scan_ms = new_last_full_scan_ms;
            drop(state);

            if let Some(snapshot) = snapshot {
                sync.write_snapshot(&snapshot).await?;
            }

            Ok(changes)
        })
    }

    fn update_single_file(
        &self,
        ctx: &RequestContext,
        options: SingleFileUpdateOptions,
    ) -> semantic_code_ports::BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        let sync = self.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("file_sync.update_single_file")?;
            sync.ensure_root_matches(&options.codebase_root)?;

            let (mut new_hashes, mut new_mtimes, last_full_scan_ms) = {
                let state = sync.state.read().await;
                (
                    state.file_hashes.clone(),
                    state.mtime_cache.clone(),
                    state.last_full_scan_ms,
                )
            };

            match options.action {
                SingleFileChangeAction::Removed => {
                    new_hashes.remove(&options.relative_path);
                    new_mtimes.remove(&options.relative_path);
                },
                SingleFileChangeAction::Modified => {
                    let absolute = sync.codebase_root.join(options.relative_path.as_ref());
                    let hash = hash_file(&absolute).await?;
                    new_hashes.insert(options.relative_path.clone(), hash.into_boxed_str());
                    let mtime_ms = match tokio::fs::metadata(&absolute).await {
                        Ok(metadata) => file_mtime_ms(&metadata),
                        Err(_) => now_epoch_ms(),
                    };
                    new_mtimes.insert(options.relative_path.clone(), mtime_ms);
                },
            }

            let new_dag = Self::build_merkle_dag(&new_hashes);
            let snapshot = if sync.resolve_snapshot_mode() {
                Some(SyncSnapshot::from_state(
                    SNAPSHOT_VERSION,
                    &new_hashes,
                    &new_mtimes,
                    last_full_scan_ms,
                    &new_dag,
                ))
            } else {
                None
            };

            let mut state = sync.state.write().await;
            state.file_hashes = new_hashes;
            state.mtime_cache = new_mtimes;
            state.merkle_dag = new_dag;
            drop(state);

            if let Some(snapshot) = snapshot {
                sync.write_snapshot(&snapshot).await?;
            }

            Ok(())
        })
    }

    fn delete_snapshot(
        &self,
        ctx: &RequestContext,
        codebase_root: PathBuf,
    ) -> semantic_code_ports::BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        let sync = self.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("file_sync.delete_snapshot")?;
            sync.ensure_root_matches(&codebase_root)?;

            let Some(path) = sync.snapshot_path() else {
                return Ok(());
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(error) => {
                    if error.kind() == std::io::ErrorKind::NotFound {
                        Ok(())
                    } else {
                        Err(ErrorEnvelope::from(error))
                    }
                },
            }
        })
    }
}

type FileHashMap = BTreeMap<Box<str>, Box<str>>;
type MtimeMap = BTreeMap<Box<str>, u64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncSnapshot {
    #[serde(default)]
    version: u32,
    #[serde(rename = "fileHashes")]
    file_hashes: Vec<(Box<str>, Box<str>)>,
    /// Per-file mtime (ms) as of the hash it was paired with. Absent in
    /// snapshots written before the incremental scan was introduced; treated
    /// as an empty cache, which just forces one extra full scan.
    #[serde(rename = "mtimeCache", default)]
    mtime_cache: Vec<(Box<str>, u64)>,
    #[serde(rename = "lastFullScanMs", default)]
    last_full_scan_ms: u64,
    #[serde(rename = "merkleDAG")]
    merkle_dag: MerkleDagSerialized,
}

impl SyncSnapshot {
    fn from_state(
        version: u32,
        file_hashes: &FileHashMap,
        mtime_cache: &MtimeMap,
        last_full_scan_ms: u64,
        merkle_dag: &MerkleDag,
    ) -> Self {
        Self {
            version,
            file_hashes: file_hashes
                .iter()
                .map(|(path, hash)| (path.clone(), hash.clone()))
                .collect(),
            mtime_cache: mtime_cache
                .iter()
                .map(|(path, mtime)| (path.clone(), *mtime))
                .collect(),
            last_full_scan_ms,
            merkle_dag: merkle_dag.serialize(),
        }
    }

    fn into_state(self) -> Result<(FileHashMap, MtimeMap, u64, MerkleDag)> {
        if self.version != 0 && self.version != SNAPSHOT_VERSION {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("sync", "snapshot_version_mismatch"),
                "snapshot version mismatch",
            )
            .with_metadata("found", self.version.to_string())
            .with_metadata("expected", SNAPSHOT_VERSION.to_string()));
        }

        let mut file_hashes = BTreeMap::new();
        for (path, hash) in self.file_hashes {
            file_hashes.insert(path, hash);
        }
        let mut mtime_cache = BTreeMap::new();
        for (path, mtime) in self.mtime_cache {
            mtime_cache.insert(path, mtime);
        }
        let merkle_dag = MerkleDag::deserialize(self.merkle_dag);
        Ok((file_hashes, mtime_cache, self.last_full_scan_ms, merkle_dag))
    }
}

async fn hash_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(ErrorEnvelope::from)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn file_mtime_ms(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Reuse a previously-seen hash/mtime for a path that could not be read this
/// scan (unreadable metadata or permission-denied content read), so a
/// transient read failure is never mistaken for a removal.
fn carry_forward(
    relative_path: &str,
    previous_hashes: &FileHashMap,
    previous_mtimes: &MtimeMap,
    file_hashes: &mut FileHashMap,
    mtimes: &mut MtimeMap,
) {
    let Some(hash) = previous_hashes.get(relative_path) else {
        return;
    };
    let key: Box<str> = relative_path.into();
    file_hashes.insert(key.clone(), hash.clone());
    if let Some(mtime) = previous_mtimes.get(relative_path) {
        mtimes.insert(key, *mtime);
    }
}

fn snapshot_error(
    code: &'static str,
    message: &str,
    error: impl std::fmt::Display,
) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("sync", code),
        format!("{message}: {error}"),
        ErrorClass::NonRetriable,
    )
}

fn normalize_root_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_ignored(ignore_patterns: &[Box<str>], relative_path: &str) -> bool {
    if ignore_patterns.is_empty() {
        return false;
    }
    let matcher = IgnoreMatcher::new();
    matcher.is_ignored(&IgnoreMatchInput {
        ignore_patterns: ignore_patterns.to_vec(),
        relative_path: relative_path.to_owned().into_boxed_str(),
    })
}
