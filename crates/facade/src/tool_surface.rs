//! Tool surface (§6.1): newline-delimited JSON request/response framing over
//! stdio. Unlike the one-shot `cli_local` helpers this module's [`ToolServer`]
//! is meant to live for the duration of a host process, so it is the one
//! place that holds state across calls — the shared [`SyncController`] and
//! the registry of active realtime-sync watchers.

use crate::InfraError;
use semantic_code_adapters::file_sync::LocalFileSync;
use semantic_code_adapters::fs::{LocalFileSystem, LocalPathPolicy};
use semantic_code_adapters::ignore::IgnoreMatcher;
use semantic_code_adapters::splitter::TreeSitterSplitter;
use semantic_code_adapters::watcher::NotifyWatcher;
use semantic_code_app::{
    CodebaseHealthInput, GlobalHealthInput, ReindexByChangeInput, SingleFileUpdateInput,
    SyncController, SyncControllerDeps, codebase_health_check, global_health_check,
};
use semantic_code_config::{
    BackendEnv, ClearIndexRequestDto, IndexRequestDto, ReindexByChangeRequestDto,
    SearchRequestDto, ValidatedBackendConfig, load_backend_config_from_path,
    validate_clear_index_request, validate_index_request, validate_reindex_by_change_request,
    validate_search_request,
};
use semantic_code_domain::{CollectionNamingInput, IndexStatus, derive_collection_name};
use semantic_code_infra::{JobKind, JobRequest, create_job, read_job_status, run_job};
use semantic_code_ports::{BoxFuture, WatchEvent, WatcherOptions, WatcherPort};
use semantic_code_shared::{ErrorCode, ErrorEnvelope, RequestContext};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// One line of the stdio protocol: `{"tool": "...", "params": {...}}`.
#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    /// Tool name, matching one of the §6.1 table entries.
    pub tool: Box<str>,
    /// Tool-specific parameters.
    #[serde(default)]
    pub params: Value,
}

struct ActiveWatcher {
    watcher: Arc<NotifyWatcher>,
    collection_name: semantic_code_domain::CollectionName,
}

/// Process-wide stdio tool surface. One instance is shared across every
/// request read from the host's stdin loop.
pub struct ToolServer {
    config_path: Option<PathBuf>,
    sync: Arc<SyncController>,
    watchers: Mutex<HashMap<Box<str>, ActiveWatcher>>,
    jobs: Mutex<HashMap<Box<str>, Box<str>>>,
}

impl Default for ToolServer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ToolServer {
    /// Build a server reading config from `config_path` (or the per-codebase
    /// default) for every request.
    #[must_use]
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            sync: Arc::new(SyncController::new()),
            watchers: Mutex::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Parse one request line, dispatch it, and serialize the response line
    /// (always valid JSON, never a transport-level failure).
    pub async fn dispatch_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<ToolRequest>(line) {
            Ok(request) => self.dispatch(&request.tool, request.params).await,
            Err(error) => Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("invalid request line: {error}"),
            )),
        };
        render_response(response)
    }

    async fn dispatch(&self, tool: &str, params: Value) -> Result<Value, InfraError> {
        match tool {
            "index_codebase" => self.handle_index_codebase(params).await,
            "search_code" => self.handle_search_code(params),
            "clear_index" => self.handle_clear_index(params),
            "get_indexing_status" => self.handle_get_indexing_status(params),
            "enable_realtime_sync" => self.handle_enable_realtime_sync(params).await,
            "disable_realtime_sync" => self.handle_disable_realtime_sync(params).await,
            "get_realtime_sync_status" => self.handle_get_realtime_sync_status(params),
            "get_sync_status" => self.handle_get_sync_status(params),
            "sync_now" => self.handle_sync_now(params).await,
            "get_performance_stats" => self.handle_get_performance_stats(params),
            "health_check" => self.handle_health_check(params),
            "get_sync_history" => self.handle_get_sync_history(params),
            other => Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("unknown tool: {other}"),
            )
            .with_metadata("field", "tool")),
        }
    }

    async fn handle_index_codebase(&self, params: Value) -> Result<Value, InfraError> {
        let params: IndexParams = parse_params(params)?;
        let codebase_root = require_absolute(&params.path)?;
        resolve_splitter(params.splitter.as_deref())?;

        let overrides_json = sync_overrides_json(
            params.custom_extensions.as_deref(),
            params.ignore_patterns.as_deref(),
        );
        let dto = IndexRequestDto {
            codebase_root: codebase_root.to_string_lossy().to_string(),
            collection_name: None,
            force_reindex: Some(params.force),
        };
        // Validate shape/bounds up front so a malformed request fails fast,
        // even though the background job re-derives its own request.
        validate_index_request(&dto)?;

        let job_request = JobRequest::new(
            JobKind::Index,
            &codebase_root,
            self.config_path.as_deref(),
            overrides_json,
            true,
        )?;
        let status = create_job(&job_request)?;
        let job_id = status.id.clone();
        let root_for_job = job_request.codebase_root.clone();
        tokio::task::spawn_blocking(move || run_job(&root_for_job, &job_id));

        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path_key(&codebase_root), status.id.clone());

        Ok(json!({
            "acknowledged": true,
            "jobId": status.id,
            "message": "indexing started in the background",
        }))
    }

    fn handle_search_code(&self, params: Value) -> Result<Value, InfraError> {
        let params: SearchParams = parse_params(params)?;
        let codebase_root = require_absolute(&params.path)?;
        for entry in params.extension_filter.iter().flatten() {
            validate_extension_filter_entry(entry)?;
        }

        let dto = SearchRequestDto {
            codebase_root: codebase_root.to_string_lossy().to_string(),
            query: params.query,
            top_k: Some(params.limit.unwrap_or(10).min(50)),
            threshold: None,
            filter_expr: None,
            include_content: Some(true),
        };
        let request = validate_search_request(&dto)?;
        let results =
            crate::run_search_local(self.config_path.as_deref(), None, &request)?;

        let payload: Vec<Value> = results
            .iter()
            .filter(|result| matches_extension_filter(&result.key.relative_path, params.extension_filter.as_deref()))
            .map(|result| {
                json!({
                    "relativePath": result.key.relative_path,
                    "startLine": result.key.span.start_line(),
                    "endLine": result.key.span.end_line(),
                    "language": result.language,
                    "content": result.content,
                    "score": result.score,
                })
            })
            .collect();
        Ok(Value::Array(payload))
    }

    fn handle_clear_index(&self, params: Value) -> Result<Value, InfraError> {
        let params: PathParams = parse_params(params)?;
        let codebase_root = require_absolute(&params.path)?;
        let dto = ClearIndexRequestDto {
            codebase_root: codebase_root.to_string_lossy().to_string(),
        };
        let request = validate_clear_index_request(&dto)?;
        crate::run_clear_local(self.config_path.as_deref(), None, &request)?;

        if let Ok(collection_name) = self.collection_name_for(&codebase_root) {
            self.sync.clear(&collection_name);
        }
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&path_key(&codebase_root));

        Ok(json!({ "acknowledged": true }))
    }

    fn handle_get_indexing_status(&self, params: Value) -> Result<Value, InfraError> {
        let params: PathParams = parse_params(params)?;
        let codebase_root = require_absolute(&params.path)?;

        let job_id = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&path_key(&codebase_root))
            .cloned();
        if let Some(job_id) = job_id
            && let Ok(status) = read_job_status(&codebase_root, &job_id)
        {
            return Ok(serde_json::to_value(status).unwrap_or(Value::Null));
        }

        if let Ok(collection_name) = self.collection_name_for(&codebase_root) {
            let status = self.sync.status(&collection_name);
            if !matches!(status, IndexStatus::NotIndexed) {
                return Ok(serde_json::to_value(status).unwrap_or(Value::Null));
            }
        }

        let fallback = crate::read_status_local(self.config_path.as_deref(), None, &codebase_root);
        let status = match fallback {
            Ok(status) if status.vector_snapshot.exists => IndexStatus::Indexed,
            _ => IndexStatus::NotIndexed,
        };
        Ok(serde_json::to_value(status).unwrap_or(Value::Null))
    }

    async fn handle_enable_realtime_sync(&self, params: Value) -> Result<Value, InfraError> {
        let params: PathParams = parse_params(params)?;
        let codebase_root = require_absolute(&params.path)?;
        let key = path_key(&codebase_root);

        if self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
        {
            return Ok(json!({ "acknowledged": true, "alreadyEnabled": true }));
        }

        let (config, manifest) = self.load_config_and_manifest(&codebase_root)?;
        let ctx = RequestContext::new_request();
        let deps = self.sync_controller_deps(&codebase_root).await?;

        let watcher = Arc::new(NotifyWatcher::new());
        let sync = Arc::clone(&self.sync);
        let collection_name = manifest.collection_name.clone();
        let root_for_callback = codebase_root.clone();
        let on_event: semantic_code_ports::WatchCallback = Arc::new(move |event: WatchEvent| {
            let sync = Arc::clone(&sync);
            let deps = deps.clone();
            let collection_name = collection_name.clone();
            let root = root_for_callback.clone();
            let fut: BoxFuture<'static, semantic_code_shared::Result<()>> = Box::pin(async move {
                let ctx = RequestContext::new_request();
                let input = SingleFileUpdateInput {
                    codebase_root: root,
                    collection_name,
                    relative_path: event.relative_path,
                    action: event.action,
                };
                let now_ms = now_epoch_ms();
                let _ = sync.run_single_file_update(&ctx, &deps, input, now_ms).await;
                Ok(())
            });
            fut
        });

        let options = WatcherOptions {
            codebase_root: codebase_root.clone(),
            supported_extensions: Some(config.sync.allowed_extensions.clone()),
            ignore_patterns: config.sync.ignore_patterns.clone(),
        };
        watcher.start(&ctx, options, on_event).await?;

        self.watchers.lock().unwrap_or_else(PoisonError::into_inner).insert(
            key,
            ActiveWatcher {
                watcher,
                collection_name: manifest.collection_name,
            },
        );

        Ok(json!({ "acknowledged": true }))
    }

    async fn handle_disable_realtime_sync(&self, params: Value) -> Result<Value, InfraError> {
        let params: PathParams = parse_params(params)?;
        let codebase_root = require_absolute(&params.path)?;
        let removed = self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&path_key(&codebase_root));
        if let Some(entry) = removed {
            entry.watcher.stop().await?;
        }
        Ok(json!({ "acknowledged": true }))
    }

    fn handle_get_realtime_sync_status(&self, params: Value) -> Result<Value, InfraError> {
        let params: OptionalPathParams = parse_params(params)?;
        let watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(path) = params.path {
            let codebase_root = require_absolute(&path)?;
            let enabled = watchers.contains_key(&path_key(&codebase_root));
            return Ok(json!({ "enabled": enabled }));
        }

        let active: Vec<Value> = watchers
            .values()
            .map(|entry| json!({ "collectionName": entry.collection_name.as_str() }))
            .collect();
        Ok(json!({ "enabledCount": active.len(), "watchers": active }))
    }

    fn handle_get_sync_status(&self, params: Value) -> Result<Value, InfraError> {
        let params: PathParams = parse_params(params)?;
        let codebase_root = require_absolute(&params.path)?;
        let collection_name = self.collection_name_for(&codebase_root)?;

        let status = self.sync.status(&collection_name);
        let counters = self.sync.counters(&collection_name);
        let enabled = self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&path_key(&codebase_root));

        Ok(json!({
            "status": serde_json::to_value(status).unwrap_or(Value::Null),
            "realtimeSyncEnabled": enabled,
            "counters": counters_json(&counters),
        }))
    }

    async fn handle_sync_now(&self, params: Value) -> Result<Value, InfraError> {
        let params: PathParams = parse_params(params)?;
        let codebase_root = require_absolute(&params.path)?;
        let dto = ReindexByChangeRequestDto {
            codebase_root: codebase_root.to_string_lossy().to_string(),
        };
        let request = validate_reindex_by_change_request(&dto)?;

        let start = std::time::Instant::now();
        let output = if let Some(deps) = self.sync_controller_deps(&codebase_root).await.ok() {
            let collection_name = self.collection_name_for(&codebase_root)?;
            let (config, _manifest) = self.load_config_and_manifest(&codebase_root)?;
            let input = build_reindex_input(&config, collection_name, &request)?;
            let ctx = RequestContext::new_request();
            self.sync
                .run_incremental_reindex(&ctx, &deps, input, now_epoch_ms())
                .await?
        } else {
            crate::run_reindex_local(self.config_path.as_deref(), None, &request)?
        };
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(json!({
            "added": output.added,
            "modified": output.modified,
            "removed": output.removed,
            "durationMs": duration_ms,
        }))
    }

    fn handle_get_performance_stats(&self, params: Value) -> Result<Value, InfraError> {
        let params: OptionalPathParams = parse_params(params)?;
        if let Some(path) = params.path {
            let codebase_root = require_absolute(&path)?;
            let collection_name = self.collection_name_for(&codebase_root)?;
            let counters = self.sync.counters(&collection_name);
            return Ok(counters_json(&counters));
        }

        let watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut totals = semantic_code_domain::SyncCounters::default();
        for entry in watchers.values() {
            let counters = self.sync.counters(&entry.collection_name);
            totals.watch_updates += counters.watch_updates;
            totals.full_scans += counters.full_scans;
            totals.debounced_events += counters.debounced_events;
            totals.failures += counters.failures;
            totals.cache_hits += counters.cache_hits;
            totals.cache_misses += counters.cache_misses;
        }
        Ok(counters_json(&totals))
    }

    fn handle_health_check(&self, params: Value) -> Result<Value, InfraError> {
        let params: OptionalPathParams = parse_params(params)?;
        let start = std::time::Instant::now();

        let report = if let Some(path) = params.path {
            let codebase_root = require_absolute(&path)?;
            let collection_name = self.collection_name_for(&codebase_root)?;
            let status = self.sync.status(&collection_name);
            let watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
            let synchronizer_present = watchers.contains_key(&path_key(&codebase_root));
            let pending_ops = self.sync.counters(&collection_name).failures as usize;
            codebase_health_check(&CodebaseHealthInput {
                codebase_root_exists: codebase_root.is_dir(),
                index_status: status,
                synchronizer_present,
                mtime_cache_size: 1,
                pending_ops,
            })
        } else {
            let watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
            global_health_check(&GlobalHealthInput {
                cache_entry_count: watchers.len(),
                total_pending_ops: 0,
            })
        };

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(json!({
            "issues": report.issues,
            "warnings": report.warnings,
            "durationMs": duration_ms,
        }))
    }

    fn handle_get_sync_history(&self, params: Value) -> Result<Value, InfraError> {
        let params: LimitedPathParams = parse_params(params)?;
        let codebase_root = require_absolute(&params.path)?;
        let collection_name = self.collection_name_for(&codebase_root)?;
        let limit = params.limit.unwrap_or(10).min(50) as usize;

        let entries: Vec<Value> = self
            .sync
            .audit_log(&collection_name)
            .into_iter()
            .rev()
            .take(limit)
            .map(|entry| {
                json!({
                    "trigger": serde_json::to_value(entry.trigger).unwrap_or(Value::Null),
                    "paths": entry.paths,
                    "atMs": entry.at_ms,
                    "succeeded": entry.succeeded,
                    "detail": entry.detail,
                })
            })
            .collect();
        Ok(Value::Array(entries))
    }

    fn collection_name_for(
        &self,
        codebase_root: &Path,
    ) -> Result<semantic_code_domain::CollectionName, InfraError> {
        if let Some(manifest) = semantic_code_infra::read_manifest(codebase_root)? {
            return Ok(manifest.collection_name);
        }
        let (config, _env) = self.load_config(codebase_root)?;
        derive_collection_name(&CollectionNamingInput::new(
            codebase_root.to_path_buf(),
            config.vector_db.index_mode,
        ))
        .map_err(ErrorEnvelope::from)
    }

    fn load_config(
        &self,
        codebase_root: &Path,
    ) -> Result<(ValidatedBackendConfig, BackendEnv), InfraError> {
        let env = BackendEnv::from_std_env().map_err(ErrorEnvelope::from)?;
        let config = load_backend_config_from_path(self.config_path.as_deref(), None, &env)?;
        let _ = codebase_root;
        Ok((config, env))
    }

    fn load_config_and_manifest(
        &self,
        codebase_root: &Path,
    ) -> Result<(ValidatedBackendConfig, semantic_code_infra::CliManifest), InfraError> {
        let (config, _env) = self.load_config(codebase_root)?;
        let manifest = semantic_code_infra::read_manifest(codebase_root)?
            .ok_or_else(not_indexed_error)?;
        Ok((config, manifest))
    }

    async fn sync_controller_deps(
        &self,
        codebase_root: &Path,
    ) -> Result<SyncControllerDeps, InfraError> {
        let (config, manifest) = self.load_config_and_manifest(codebase_root)?;
        let env = BackendEnv::from_std_env().map_err(ErrorEnvelope::from)?;
        let embedding = semantic_code_infra::build_embedding_port_with_telemetry(
            &config,
            &env,
            codebase_root,
            None,
        )?;
        let vectordb = semantic_code_infra::build_vectordb_port(
            &config,
            codebase_root,
            manifest.snapshot_storage.clone(),
        )
        .await?;
        let splitter = TreeSitterSplitter::default();
        splitter.set_max_chunk_chars(usize::try_from(config.limits().core_max_chunk_chars.get())
            .unwrap_or(usize::MAX));
        Ok(SyncControllerDeps {
            file_sync: Arc::new(LocalFileSync::new(
                codebase_root.to_path_buf(),
                manifest.snapshot_storage.clone(),
            )),
            embedding,
            vectordb,
            splitter: Arc::new(splitter),
            filesystem: Arc::new(LocalFileSystem::new(Some(config.sync.max_file_size_bytes))),
            path_policy: Arc::new(LocalPathPolicy::new()),
            ignore: Arc::new(IgnoreMatcher::new()),
            logger: None,
            telemetry: None,
        })
    }
}

fn build_reindex_input(
    config: &ValidatedBackendConfig,
    collection_name: semantic_code_domain::CollectionName,
    request: &semantic_code_config::ValidatedReindexByChangeRequest,
) -> Result<ReindexByChangeInput, InfraError> {
    let request: &semantic_code_config::ReindexByChangeRequest = request;
    Ok(ReindexByChangeInput {
        codebase_root: request.codebase_root.clone(),
        collection_name,
        index_mode: config.vector_db.index_mode,
        supported_extensions: Some(config.sync.allowed_extensions.clone()),
        ignore_patterns: Some(config.sync.ignore_patterns.clone()),
        embedding_batch_size: std::num::NonZeroUsize::new(
            config.limits().embedding_batch_size.get() as usize,
        )
        .unwrap_or(std::num::NonZeroUsize::MAX),
        chunk_limit: std::num::NonZeroUsize::MAX,
        max_files: std::num::NonZeroUsize::new(config.limits().sync_max_files.get() as usize),
        max_file_size_bytes: Some(config.limits().sync_max_file_size_bytes.get()),
        max_buffered_chunks: None,
        max_buffered_embeddings: None,
        max_in_flight_files: None,
        max_in_flight_embedding_batches: None,
        max_in_flight_inserts: None,
        full_scan_interval_ms: config.limits().sync_full_scan_interval_ms.get(),
        on_progress: None,
    })
}

fn not_indexed_error() -> InfraError {
    ErrorEnvelope::expected(ErrorCode::invalid_input(), "codebase is not indexed yet")
}

fn resolve_splitter(splitter: Option<&str>) -> Result<(), InfraError> {
    match splitter {
        None | Some("ast") => Ok(()),
        Some("langchain") => {
            tracing::warn!(splitter = "langchain", "falling back to the ast splitter");
            Ok(())
        },
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("unknown splitter: {other}"),
        )
        .with_metadata("field", "splitter")),
    }
}

fn matches_extension_filter(relative_path: &str, extensions: Option<&[String]>) -> bool {
    let Some(extensions) = extensions else {
        return true;
    };
    if extensions.is_empty() {
        return true;
    }
    extensions
        .iter()
        .any(|extension| relative_path.ends_with(extension.as_str()))
}

fn validate_extension_filter_entry(entry: &str) -> Result<(), InfraError> {
    let valid = entry.starts_with('.')
        && entry.len() > 1
        && entry[1..].chars().all(|ch| ch.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("extensionFilter entry must match \\.[A-Za-z0-9]+: {entry}"),
        )
        .with_metadata("field", "extensionFilter"))
    }
}

fn sync_overrides_json(
    custom_extensions: Option<&[String]>,
    ignore_patterns: Option<&[String]>,
) -> Option<String> {
    let mut sync = serde_json::Map::new();
    if let Some(extensions) = custom_extensions {
        sync.insert("allowedExtensions".to_string(), json!(extensions));
    }
    if let Some(patterns) = ignore_patterns {
        sync.insert("ignorePatterns".to_string(), json!(patterns));
    }
    if sync.is_empty() {
        return None;
    }
    Some(json!({ "sync": Value::Object(sync) }).to_string())
}

fn counters_json(counters: &semantic_code_domain::SyncCounters) -> Value {
    json!({
        "watchUpdates": counters.watch_updates,
        "fullScans": counters.full_scans,
        "debouncedEvents": counters.debounced_events,
        "failures": counters.failures,
        "cacheHits": counters.cache_hits,
        "cacheMisses": counters.cache_misses,
    })
}

fn path_key(path: &Path) -> Box<str> {
    path.to_string_lossy().to_string().into_boxed_str()
}

fn require_absolute(path: &Path) -> Result<PathBuf, InfraError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "path must be absolute",
        )
        .with_metadata("field", "path"))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, InfraError> {
    serde_json::from_value(params).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("invalid tool params: {error}"),
        )
    })
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn render_response(response: Result<Value, InfraError>) -> String {
    let payload = match response {
        Ok(result) => json!({ "isError": false, "result": result }),
        Err(error) => {
            let api_error = crate::infra_error_to_api_v1(&error);
            json!({ "isError": true, "error": api_error })
        },
    };
    serde_json::to_string(&payload).unwrap_or_else(|_| {
        "{\"isError\":true,\"error\":{\"code\":\"core.internal\",\"message\":\"failed to serialize response\",\"kind\":\"Invariant\"}}".to_string()
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathParams {
    path: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct OptionalPathParams {
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LimitedPathParams {
    path: PathBuf,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct IndexParams {
    path: PathBuf,
    #[serde(default)]
    force: bool,
    #[serde(default)]
    splitter: Option<String>,
    #[serde(default)]
    custom_extensions: Option<Vec<String>>,
    #[serde(default)]
    ignore_patterns: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    path: PathBuf,
    query: String,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    extension_filter: Option<Vec<String>>,
}
