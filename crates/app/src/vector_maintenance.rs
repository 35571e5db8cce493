//! Vector-store maintenance built on top of the raw `VectorDbPort` contract.
//!
//! `VectorDbPort` only exposes `query`/`delete`/`insert`/`insert_hybrid` as
//! primitives; the backup-delete-insert-rollback sequence for a single file's
//! chunks, batched deletes with partial-failure reporting, and the
//! bounded-concurrency fan-out across many files all live here as app-layer
//! orchestration, so every adapter gets them for free without adding methods
//! to the port trait.

use semantic_code_domain::{CollectionName, Language, LineSpan, VectorDocumentMetadata};
use semantic_code_ports::{LoggerPort, TelemetryPort, VectorDbPort, VectorDbRow, VectorDocumentForInsert};
use semantic_code_shared::{RequestContext, Result, WorkerPool, WorkerPoolOptions};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Default batch size for `bulk_delete`.
pub const DEFAULT_BULK_DELETE_BATCH: usize = 1000;

/// Default retry count for `atomic_file_update` and `bulk_delete`.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default bounded concurrency for `batch_file_updates`.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;

const BACKUP_OUTPUT_FIELDS: &[&str] = &[
    "id",
    "content",
    "relativePath",
    "language",
    "fileExtension",
    "startLine",
    "endLine",
    "vector",
];

/// Dependencies shared by the maintenance operations in this module.
#[derive(Clone)]
pub struct VectorMaintenanceDeps {
    /// Vector store adapter.
    pub vectordb: Arc<dyn VectorDbPort>,
    /// Optional structured logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Outcome of a single `atomic_file_update` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicFileUpdateOutcome {
    /// Whether the update completed without error.
    pub ok: bool,
    /// Number of chunks inserted (0 when the update was delete-only).
    pub chunks_processed: usize,
    /// Error detail, present only when `ok` is false.
    pub error: Option<Box<str>>,
}

/// Replace all chunks for `relative_path` with `new_chunks`.
///
/// Sequence: query the existing chunks for the path as a backup, delete them
/// by id, then insert `new_chunks` (an empty vec means "just delete"). If the
/// delete or insert step fails, the backup is reinserted before the whole
/// sequence is retried with exponential backoff (`retries` attempts beyond
/// the first).
pub async fn atomic_file_update(
    ctx: &RequestContext,
    deps: &VectorMaintenanceDeps,
    collection_name: CollectionName,
    relative_path: &str,
    new_chunks: Vec<VectorDocumentForInsert>,
    retries: u32,
) -> Result<AtomicFileUpdateOutcome> {
    let mut attempt = 0u32;
    let mut last_error = None;

    loop {
        ctx.ensure_not_cancelled("vector_maintenance.atomic_file_update")?;
        match try_atomic_file_update(
            ctx,
            deps,
            collection_name.clone(),
            relative_path,
            new_chunks.clone(),
        )
        .await
        {
            Ok(chunks_processed) => {
                return Ok(AtomicFileUpdateOutcome {
                    ok: true,
                    chunks_processed,
                    error: None,
                });
            },
            Err(error) => {
                log_warn(
                    deps,
                    "vector_maintenance.atomic_file_update.attempt_failed",
                    relative_path,
                    &error.to_string(),
                );
                last_error = Some(error);
                attempt += 1;
                if attempt > retries {
                    break;
                }
                tokio::time::sleep(backoff_delay(attempt)).await;
            },
        }
    }

    Ok(AtomicFileUpdateOutcome {
        ok: false,
        chunks_processed: 0,
        error: last_error.map(|error| error.to_string().into_boxed_str()),
    })
}

async fn try_atomic_file_update(
    ctx: &RequestContext,
    deps: &VectorMaintenanceDeps,
    collection_name: CollectionName,
    relative_path: &str,
    new_chunks: Vec<VectorDocumentForInsert>,
) -> Result<usize> {
    let backup = query_backup(ctx, deps, collection_name.clone(), relative_path).await?;
    let backup_ids: Vec<Box<str>> = backup.iter().map(|doc| doc.id.clone()).collect();

    if !backup_ids.is_empty() {
        if let Err(error) = deps
            .vectordb
            .delete(ctx, collection_name.clone(), backup_ids)
            .await
        {
            rollback(ctx, deps, collection_name, &backup).await;
            return Err(error);
        }
    }

    let chunk_count = new_chunks.len();
    if !new_chunks.is_empty() {
        if let Err(error) = deps
            .vectordb
            .insert_hybrid(ctx, collection_name.clone(), new_chunks)
            .await
        {
            rollback(ctx, deps, collection_name, &backup).await;
            return Err(error);
        }
    }

    Ok(chunk_count)
}

async fn rollback(
    ctx: &RequestContext,
    deps: &VectorMaintenanceDeps,
    collection_name: CollectionName,
    backup: &[VectorDocumentForInsert],
) {
    if backup.is_empty() {
        return;
    }
    if let Err(error) = deps
        .vectordb
        .insert_hybrid(ctx, collection_name, backup.to_vec())
        .await
    {
        log_warn(
            deps,
            "vector_maintenance.atomic_file_update.rollback_failed",
            "",
            &error.to_string(),
        );
    }
}

async fn query_backup(
    ctx: &RequestContext,
    deps: &VectorMaintenanceDeps,
    collection_name: CollectionName,
    relative_path: &str,
) -> Result<Vec<VectorDocumentForInsert>> {
    let filter = milvus_eq_string("relativePath", relative_path);
    let output_fields = BACKUP_OUTPUT_FIELDS
        .iter()
        .map(|field| (*field).into())
        .collect();
    let rows = deps
        .vectordb
        .query(ctx, collection_name, filter, output_fields, None)
        .await?;
    Ok(rows.iter().filter_map(row_to_insert_document).collect())
}

/// Aggregate outcome of a `bulk_delete` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteOutcome {
    /// Number of ids confirmed deleted.
    pub deleted_count: usize,
    /// Ids whose batch failed even after retries.
    pub failed_ids: Vec<Box<str>>,
}

/// Delete `ids` in batches of `batch_size`, retrying each failed batch up to
/// `retries` times with exponential backoff. Never fails the whole call for a
/// per-batch failure; those ids are reported in `failed_ids` instead.
pub async fn bulk_delete(
    ctx: &RequestContext,
    deps: &VectorMaintenanceDeps,
    collection_name: CollectionName,
    ids: Vec<Box<str>>,
    batch_size: usize,
    retries: u32,
) -> Result<BulkDeleteOutcome> {
    let mut outcome = BulkDeleteOutcome::default();
    for batch in ids.chunks(batch_size.max(1)) {
        ctx.ensure_not_cancelled("vector_maintenance.bulk_delete")?;
        let batch = batch.to_vec();
        match delete_batch_with_retry(ctx, deps, collection_name.clone(), batch.clone(), retries).await
        {
            Ok(()) => outcome.deleted_count += batch.len(),
            Err(error) => {
                log_warn(
                    deps,
                    "vector_maintenance.bulk_delete.batch_failed",
                    "",
                    &error.to_string(),
                );
                outcome.failed_ids.extend(batch);
            },
        }
    }
    Ok(outcome)
}

async fn delete_batch_with_retry(
    ctx: &RequestContext,
    deps: &VectorMaintenanceDeps,
    collection_name: CollectionName,
    ids: Vec<Box<str>>,
    retries: u32,
) -> Result<()> {
    let mut attempt = 0u32;
    loop {
        match deps
            .vectordb
            .delete(ctx, collection_name.clone(), ids.clone())
            .await
        {
            Ok(()) => return Ok(()),
            Err(error) => {
                attempt += 1;
                if attempt > retries {
                    return Err(error);
                }
                tokio::time::sleep(backoff_delay(attempt)).await;
            },
        }
    }
}

/// One file's worth of replacement chunks for `batch_file_updates`.
pub struct FileUpdateEntry {
    /// Relative path the chunks belong to.
    pub relative_path: Box<str>,
    /// Replacement chunks (empty means "just delete").
    pub chunks: Vec<VectorDocumentForInsert>,
}

/// Per-file result from `batch_file_updates`.
pub struct FileUpdateResult {
    /// Relative path this result covers.
    pub relative_path: Box<str>,
    /// Outcome of the per-file atomic update.
    pub outcome: AtomicFileUpdateOutcome,
}

/// Run `atomic_file_update` for every entry with bounded concurrency,
/// collecting per-file outcomes without aborting the set on an individual
/// failure.
pub async fn batch_file_updates(
    ctx: &RequestContext,
    deps: &VectorMaintenanceDeps,
    collection_name: CollectionName,
    entries: Vec<FileUpdateEntry>,
    concurrency: usize,
) -> Result<Vec<FileUpdateResult>> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let pool = WorkerPool::new(
        ctx.clone(),
        WorkerPoolOptions {
            concurrency: concurrency.max(1),
            queue_capacity: None,
        },
    )?;

    let deps = deps.clone();
    let task_ctx = ctx.clone();
    let results = pool
        .map(entries, move |entry, _index| {
            let deps = deps.clone();
            let collection_name = collection_name.clone();
            let task_ctx = task_ctx.clone();
            async move {
                let outcome = atomic_file_update(
                    &task_ctx,
                    &deps,
                    collection_name,
                    entry.relative_path.as_ref(),
                    entry.chunks,
                    DEFAULT_RETRIES,
                )
                .await?;
                Ok(FileUpdateResult {
                    relative_path: entry.relative_path,
                    outcome,
                })
            }
        })
        .await?;

    pool.shutdown().await?;
    Ok(results)
}

/// Probe server-side collection-count capacity by attempting to create and
/// immediately drop a disposable collection. Returns `false` iff the server
/// reports a collection-count limit breach; any other error propagates.
pub async fn check_collection_limit(
    ctx: &RequestContext,
    deps: &VectorMaintenanceDeps,
) -> Result<bool> {
    let probe_name = probe_collection_name();
    match deps
        .vectordb
        .create_collection(ctx, probe_name.clone(), 1, None)
        .await
    {
        Ok(()) => {
            let _ = deps.vectordb.drop_collection(ctx, probe_name).await;
            Ok(true)
        },
        Err(error) if is_collection_limit_error(&error) => Ok(false),
        Err(error) => Err(error),
    }
}

fn probe_collection_name() -> CollectionName {
    // Fixed name is fine: the probe collection never outlives this call, and
    // a stale leftover from a crash mid-probe is just dropped again next time.
    CollectionName::parse("sca_collection_limit_probe")
        .unwrap_or_else(|_| unreachable_probe_name())
}

fn unreachable_probe_name() -> CollectionName {
    // `sca_collection_limit_probe` is a valid name under every naming rule the
    // domain crate enforces; this branch exists only so the call site above
    // never needs `expect`.
    CollectionName::parse("probe").unwrap_or_else(|error| {
        unreachable!("fallback probe collection name must always parse: {error}")
    })
}

fn is_collection_limit_error(error: &semantic_code_shared::ErrorEnvelope) -> bool {
    error.code.code() == "vdb_collection_limit"
}

fn row_to_insert_document(row: &VectorDbRow) -> Option<VectorDocumentForInsert> {
    let id = string_field(row, "id")?;
    let content = string_field(row, "content").unwrap_or_default();
    let relative_path = string_field(row, "relativePath")?;
    let start_line = u32_field(row, "startLine")?;
    let end_line = u32_field(row, "endLine")?;
    let span = LineSpan::new(start_line, end_line).ok()?;
    let language = row
        .get("language")
        .and_then(|value| serde_json::from_value::<Language>(value.clone()).ok());
    let file_extension = string_field(row, "fileExtension").map(String::into_boxed_str);
    let vector = vector_field(row, "vector")?;

    Some(VectorDocumentForInsert {
        id: id.into_boxed_str(),
        vector,
        content: content.into_boxed_str(),
        metadata: VectorDocumentMetadata {
            relative_path: relative_path.into_boxed_str(),
            language,
            file_extension,
            span,
            node_kind: None,
        },
    })
}

fn string_field(row: &VectorDbRow, field: &str) -> Option<String> {
    match row.get(field) {
        Some(Value::String(value)) => Some(value.clone()),
        _ => None,
    }
}

fn u32_field(row: &VectorDbRow, field: &str) -> Option<u32> {
    row.get(field)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
}

fn vector_field(row: &VectorDbRow, field: &str) -> Option<Arc<[f32]>> {
    match row.get(field) {
        Some(Value::Array(values)) => {
            let parsed: Option<Vec<f32>> = values
                .iter()
                .map(|value| value.as_f64().map(|value| value as f32))
                .collect();
            parsed.map(|vector| Arc::from(vector.into_boxed_slice()))
        },
        _ => None,
    }
}

fn milvus_eq_string(field: &str, value: &str) -> Box<str> {
    let escaped = escape_milvus_string_literal(value);
    format!("{field} == \"{escaped}\"").into_boxed_str()
}

fn escape_milvus_string_literal(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}

fn backoff_delay(attempt: u32) -> Duration {
    let millis = 1000u64.saturating_mul(1u64 << attempt.min(5));
    Duration::from_millis(millis.min(30_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use semantic_code_domain::VectorDbProviderId;
    use semantic_code_ports::{BoxFuture, VectorDbProviderInfo, VectorSearchRequest, VectorSearchResult};
    use semantic_code_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct FakeVectorDb {
        provider: VectorDbProviderInfo,
        rows: Mutex<Vec<VectorDbRow>>,
        deleted_ids: Mutex<Vec<Box<str>>>,
        inserted: Mutex<Vec<VectorDocumentForInsert>>,
        fail_delete_once: Mutex<bool>,
        fail_insert_once: Mutex<bool>,
        create_collection_result: Mutex<Option<Result<()>>>,
    }

    impl FakeVectorDb {
        fn new() -> Result<Self> {
            Ok(Self {
                provider: VectorDbProviderInfo {
                    id: VectorDbProviderId::parse("milvus_grpc").map_err(ErrorEnvelope::from)?,
                    name: "fake".into(),
                },
                rows: Mutex::new(Vec::new()),
                deleted_ids: Mutex::new(Vec::new()),
                inserted: Mutex::new(Vec::new()),
                fail_delete_once: Mutex::new(false),
                fail_insert_once: Mutex::new(false),
                create_collection_result: Mutex::new(None),
            })
        }

        fn with_rows(rows: Vec<VectorDbRow>) -> Result<Self> {
            let db = Self::new()?;
            *db.rows
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner) = rows;
            Ok(db)
        }
    }

    fn row(id: &str, path: &str) -> VectorDbRow {
        let mut row = BTreeMap::new();
        row.insert("id".into(), Value::String(id.to_owned()));
        row.insert("content".into(), Value::String("fn x() {}".to_owned()));
        row.insert("relativePath".into(), Value::String(path.to_owned()));
        row.insert("startLine".into(), Value::from(1));
        row.insert("endLine".into(), Value::from(2));
        row.insert(
            "vector".into(),
            Value::Array(vec![Value::from(0.1), Value::from(0.2)]),
        );
        row
    }

    impl VectorDbPort for FakeVectorDb {
        fn provider(&self) -> &VectorDbProviderInfo {
            &self.provider
        }

        fn create_collection(
            &self,
            _ctx: &RequestContext,
            _collection_name: CollectionName,
            _dimension: u32,
            _description: Option<Box<str>>,
        ) -> BoxFuture<'_, Result<()>> {
            let result = self
                .create_collection_result
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take()
                .unwrap_or(Ok(()));
            Box::pin(async move { result })
        }

        fn create_hybrid_collection(
            &self,
            _ctx: &RequestContext,
            _collection_name: CollectionName,
            _dimension: u32,
            _description: Option<Box<str>>,
        ) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn drop_collection(
            &self,
            _ctx: &RequestContext,
            _collection_name: CollectionName,
        ) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn has_collection(
            &self,
            _ctx: &RequestContext,
            _collection_name: CollectionName,
        ) -> BoxFuture<'_, Result<bool>> {
            Box::pin(async move { Ok(true) })
        }

        fn list_collections(
            &self,
            _ctx: &RequestContext,
        ) -> BoxFuture<'_, Result<Vec<CollectionName>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn insert(
            &self,
            _ctx: &RequestContext,
            _collection_name: CollectionName,
            documents: Vec<VectorDocumentForInsert>,
        ) -> BoxFuture<'_, Result<()>> {
            self.inserted
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .extend(documents);
            Box::pin(async move { Ok(()) })
        }

        fn insert_hybrid(
            &self,
            ctx: &RequestContext,
            collection_name: CollectionName,
            documents: Vec<VectorDocumentForInsert>,
        ) -> BoxFuture<'_, Result<()>> {
            let mut fail = self
                .fail_insert_once
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if *fail {
                *fail = false;
                return Box::pin(async move {
                    Err(ErrorEnvelope::unexpected(
                        ErrorCode::internal(),
                        "insert failed",
                        ErrorClass::Retriable,
                    ))
                });
            }
            drop(fail);
            self.insert(ctx, collection_name, documents)
        }

        fn search(
            &self,
            _ctx: &RequestContext,
            _request: VectorSearchRequest,
        ) -> BoxFuture<'_, Result<Vec<VectorSearchResult>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn hybrid_search(
            &self,
            _ctx: &RequestContext,
            _request: semantic_code_ports::HybridSearchBatchRequest,
        ) -> BoxFuture<'_, Result<Vec<semantic_code_ports::HybridSearchResult>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn delete(
            &self,
            _ctx: &RequestContext,
            _collection_name: CollectionName,
            ids: Vec<Box<str>>,
        ) -> BoxFuture<'_, Result<()>> {
            let mut fail = self
                .fail_delete_once
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if *fail {
                *fail = false;
                return Box::pin(async move {
                    Err(ErrorEnvelope::unexpected(
                        ErrorCode::internal(),
                        "delete failed",
                        ErrorClass::Retriable,
                    ))
                });
            }
            drop(fail);
            self.deleted_ids
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .extend(ids);
            Box::pin(async move { Ok(()) })
        }

        fn query(
            &self,
            _ctx: &RequestContext,
            _collection_name: CollectionName,
            _filter: Box<str>,
            _output_fields: Vec<Box<str>>,
            _limit: Option<u32>,
        ) -> BoxFuture<'_, Result<Vec<VectorDbRow>>> {
            let rows = self
                .rows
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone();
            Box::pin(async move { Ok(rows) })
        }
    }

    fn collection() -> Result<CollectionName> {
        CollectionName::parse("code_chunks_maint").map_err(ErrorEnvelope::from)
    }

    fn sample_insert(id: &str, path: &str) -> Result<VectorDocumentForInsert> {
        Ok(VectorDocumentForInsert {
            id: id.into(),
            vector: Arc::from(vec![0.3_f32, 0.4].into_boxed_slice()),
            content: "fn y() {}".into(),
            metadata: VectorDocumentMetadata {
                relative_path: path.into(),
                language: Some(Language::Rust),
                file_extension: Some("rs".into()),
                span: LineSpan::new(1, 3).map_err(ErrorEnvelope::from)?,
                node_kind: None,
            },
        })
    }

    #[tokio::test]
    async fn atomic_file_update_deletes_old_and_inserts_new() -> Result<()> {
        let ctx = RequestContext::new_request();
        let db = Arc::new(FakeVectorDb::with_rows(vec![row("old-1", "src/lib.rs")])?);
        let deps = VectorMaintenanceDeps {
            vectordb: db.clone(),
            logger: None,
            telemetry: None,
        };

        let outcome = atomic_file_update(
            &ctx,
            &deps,
            collection()?,
            "src/lib.rs",
            vec![sample_insert("new-1", "src/lib.rs")?],
            DEFAULT_RETRIES,
        )
        .await?;

        assert!(outcome.ok);
        assert_eq!(outcome.chunks_processed, 1);
        assert_eq!(
            db.deleted_ids
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .as_slice(),
            &[Box::from("old-1")]
        );
        assert_eq!(
            db.inserted
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len(),
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn atomic_file_update_delete_only_skips_insert() -> Result<()> {
        let ctx = RequestContext::new_request();
        let db = Arc::new(FakeVectorDb::with_rows(vec![row("old-1", "src/lib.rs")])?);
        let deps = VectorMaintenanceDeps {
            vectordb: db.clone(),
            logger: None,
            telemetry: None,
        };

        let outcome = atomic_file_update(
            &ctx,
            &deps,
            collection()?,
            "src/lib.rs",
            Vec::new(),
            DEFAULT_RETRIES,
        )
        .await?;

        assert!(outcome.ok);
        assert_eq!(outcome.chunks_processed, 0);
        assert!(
            db.inserted
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .is_empty()
        );
        Ok(())
    }

    #[tokio::test]
    async fn atomic_file_update_rolls_back_backup_on_insert_failure() -> Result<()> {
        let ctx = RequestContext::new_request();
        let db = Arc::new(FakeVectorDb::with_rows(vec![row("old-1", "src/lib.rs")])?);
        *db.fail_insert_once
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = true;
        let deps = VectorMaintenanceDeps {
            vectordb: db.clone(),
            logger: None,
            telemetry: None,
        };

        let outcome = atomic_file_update(
            &ctx,
            &deps,
            collection()?,
            "src/lib.rs",
            vec![sample_insert("new-1", "src/lib.rs")?],
            0,
        )
        .await?;

        assert!(!outcome.ok);
        // The rollback reinserts the backup even though the caller's insert failed.
        let inserted = db
            .inserted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(inserted.iter().any(|doc| doc.id.as_ref() == "old-1"));
        Ok(())
    }

    #[tokio::test]
    async fn bulk_delete_batches_and_reports_failed_ids() -> Result<()> {
        let ctx = RequestContext::new_request();
        let db = Arc::new(FakeVectorDb::new()?);
        *db.fail_delete_once
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = true;
        let deps = VectorMaintenanceDeps {
            vectordb: db.clone(),
            logger: None,
            telemetry: None,
        };

        let ids: Vec<Box<str>> = vec!["a".into(), "b".into(), "c".into()];
        let outcome = bulk_delete(&ctx, &deps, collection()?, ids, 2, 0).await?;

        // First batch of 2 fails once (no retries) and is reported; second batch of 1 succeeds.
        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(outcome.failed_ids.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn check_collection_limit_reports_false_on_limit_error() -> Result<()> {
        let ctx = RequestContext::new_request();
        let db = Arc::new(FakeVectorDb::new()?);
        *db.create_collection_result
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Err(ErrorEnvelope::expected(
            ErrorCode::new("vector", "vdb_collection_limit"),
            "collection limit reached",
        )));
        let deps = VectorMaintenanceDeps {
            vectordb: db,
            logger: None,
            telemetry: None,
        };

        let within_limit = check_collection_limit(&ctx, &deps).await?;
        assert!(!within_limit);
        Ok(())
    }

    #[tokio::test]
    async fn check_collection_limit_true_when_probe_succeeds() -> Result<()> {
        let ctx = RequestContext::new_request();
        let db = Arc::new(FakeVectorDb::new()?);
        let deps = VectorMaintenanceDeps {
            vectordb: db,
            logger: None,
            telemetry: None,
        };

        let within_limit = check_collection_limit(&ctx, &deps).await?;
        assert!(within_limit);
        Ok(())
    }
}

fn log_warn(deps: &VectorMaintenanceDeps, event: &str, relative_path: &str, detail: &str) {
    let Some(logger) = deps.logger.as_ref() else {
        return;
    };
    let mut fields = semantic_code_ports::LogFields::new();
    if !relative_path.is_empty() {
        fields.insert(
            "relativePath".into(),
            Value::String(relative_path.to_owned()),
        );
    }
    fields.insert("detail".into(), Value::String(detail.to_owned()));
    logger.warn(event, event, Some(fields));
}
