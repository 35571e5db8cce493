//! FreshnessGate: consulted at the start of every search (§4.8).
//!
//! Rather than reimplementing the `SyncCacheEntry` TTL dance a second time,
//! this composes with [`crate::sync_controller::SyncController`]: it reads
//! `status()` for the not-indexed/indexing gating decision and delegates the
//! cache/incremental-check/Workflow-B step to `check_and_maybe_sync`. Search
//! always proceeds after the sync attempt, even when the attempt failed —
//! failures are logged, never surfaced to the caller.

use crate::reindex_by_change::ReindexByChangeInput;
use crate::semantic_search::{SemanticSearchDeps, SemanticSearchInput, semantic_search};
use crate::sync_controller::{SyncController, SyncControllerDeps};
use semantic_code_domain::{IndexStatus, SearchResult};
use semantic_code_ports::LogFields;
use semantic_code_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::sync::Arc;

/// Dependencies for a freshness-gated search.
#[derive(Clone)]
pub struct FreshnessGateDeps {
    /// Shared per-codebase sync state and workflow dispatch.
    pub sync_controller: Arc<SyncController>,
    /// Low-level port dependencies used to run the sync workflows.
    pub sync_controller_deps: SyncControllerDeps,
    /// Dependencies for the underlying search.
    pub search: SemanticSearchDeps,
    /// Process-wide switch; when false the gate is bypassed entirely and
    /// every search runs unconditionally (§4.8 configuration note).
    pub enabled: bool,
}

/// Input to a freshness-gated search.
#[derive(Debug, Clone)]
pub struct FreshnessGateInput {
    /// Parameters for the incremental-check/Workflow-B step, fully resolved
    /// by the caller (codebase root, collection, index mode, batch sizes).
    pub reindex_input: ReindexByChangeInput,
    /// Query text to embed and search with.
    pub query: Box<str>,
    /// Optional top-k override.
    pub top_k: Option<u32>,
    /// Optional score threshold override.
    pub threshold: Option<f32>,
}

/// Result of a freshness-gated search.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessGateOutput {
    /// Search results, in the same order `semantic_search` returns them.
    pub results: Vec<SearchResult>,
    /// True when indexing was still in progress for this codebase, meaning
    /// the result set may be incomplete.
    pub indexing_in_progress: bool,
}

/// Run a search through the freshness gate.
pub async fn search_with_freshness_gate(
    ctx: &RequestContext,
    deps: &FreshnessGateDeps,
    input: FreshnessGateInput,
    now_ms: u64,
) -> Result<FreshnessGateOutput> {
    ctx.ensure_not_cancelled("freshness_gate.start")?;

    let collection_name = input.reindex_input.collection_name.clone();
    let indexing_in_progress = if deps.enabled {
        gate(ctx, deps, &input.reindex_input, &collection_name, now_ms).await?
    } else {
        false
    };

    let results = semantic_search(
        ctx,
        &deps.search,
        SemanticSearchInput {
            codebase_root: input
                .reindex_input
                .codebase_root
                .to_string_lossy()
                .into_owned()
                .into_boxed_str(),
            collection_name,
            index_mode: input.reindex_input.index_mode,
            query: input.query,
            top_k: input.top_k,
            threshold: input.threshold,
        },
    )
    .await?;

    Ok(FreshnessGateOutput { results, indexing_in_progress })
}

/// Returns `Ok(true)` when indexing is in progress (search should proceed with
/// an "incomplete results" annotation), `Ok(false)` otherwise, and an error
/// only when the codebase has never been indexed.
async fn gate(
    ctx: &RequestContext,
    deps: &FreshnessGateDeps,
    reindex_input: &ReindexByChangeInput,
    collection_name: &semantic_code_domain::CollectionName,
    now_ms: u64,
) -> Result<bool> {
    match deps.sync_controller.status(collection_name) {
        IndexStatus::NotIndexed => {
            return Err(ErrorEnvelope::expected(
                ErrorCode::not_found(),
                format!("codebase \"{}\" is not indexed", collection_name.as_str()),
            ));
        },
        IndexStatus::Indexing => return Ok(true),
        IndexStatus::Indexed | IndexStatus::LimitReached | IndexStatus::Failed { .. } => {},
    }

    if let Err(error) = deps
        .sync_controller
        .check_and_maybe_sync(ctx, &deps.sync_controller_deps, reindex_input.clone(), now_ms)
        .await
    {
        if let Some(logger) = &deps.search.logger {
            let mut fields = LogFields::new();
            fields.insert("collection".into(), collection_name.as_str().into());
            fields.insert("errorCode".into(), error.code.to_string().into());
            logger.warn(
                "freshness_gate.sync_failed",
                "freshness-gate sync attempt failed; search proceeds against the existing index",
                Some(fields),
            );
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_controller::SyncController;
    use semantic_code_domain::{CollectionName, IndexMode};
    use semantic_code_ports::{
        BoxFuture, DetectDimensionRequest, EmbedBatchRequest, EmbedRequest, EmbeddingProviderId,
        EmbeddingProviderInfo, EmbeddingVector, FileChangeSet, FileSyncInitOptions,
        FileSyncOptions, HybridSearchBatchRequest, HybridSearchResult, IgnoreMatchInput,
        SingleFileUpdateOptions, VectorDbProviderId, VectorDbProviderInfo, VectorDbRow,
        VectorDocumentForInsert, VectorSearchRequest, VectorSearchResult,
    };
    use semantic_code_shared::ErrorClass;
    use std::num::NonZeroUsize;
    use std::path::PathBuf;

    #[derive(Clone, Default)]
    struct NoopFileSync;

    impl semantic_code_ports::FileSyncPort for NoopFileSync {
        fn initialize(&self, _ctx: &RequestContext, _options: FileSyncInitOptions) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn check_for_changes(&self, _ctx: &RequestContext, _options: FileSyncOptions) -> BoxFuture<'_, Result<FileChangeSet>> {
            Box::pin(async move { Ok(FileChangeSet::default()) })
        }

        fn update_single_file(&self, _ctx: &RequestContext, _options: SingleFileUpdateOptions) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn delete_snapshot(&self, _ctx: &RequestContext, _codebase_root: PathBuf) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }
    }

    #[derive(Clone, Default)]
    struct NoopFileSystem;

    impl semantic_code_ports::FileSystemPort for NoopFileSystem {
        fn read_dir(&self, _ctx: &RequestContext, _codebase_root: PathBuf, _dir: semantic_code_ports::SafeRelativePath) -> BoxFuture<'_, Result<Vec<semantic_code_ports::FileSystemDirEntry>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn read_file_text(&self, _ctx: &RequestContext, _codebase_root: PathBuf, _file: semantic_code_ports::SafeRelativePath) -> BoxFuture<'_, Result<Box<str>>> {
            Box::pin(async move { Ok("".into()) })
        }

        fn stat(&self, _ctx: &RequestContext, _codebase_root: PathBuf, _path: semantic_code_ports::SafeRelativePath) -> BoxFuture<'_, Result<semantic_code_ports::FileSystemStat>> {
            Box::pin(async move {
                Ok(semantic_code_ports::FileSystemStat {
                    kind: semantic_code_ports::FileSystemEntryKind::File,
                    size_bytes: 0,
                    mtime_ms: 0,
                })
            })
        }
    }

    #[derive(Clone, Default)]
    struct NoopPathPolicy;

    impl semantic_code_ports::PathPolicyPort for NoopPathPolicy {
        fn to_safe_relative_path(&self, input: &str) -> Result<semantic_code_ports::SafeRelativePath> {
            semantic_code_ports::SafeRelativePath::new(input)
        }
    }

    #[derive(Clone, Default)]
    struct NoopIgnore;

    impl semantic_code_ports::IgnorePort for NoopIgnore {
        fn is_ignored(&self, _input: &IgnoreMatchInput) -> bool {
            false
        }
    }

    #[derive(Clone, Default)]
    struct NoopSplitter;

    impl semantic_code_ports::SplitterPort for NoopSplitter {
        fn split(&self, _ctx: &RequestContext, _code: Box<str>, _language: semantic_code_ports::Language, _options: semantic_code_ports::SplitOptions) -> BoxFuture<'_, Result<Vec<semantic_code_ports::CodeChunk>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn set_chunk_size(&self, _chunk_size: usize) {}
        fn set_chunk_overlap(&self, _chunk_overlap: usize) {}
    }

    #[derive(Clone)]
    struct NoopEmbedding {
        provider: EmbeddingProviderInfo,
    }

    impl NoopEmbedding {
        fn new() -> Result<Self> {
            Ok(Self {
                provider: EmbeddingProviderInfo {
                    id: EmbeddingProviderId::parse("openai").map_err(ErrorEnvelope::from)?,
                    name: "noop".into(),
                },
            })
        }
    }

    impl semantic_code_ports::EmbeddingPort for NoopEmbedding {
        fn provider(&self) -> &EmbeddingProviderInfo {
            &self.provider
        }

        fn detect_dimension(&self, _ctx: &RequestContext, _request: DetectDimensionRequest) -> BoxFuture<'_, Result<u32>> {
            Box::pin(async move { Ok(4) })
        }

        fn embed(&self, _ctx: &RequestContext, _request: EmbedRequest) -> BoxFuture<'_, Result<EmbeddingVector>> {
            Box::pin(async move { Ok(EmbeddingVector::from_vec(vec![0.0; 4])) })
        }

        fn embed_batch(&self, _ctx: &RequestContext, _request: EmbedBatchRequest) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }
    }

    #[derive(Clone)]
    struct NoopVectorDb {
        provider: VectorDbProviderInfo,
    }

    impl NoopVectorDb {
        fn new() -> Result<Self> {
            Ok(Self {
                provider: VectorDbProviderInfo {
                    id: VectorDbProviderId::parse("milvus_grpc").map_err(ErrorEnvelope::from)?,
                    name: "noop".into(),
                },
            })
        }
    }

    impl semantic_code_ports::VectorDbPort for NoopVectorDb {
        fn provider(&self) -> &VectorDbProviderInfo {
            &self.provider
        }

        fn create_collection(&self, _ctx: &RequestContext, _collection_name: CollectionName, _dimension: u32, _description: Option<Box<str>>) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn create_hybrid_collection(&self, _ctx: &RequestContext, _collection_name: CollectionName, _dimension: u32, _description: Option<Box<str>>) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn drop_collection(&self, _ctx: &RequestContext, _collection_name: CollectionName) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn has_collection(&self, _ctx: &RequestContext, _collection_name: CollectionName) -> BoxFuture<'_, Result<bool>> {
            Box::pin(async move { Ok(false) })
        }

        fn list_collections(&self, _ctx: &RequestContext) -> BoxFuture<'_, Result<Vec<CollectionName>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn insert(&self, _ctx: &RequestContext, _collection_name: CollectionName, _documents: Vec<VectorDocumentForInsert>) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn insert_hybrid(&self, _ctx: &RequestContext, _collection_name: CollectionName, _documents: Vec<VectorDocumentForInsert>) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn search(&self, _ctx: &RequestContext, _request: VectorSearchRequest) -> BoxFuture<'_, Result<Vec<VectorSearchResult>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn hybrid_search(&self, _ctx: &RequestContext, _request: HybridSearchBatchRequest) -> BoxFuture<'_, Result<Vec<HybridSearchResult>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn delete(&self, _ctx: &RequestContext, _collection_name: CollectionName, _ids: Vec<Box<str>>) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { Ok(()) })
        }

        fn query(&self, _ctx: &RequestContext, _collection_name: CollectionName, _filter: Box<str>, _output_fields: Vec<Box<str>>, _limit: Option<u32>) -> BoxFuture<'_, Result<Vec<VectorDbRow>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }
    }

    fn sync_controller_deps() -> Result<SyncControllerDeps> {
        Ok(SyncControllerDeps {
            file_sync: Arc::new(NoopFileSync),
            embedding: Arc::new(NoopEmbedding::new()?),
            vectordb: Arc::new(NoopVectorDb::new()?),
            splitter: Arc::new(NoopSplitter),
            filesystem: Arc::new(NoopFileSystem),
            path_policy: Arc::new(NoopPathPolicy),
            ignore: Arc::new(NoopIgnore),
            logger: None,
            telemetry: None,
        })
    }

    fn collection() -> Result<CollectionName> {
        CollectionName::parse("code_chunks_gate_test").map_err(ErrorEnvelope::from)
    }

    fn reindex_input(collection_name: CollectionName) -> ReindexByChangeInput {
        ReindexByChangeInput {
            codebase_root: PathBuf::from("/tmp/repo"),
            collection_name,
            index_mode: IndexMode::Dense,
            supported_extensions: None,
            ignore_patterns: None,
            embedding_batch_size: NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN),
            chunk_limit: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
            max_files: None,
            max_file_size_bytes: None,
            max_buffered_chunks: None,
            max_buffered_embeddings: None,
            max_in_flight_files: None,
            max_in_flight_embedding_batches: None,
            max_in_flight_inserts: None,
            full_scan_interval_ms: semantic_code_ports::DEFAULT_FULL_SCAN_INTERVAL_MS,
            on_progress: None,
        }
    }

    fn deps() -> Result<FreshnessGateDeps> {
        Ok(FreshnessGateDeps {
            sync_controller: Arc::new(SyncController::new()),
            sync_controller_deps: sync_controller_deps()?,
            search: SemanticSearchDeps {
                embedding: Arc::new(NoopEmbedding::new()?),
                vectordb: Arc::new(NoopVectorDb::new()?),
                logger: None,
                telemetry: None,
            },
            enabled: true,
        })
    }

    #[tokio::test]
    async fn not_indexed_codebase_returns_not_found_error() -> Result<()> {
        let deps = deps()?;
        let ctx = RequestContext::new_request();
        let collection_name = collection()?;

        let error = search_with_freshness_gate(
            &ctx,
            &deps,
            FreshnessGateInput {
                reindex_input: reindex_input(collection_name),
                query: "fn main".into(),
                top_k: None,
                threshold: None,
            },
            0,
        )
        .await
        .expect_err("expected not-indexed error");

        assert_eq!(error.class, ErrorClass::NonRetriable);
        Ok(())
    }

    #[tokio::test]
    async fn indexed_codebase_searches_through_the_sync_check() -> Result<()> {
        let deps = deps()?;
        let ctx = RequestContext::new_request();
        let collection_name = collection()?;

        deps.sync_controller
            .run_full_index(
                &ctx,
                &deps.sync_controller_deps,
                crate::index_codebase::IndexCodebaseInput {
                    codebase_root: PathBuf::from("/tmp/repo"),
                    collection_name: collection_name.clone(),
                    index_mode: IndexMode::Dense,
                    supported_extensions: None,
                    ignore_patterns: None,
                    file_list: None,
                    force_reindex: false,
                    on_progress: None,
                    embedding_batch_size: NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN),
                    chunk_limit: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
                    max_files: None,
                    max_file_size_bytes: None,
                    max_buffered_chunks: None,
                    max_buffered_embeddings: None,
                    max_in_flight_files: None,
                    max_in_flight_embedding_batches: None,
                    max_in_flight_inserts: None,
                },
                0,
            )
            .await?;
        assert_eq!(deps.sync_controller.status(&collection_name), IndexStatus::Indexed);

        let output = search_with_freshness_gate(
            &ctx,
            &deps,
            FreshnessGateInput {
                reindex_input: reindex_input(collection_name),
                query: "fn main".into(),
                top_k: None,
                threshold: None,
            },
            1,
        )
        .await?;

        assert!(!output.indexing_in_progress);
        assert!(output.results.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn disabled_gate_bypasses_status_check() -> Result<()> {
        let mut deps = deps()?;
        deps.enabled = false;
        let ctx = RequestContext::new_request();
        let collection_name = collection()?;

        let output = search_with_freshness_gate(
            &ctx,
            &deps,
            FreshnessGateInput {
                reindex_input: reindex_input(collection_name),
                query: "fn main".into(),
                top_k: None,
                threshold: None,
            },
            0,
        )
        .await?;

        assert!(!output.indexing_in_progress);
        assert!(output.results.is_empty());
        Ok(())
    }
}
