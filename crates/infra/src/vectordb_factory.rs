//! Vector DB adapter selection and initialization.

use crate::InfraResult;
use semantic_code_adapters::vectordb::fixed::FixedDimensionVectorDb;
use semantic_code_adapters::vectordb_local::LocalVectorDb;
use semantic_code_config::{SnapshotStorageMode, ValidatedBackendConfig};
use semantic_code_ports::VectorDbPort;
use semantic_code_shared::{ErrorCode, ErrorEnvelope};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "milvus-grpc")]
use semantic_code_adapters::vectordb::milvus::{MilvusGrpcConfig, MilvusGrpcVectorDb};
#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
use semantic_code_adapters::vectordb::milvus::{MilvusIndexConfig, MilvusIndexSpec};
#[cfg(feature = "milvus-rest")]
use semantic_code_adapters::vectordb::milvus::{MilvusRestConfig, MilvusRestVectorDb};
#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
use semantic_code_adapters::vectordb::pool::{ConnectionPool, PoolKey, PooledConnection};
#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
use semantic_code_config::schema::{VectorDbConfig, VectorDbIndexConfig};
#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
use std::sync::OnceLock;
#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProviderKind {
    Local,
    MilvusGrpc,
    MilvusRest,
}

/// Build a vector DB port using config settings.
pub async fn build_vectordb_port(
    config: &ValidatedBackendConfig,
    codebase_root: &Path,
    snapshot_storage: SnapshotStorageMode,
) -> InfraResult<Arc<dyn VectorDbPort>> {
    let provider = parse_provider(config.vector_db.provider.as_deref())?;
    match provider {
        ProviderKind::Local => {
            let adapter = LocalVectorDb::new(codebase_root.to_path_buf(), snapshot_storage)?;
            Ok(wrap_vectordb_fixed(config.embedding.dimension, adapter))
        },
        ProviderKind::MilvusGrpc => build_milvus_grpc(config).await,
        ProviderKind::MilvusRest => build_milvus_rest(config).await,
    }
}

fn parse_provider(value: Option<&str>) -> InfraResult<ProviderKind> {
    let raw = value.unwrap_or("local").trim();
    let normalized = raw.to_ascii_lowercase();
    match normalized.as_str() {
        "local" => Ok(ProviderKind::Local),
        "milvus" | "milvus_grpc" | "milvus-grpc" | "grpc" => Ok(ProviderKind::MilvusGrpc),
        "milvus_rest" | "milvus-rest" | "rest" => Ok(ProviderKind::MilvusRest),
        _ => Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("unsupported vector DB provider: {raw}"),
        )
        .with_metadata("provider", raw.to_string())),
    }
}

#[cfg(feature = "milvus-grpc")]
static MILVUS_GRPC_POOL: OnceLock<Arc<ConnectionPool<MilvusGrpcVectorDb>>> = OnceLock::new();

/// Process-wide pool shared across every codebase using the Milvus gRPC
/// backend. Built once per process on first use; `idle_reap_ms` from the
/// first caller's config wins and seeds the background reaper.
#[cfg(feature = "milvus-grpc")]
fn milvus_grpc_pool(idle_reap_ms: u64) -> Arc<ConnectionPool<MilvusGrpcVectorDb>> {
    Arc::clone(MILVUS_GRPC_POOL.get_or_init(|| {
        let pool = Arc::new(ConnectionPool::new(Duration::from_millis(idle_reap_ms)));
        pool.spawn_reaper(Duration::from_millis(idle_reap_ms));
        pool
    }))
}

#[cfg(feature = "milvus-rest")]
static MILVUS_REST_POOL: OnceLock<Arc<ConnectionPool<MilvusRestVectorDb>>> = OnceLock::new();

#[cfg(feature = "milvus-rest")]
fn milvus_rest_pool(idle_reap_ms: u64) -> Arc<ConnectionPool<MilvusRestVectorDb>> {
    Arc::clone(MILVUS_REST_POOL.get_or_init(|| {
        let pool = Arc::new(ConnectionPool::new(Duration::from_millis(idle_reap_ms)));
        pool.spawn_reaper(Duration::from_millis(idle_reap_ms));
        pool
    }))
}

#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
fn pool_key(config: &VectorDbConfig, address: &str) -> PoolKey {
    PoolKey::new(
        address.to_owned(),
        config
            .username
            .as_deref()
            .map(|value| value.to_owned().into_boxed_str()),
        config.token.is_some(),
    )
}

/// Adapts a pooled connection handle back into `VectorDbPort` by forwarding
/// every call to the shared connection it wraps. Dropping it releases the
/// pool's refcount for that connection's key.
#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
struct PooledVectorDb<C> {
    handle: PooledConnection<C>,
}

#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
impl<C: VectorDbPort + 'static> VectorDbPort for PooledVectorDb<C> {
    fn provider(&self) -> &semantic_code_ports::VectorDbProviderInfo {
        self.handle.connection().provider()
    }

    fn create_collection(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        collection_name: semantic_code_domain::CollectionName,
        dimension: u32,
        description: Option<Box<str>>,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<()>> {
        self.handle
            .connection()
            .create_collection(ctx, collection_name, dimension, description)
    }

    fn create_hybrid_collection(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        collection_name: semantic_code_domain::CollectionName,
        dimension: u32,
        description: Option<Box<str>>,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<()>> {
        self.handle
            .connection()
            .create_hybrid_collection(ctx, collection_name, dimension, description)
    }

    fn drop_collection(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        collection_name: semantic_code_domain::CollectionName,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<()>> {
        self.handle.connection().drop_collection(ctx, collection_name)
    }

    fn has_collection(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        collection_name: semantic_code_domain::CollectionName,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<bool>> {
        self.handle.connection().has_collection(ctx, collection_name)
    }

    fn list_collections(
        &self,
        ctx: &semantic_code_shared::RequestContext,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<Vec<semantic_code_domain::CollectionName>>>
    {
        self.handle.connection().list_collections(ctx)
    }

    fn insert(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        collection_name: semantic_code_domain::CollectionName,
        documents: Vec<semantic_code_ports::VectorDocumentForInsert>,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<()>> {
        self.handle.connection().insert(ctx, collection_name, documents)
    }

    fn insert_hybrid(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        collection_name: semantic_code_domain::CollectionName,
        documents: Vec<semantic_code_ports::VectorDocumentForInsert>,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<()>> {
        self.handle
            .connection()
            .insert_hybrid(ctx, collection_name, documents)
    }

    fn search(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        request: semantic_code_ports::VectorSearchRequest,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<Vec<semantic_code_ports::VectorSearchResult>>>
    {
        self.handle.connection().search(ctx, request)
    }

    fn hybrid_search(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        request: semantic_code_ports::HybridSearchBatchRequest,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<Vec<semantic_code_ports::HybridSearchResult>>>
    {
        self.handle.connection().hybrid_search(ctx, request)
    }

    fn delete(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        collection_name: semantic_code_domain::CollectionName,
        ids: Vec<Box<str>>,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<()>> {
        self.handle.connection().delete(ctx, collection_name, ids)
    }

    fn query(
        &self,
        ctx: &semantic_code_shared::RequestContext,
        collection_name: semantic_code_domain::CollectionName,
        filter: Box<str>,
        output_fields: Vec<Box<str>>,
        limit: Option<u32>,
    ) -> semantic_code_ports::BoxFuture<'_, semantic_code_shared::Result<Vec<semantic_code_ports::VectorDbRow>>> {
        self.handle
            .connection()
            .query(ctx, collection_name, filter, output_fields, limit)
    }
}

#[cfg(feature = "milvus-grpc")]
async fn build_milvus_grpc(config: &ValidatedBackendConfig) -> InfraResult<Arc<dyn VectorDbPort>> {
    let address = resolve_address(&config.vector_db)?;
    let address_for_error = address.to_string();
    let index_config = build_milvus_index_config(&config.vector_db.index);
    let key = pool_key(&config.vector_db, &address);
    let pool = milvus_grpc_pool(config.limits().pool_idle_reap_ms.get());

    let grpc_config = MilvusGrpcConfig {
        address,
        token: config
            .vector_db
            .token
            .as_deref()
            .map(|value| value.to_owned().into_boxed_str()),
        username: config
            .vector_db
            .username
            .as_deref()
            .map(|value| value.to_owned().into_boxed_str()),
        password: config
            .vector_db
            .password
            .as_deref()
            .map(|value| value.to_owned().into_boxed_str()),
        ssl: config.vector_db.ssl,
        database: config
            .vector_db
            .database
            .as_deref()
            .map(|value| value.to_owned().into_boxed_str()),
        timeout_ms: config.vector_db.timeout_ms,
        index_timeout_ms: config.vector_db.index_timeout_ms,
        index_config,
    };

    let handle = pool
        .acquire(key, || async move { MilvusGrpcVectorDb::new(grpc_config).await })
        .await
        .map_err(|error| enrich_milvus_connection_error(error, &address_for_error))?;
    Ok(wrap_vectordb_fixed(
        config.embedding.dimension,
        PooledVectorDb { handle },
    ))
}

#[cfg(not(feature = "milvus-grpc"))]
async fn build_milvus_grpc(_config: &ValidatedBackendConfig) -> InfraResult<Arc<dyn VectorDbPort>> {
    std::future::ready(Err(ErrorEnvelope::expected(
        ErrorCode::invalid_input(),
        "milvus-grpc adapter is not enabled in this build",
    )))
    .await
}

#[cfg(feature = "milvus-rest")]
async fn build_milvus_rest(config: &ValidatedBackendConfig) -> InfraResult<Arc<dyn VectorDbPort>> {
    let address = resolve_address(&config.vector_db)?;
    let address_for_error = address.to_string();
    let index_config = build_milvus_index_config(&config.vector_db.index);
    let key = pool_key(&config.vector_db, &address);
    let pool = milvus_rest_pool(config.limits().pool_idle_reap_ms.get());

    let rest_config = MilvusRestConfig {
        address,
        token: config
            .vector_db
            .token
            .as_deref()
            .map(|value| value.to_owned().into_boxed_str()),
        username: config
            .vector_db
            .username
            .as_deref()
            .map(|value| value.to_owned().into_boxed_str()),
        password: config
            .vector_db
            .password
            .as_deref()
            .map(|value| value.to_owned().into_boxed_str()),
        database: config
            .vector_db
            .database
            .as_deref()
            .map(|value| value.to_owned().into_boxed_str()),
        timeout_ms: config.vector_db.timeout_ms,
        index_config,
    };

    // `MilvusRestVectorDb::new` is synchronous; the pool's `build` closure is
    // still async to share the same `acquire` path as the gRPC backend.
    let handle = pool
        .acquire(key, || async move { MilvusRestVectorDb::new(rest_config) })
        .await
        .map_err(|error| enrich_milvus_connection_error(error, &address_for_error))?;
    Ok(wrap_vectordb_fixed(
        config.embedding.dimension,
        PooledVectorDb { handle },
    ))
}

#[cfg(not(feature = "milvus-rest"))]
async fn build_milvus_rest(_config: &ValidatedBackendConfig) -> InfraResult<Arc<dyn VectorDbPort>> {
    Err(ErrorEnvelope::expected(
        ErrorCode::invalid_input(),
        "milvus-rest adapter is not enabled in this build",
    ))
}

#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
fn resolve_address(config: &VectorDbConfig) -> InfraResult<Box<str>> {
    // TODO: refactor repeated Option selection with a mapper helper.
    if let Some(address) = config.address.as_deref() {
        return Ok(address.to_owned().into_boxed_str());
    }
    if let Some(base_url) = config.base_url.as_deref() {
        return Ok(base_url.to_owned().into_boxed_str());
    }
    Err(ErrorEnvelope::expected(
        ErrorCode::invalid_input(),
        "vector DB address is required",
    ))
}

#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
fn build_milvus_index_config(config: &VectorDbIndexConfig) -> MilvusIndexConfig {
    MilvusIndexConfig {
        dense: MilvusIndexSpec {
            index_type: config.dense.index_type.clone(),
            metric_type: config.dense.metric_type.clone(),
            params: config.dense.params.clone(),
        },
        sparse: MilvusIndexSpec {
            index_type: config.sparse.index_type.clone(),
            metric_type: config.sparse.metric_type.clone(),
            params: config.sparse.params.clone(),
        },
    }
}

const FIXED_VECTOR_DIMENSIONS: &[u32] = &[8, 384, 768, 1024, 1536];

fn wrap_vectordb_fixed<P: VectorDbPort + 'static>(
    dimension: Option<u32>,
    port: P,
) -> Arc<dyn VectorDbPort> {
    let dimension = dimension.filter(|value| FIXED_VECTOR_DIMENSIONS.contains(value));
    match dimension {
        Some(8) => Arc::new(FixedDimensionVectorDb::<P, 8>::new(port)),
        Some(384) => Arc::new(FixedDimensionVectorDb::<P, 384>::new(port)),
        Some(768) => Arc::new(FixedDimensionVectorDb::<P, 768>::new(port)),
        Some(1024) => Arc::new(FixedDimensionVectorDb::<P, 1024>::new(port)),
        Some(1536) => Arc::new(FixedDimensionVectorDb::<P, 1536>::new(port)),
        _ => Arc::new(port),
    }
}

#[cfg(any(feature = "milvus-grpc", feature = "milvus-rest"))]
fn enrich_milvus_connection_error(error: ErrorEnvelope, address: &str) -> ErrorEnvelope {
    if error.code == ErrorCode::new("vector", "vdb_connection") {
        let message = format!(
            "Milvus is not reachable at {address}. Start it with `just milvus-up` or `docker compose up -d`. Original error: {}",
            error.message
        );
        return ErrorEnvelope { message, ..error };
    }
    error
}
