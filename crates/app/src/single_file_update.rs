//! SyncController Workflow C: apply a single-file change reported by the Watcher.
//!
//! A debounced filesystem event already names the exact path and action, so
//! this workflow skips the `FileSyncPort::check_for_changes` full rescan and
//! goes straight to `update_single_file`, then performs the matching
//! `VectorStore` operation via [`crate::vector_maintenance`].

use crate::vector_maintenance::{VectorMaintenanceDeps, atomic_file_update};
use semantic_code_domain::{
    ChunkIdInput, CollectionName, Language, VectorDocumentMetadata, derive_chunk_id,
};
use semantic_code_ports::{
    EmbeddingPort, FileSyncPort, FileSystemEntryKind, FileSystemPort, PathPolicyPort,
    SingleFileChangeAction, SingleFileUpdateOptions, SplitOptions, SplitterPort,
    VectorDocumentForInsert,
};
use semantic_code_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Dependencies required to apply a single-file update.
#[derive(Clone)]
pub struct SingleFileUpdateDeps {
    /// Snapshot/change-detection adapter.
    pub file_sync: Arc<dyn FileSyncPort>,
    /// Vector store maintenance dependencies (vectordb + optional logger/telemetry).
    pub vector_maintenance: VectorMaintenanceDeps,
    /// Embedding adapter.
    pub embedding: Arc<dyn EmbeddingPort>,
    /// Splitter adapter.
    pub splitter: Arc<dyn SplitterPort>,
    /// Filesystem adapter.
    pub filesystem: Arc<dyn FileSystemPort>,
    /// Path policy adapter.
    pub path_policy: Arc<dyn PathPolicyPort>,
}

/// Input for a single-file update triggered by the Watcher.
#[derive(Debug, Clone)]
pub struct SingleFileUpdateInput {
    /// Absolute codebase root the path is relative to.
    pub codebase_root: PathBuf,
    /// Target collection.
    pub collection_name: CollectionName,
    /// Path relative to `codebase_root`.
    pub relative_path: Box<str>,
    /// What the Watcher observed.
    pub action: SingleFileChangeAction,
}

/// Outcome of applying a single-file update.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleFileUpdateOutput {
    /// Whether the matching `VectorStore` operation succeeded.
    pub ok: bool,
    /// Number of chunks inserted for `Modified` (0 for `Removed`).
    pub chunks_processed: usize,
    /// Error detail, present only when `ok` is false.
    pub error: Option<Box<str>>,
}

/// Apply a single-file change: commit it to the snapshot, then replace or
/// clear the file's chunks in the vector store.
pub async fn apply_single_file_update(
    ctx: &RequestContext,
    deps: &SingleFileUpdateDeps,
    input: SingleFileUpdateInput,
) -> Result<SingleFileUpdateOutput> {
    ctx.ensure_not_cancelled("single_file_update.start")?;

    deps.file_sync
        .update_single_file(
            ctx,
            SingleFileUpdateOptions {
                codebase_root: input.codebase_root.clone(),
                relative_path: input.relative_path.clone(),
                action: input.action,
            },
        )
        .await?;

    let new_chunks = match input.action {
        SingleFileChangeAction::Removed => Vec::new(),
        SingleFileChangeAction::Modified => {
            process_file(ctx, deps, &input.codebase_root, &input.relative_path).await?
        },
    };

    let outcome = atomic_file_update(
        ctx,
        &deps.vector_maintenance,
        input.collection_name,
        input.relative_path.as_ref(),
        new_chunks,
        crate::vector_maintenance::DEFAULT_RETRIES,
    )
    .await?;

    Ok(SingleFileUpdateOutput {
        ok: outcome.ok,
        chunks_processed: outcome.chunks_processed,
        error: outcome.error,
    })
}

/// Read, split, and embed a single file into insertable chunks.
///
/// Mirrors the per-file pipeline in `index_codebase`, without that module's
/// batching and backpressure machinery: a single watched file is small enough
/// to embed in one request.
async fn process_file(
    ctx: &RequestContext,
    deps: &SingleFileUpdateDeps,
    codebase_root: &std::path::Path,
    relative_path: &str,
) -> Result<Vec<VectorDocumentForInsert>> {
    let safe_file = deps.path_policy.to_safe_relative_path(relative_path)?;

    let stat = deps
        .filesystem
        .stat(ctx, codebase_root.to_path_buf(), safe_file.clone())
        .await?;
    if stat.kind != FileSystemEntryKind::File {
        return Ok(Vec::new());
    }

    let code = deps
        .filesystem
        .read_file_text(ctx, codebase_root.to_path_buf(), safe_file)
        .await?;

    let extension = file_extension_of(relative_path);
    let language = extension
        .as_deref()
        .map_or(Language::Text, Language::from_extension);

    let chunks = deps
        .splitter
        .split(
            ctx,
            code,
            language,
            SplitOptions {
                file_path: Some(relative_path.to_owned().into_boxed_str()),
            },
        )
        .await?;

    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<Box<str>> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
    let vectors = deps.embedding.embed_batch(ctx, texts.into()).await?;
    if vectors.len() != chunks.len() {
        return Err(ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            "embedding batch size mismatch",
            ErrorClass::NonRetriable,
        ));
    }

    let mut documents = Vec::with_capacity(chunks.len());
    for (chunk, vector) in chunks.into_iter().zip(vectors.into_iter()) {
        let chunk_language = chunk.language.unwrap_or(language);
        let chunk_id = derive_chunk_id(&ChunkIdInput::new(
            relative_path.to_owned().into_boxed_str(),
            chunk.span,
            chunk.content.clone(),
        ))
        .map_err(ErrorEnvelope::from)?;

        documents.push(VectorDocumentForInsert {
            id: chunk_id.into_inner(),
            vector: vector.into_vector(),
            content: chunk.content,
            metadata: VectorDocumentMetadata {
                relative_path: relative_path.to_owned().into_boxed_str(),
                language: Some(chunk_language),
                file_extension: extension.clone(),
                span: chunk.span,
                node_kind: None,
            },
        });
    }

    Ok(documents)
}

fn file_extension_of(path: &str) -> Option<Box<str>> {
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase().into_boxed_str())
}
