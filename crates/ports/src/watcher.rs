//! Filesystem watch boundary contract (§4.4).
//!
//! A watcher converts raw filesystem events into debounced, stability-checked
//! [`WatchEvent`]s and hands them to a caller-supplied callback; it has no
//! knowledge of `SyncController` or any other application-layer concept.

use crate::BoxFuture;
use crate::sync::SingleFileChangeAction;
use semantic_code_shared::{RequestContext, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// A single, already-debounced file change ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path relative to the watched codebase root.
    pub relative_path: Box<str>,
    /// What happened to the file.
    pub action: SingleFileChangeAction,
}

/// Callback invoked once per debounced, stability-confirmed event.
pub type WatchCallback = Arc<dyn Fn(WatchEvent) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Options controlling what a watcher observes.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Absolute codebase root to watch, recursively.
    pub codebase_root: PathBuf,
    /// Extensions to observe (lowercase, no leading dot); `None` means all.
    pub supported_extensions: Option<Vec<Box<str>>>,
    /// Ignore patterns applied before an event is considered.
    pub ignore_patterns: Vec<Box<str>>,
}

/// Boundary contract for realtime filesystem watching.
pub trait WatcherPort: Send + Sync {
    /// Start watching. Replaces any watch already started on this instance.
    fn start(
        &self,
        ctx: &RequestContext,
        options: WatcherOptions,
        on_event: WatchCallback,
    ) -> BoxFuture<'_, Result<()>>;

    /// Stop watching; cancels pending debounce timers. Idempotent.
    fn stop(&self) -> BoxFuture<'_, Result<()>>;

    /// Whether a watch is currently active.
    fn is_active(&self) -> bool;
}
