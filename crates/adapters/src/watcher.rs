//! `notify`-backed implementation of [`WatcherPort`] (§4.4).
//!
//! Bridges `notify`'s OS-level callback into an async dispatch loop that
//! debounces per `(kind, path)` with a 500ms window and waits for write
//! stability before handing a [`WatchEvent`] to the caller-supplied callback.
//! Has no knowledge of `SyncController` or any other application concept —
//! the adapters crate is not allowed to depend on `app`.

use crate::ignore::IgnoreMatcher;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcherTrait};
use semantic_code_ports::{
    BoxFuture, IgnoreMatchInput, IgnorePort, SingleFileChangeAction, WatchCallback, WatchEvent,
    WatcherOptions, WatcherPort,
};
use semantic_code_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);
const STABILITY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STABILITY_WINDOW: Duration = Duration::from_millis(1_000);
const STABILITY_MAX_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DebounceKind {
    Modified,
    Removed,
}

impl From<SingleFileChangeAction> for DebounceKind {
    fn from(action: SingleFileChangeAction) -> Self {
        match action {
            SingleFileChangeAction::Modified => Self::Modified,
            SingleFileChangeAction::Removed => Self::Removed,
        }
    }
}

type GenerationMap = Arc<Mutex<HashMap<(DebounceKind, PathBuf), u64>>>;

struct WatchHandle {
    /// Kept alive only so the OS watch stays registered; dropping it unwatches.
    _watcher: RecommendedWatcher,
    dispatch_task: tokio::task::JoinHandle<()>,
}

/// Realtime filesystem watcher backed by the `notify` crate.
#[derive(Default)]
pub struct NotifyWatcher {
    handle: Mutex<Option<WatchHandle>>,
}

impl NotifyWatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn stop_inner(&self) {
        let previous = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = previous {
            handle.dispatch_task.abort();
        }
    }
}

impl WatcherPort for NotifyWatcher {
    fn start(
        &self,
        ctx: &RequestContext,
        options: WatcherOptions,
        on_event: WatchCallback,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("watcher.start")?;
            self.stop_inner();

            let (tx, rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
            let mut watcher = RecommendedWatcher::new(
                move |res| {
                    let _ = tx.send(res);
                },
                Config::default(),
            )
            .map_err(|error| {
                watch_error("watcher_init_failed", "failed to create filesystem watcher", error)
            })?;

            watcher
                .watch(&options.codebase_root, RecursiveMode::Recursive)
                .map_err(|error| {
                    watch_error("watch_register_failed", "failed to register watch path", error)
                })?;

            let generations: GenerationMap = Arc::new(Mutex::new(HashMap::new()));

            let dispatch_task = tokio::spawn(dispatch_loop(
                rx,
                options.codebase_root,
                options.supported_extensions,
                options.ignore_patterns,
                generations,
                on_event,
            ));

            *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(WatchHandle {
                _watcher: watcher,
                dispatch_task,
            });

            Ok(())
        })
    }

    fn stop(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.stop_inner();
            Ok(())
        })
    }

    fn is_active(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    codebase_root: PathBuf,
    supported_extensions: Option<Vec<Box<str>>>,
    ignore_patterns: Vec<Box<str>>,
    generations: GenerationMap,
    on_event: WatchCallback,
) {
    while let Some(result) = rx.recv().await {
        let event = match result {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(error = %error, "watcher observed an error event");
                continue;
            }
        };
        let Some(action) = classify_event(&event.kind) else {
            continue;
        };

        for path in &event.paths {
            if action == SingleFileChangeAction::Modified && path.is_dir() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&codebase_root) else {
                continue;
            };
            let Some(relative_str) = relative.to_str() else {
                continue;
            };
            if !extension_allowed(relative, supported_extensions.as_deref()) {
                continue;
            }
            if IgnoreMatcher::new().is_ignored(&IgnoreMatchInput {
                ignore_patterns: ignore_patterns.clone(),
                relative_path: relative_str.into(),
            }) {
                continue;
            }

            let key = (DebounceKind::from(action), path.clone());
            let generation = {
                let mut guard = generations.lock().unwrap_or_else(PoisonError::into_inner);
                let next = guard.get(&key).copied().unwrap_or(0) + 1;
                guard.insert(key.clone(), next);
                next
            };

            let generations = Arc::clone(&generations);
            let on_event = Arc::clone(&on_event);
            let relative_path: Box<str> = relative_str.into();
            let absolute_path = path.clone();
            let debounce_key = key;

            tokio::spawn(async move {
                sleep(DEBOUNCE_WINDOW).await;
                {
                    let guard = generations.lock().unwrap_or_else(PoisonError::into_inner);
                    if guard.get(&debounce_key) != Some(&generation) {
                        return;
                    }
                }

                if action == SingleFileChangeAction::Modified
                    && !wait_for_stability(&absolute_path).await
                {
                    return;
                }

                {
                    let mut guard = generations.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.remove(&debounce_key);
                }

                if let Err(error) = (on_event)(WatchEvent { relative_path, action }).await {
                    tracing::warn!(
                        code = %error.code,
                        message = %error.message,
                        "watch event dispatch failed"
                    );
                }
            });
        }
    }
}

fn classify_event(kind: &EventKind) -> Option<SingleFileChangeAction> {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(SingleFileChangeAction::Modified),
        EventKind::Remove(_) => Some(SingleFileChangeAction::Removed),
        _ => None,
    }
}

fn extension_allowed(relative: &Path, supported_extensions: Option<&[Box<str>]>) -> bool {
    let Some(extensions) = supported_extensions else {
        return true;
    };
    let Some(ext) = relative.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

/// Polls file metadata until size and mtime hold steady for [`STABILITY_WINDOW`],
/// capped at [`STABILITY_MAX_WAIT`] so a file that never stops growing doesn't
/// pin a task forever. Returns `false` if the file vanished mid-wait — a later
/// Remove event will drive the actual dispatch in that case.
async fn wait_for_stability(path: &Path) -> bool {
    let start = tokio::time::Instant::now();
    let mut last: Option<(u64, std::time::SystemTime)> = None;
    let mut stable_since: Option<tokio::time::Instant> = None;

    loop {
        if start.elapsed() > STABILITY_MAX_WAIT {
            return last.is_some();
        }

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(_) => return false,
        };
        let current = (
            metadata.len(),
            metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        );

        match last {
            Some(previous) if previous == current => {
                let since = stable_since.get_or_insert_with(tokio::time::Instant::now);
                if since.elapsed() >= STABILITY_WINDOW {
                    return true;
                }
            }
            _ => stable_since = None,
        }

        last = Some(current);
        sleep(STABILITY_POLL_INTERVAL).await;
    }
}

fn watch_error(code: &'static str, message: &str, error: notify::Error) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("watcher", code),
        format!("{message}: {error}"),
        ErrorClass::NonRetriable,
    )
}
