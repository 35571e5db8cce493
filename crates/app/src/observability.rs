//! Observability (§4.9): health checks over the state the rest of the
//! sync/search pipeline already tracks.
//!
//! The `AuditEntry` ring and `SyncCounters` described in §4.9 are not
//! duplicated here — [`crate::sync_controller::SyncController`] already
//! owns them per codebase and exposes `audit_log`/`counters`/`status`. This
//! module supplies the one piece nothing else owns: turning a snapshot of
//! per-codebase and process-wide signals into a structured health report.

use semantic_code_domain::IndexStatus;

const CODEBASE_PENDING_OPS_WARN: usize = 10;
const GLOBAL_CACHE_COUNT_WARN: usize = 50;
const GLOBAL_PENDING_WARN: usize = 20;

/// Snapshot of a single codebase's health-relevant state, assembled by the
/// caller from `SyncController`, the `Watcher` adapter, and the file-sync
/// adapter's mtime cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodebaseHealthInput {
    pub codebase_root_exists: bool,
    pub index_status: IndexStatus,
    pub synchronizer_present: bool,
    pub mtime_cache_size: usize,
    pub pending_ops: usize,
}

/// Snapshot of process-wide health-relevant state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHealthInput {
    pub cache_entry_count: usize,
    pub total_pending_ops: usize,
}

/// Structured health report: `issues` are hard problems, `warnings` are
/// soft/threshold-based signals worth surfacing but not blocking on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub issues: Vec<Box<str>>,
    pub warnings: Vec<Box<str>>,
}

impl HealthReport {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    fn issue(&mut self, message: impl Into<Box<str>>) {
        self.issues.push(message.into());
    }

    fn warn(&mut self, message: impl Into<Box<str>>) {
        self.warnings.push(message.into());
    }
}

/// Per-codebase health check per §4.9: path exists, index exists,
/// synchronizer present, mtime cache non-empty (warn if empty), pending ops
/// below threshold (warn if > 10).
#[must_use]
pub fn codebase_health_check(input: &CodebaseHealthInput) -> HealthReport {
    let mut report = HealthReport::default();

    if !input.codebase_root_exists {
        report.issue("codebase root does not exist on disk");
    }
    if matches!(input.index_status, IndexStatus::NotIndexed) {
        report.issue("codebase is not indexed");
    }
    if let IndexStatus::Failed { error } = &input.index_status {
        report.issue(format!("codebase index is in a failed state: {}", error.code));
    }
    if !input.synchronizer_present {
        report.issue("no file synchronizer registered for this codebase");
    }
    if input.mtime_cache_size == 0 {
        report.warn("mtime cache is empty");
    }
    if input.pending_ops > CODEBASE_PENDING_OPS_WARN {
        report.warn(format!(
            "{} pending sync operations exceeds the warning threshold of {CODEBASE_PENDING_OPS_WARN}",
            input.pending_ops
        ));
    }

    report
}

/// Process-wide health check per §4.9: cache count and total pending ops
/// below their warning thresholds.
#[must_use]
pub fn global_health_check(input: &GlobalHealthInput) -> HealthReport {
    let mut report = HealthReport::default();

    if input.cache_entry_count > GLOBAL_CACHE_COUNT_WARN {
        report.warn(format!(
            "{} cached entries exceeds the warning threshold of {GLOBAL_CACHE_COUNT_WARN}",
            input.cache_entry_count
        ));
    }
    if input.total_pending_ops > GLOBAL_PENDING_WARN {
        report.warn(format!(
            "{} total pending operations exceeds the warning threshold of {GLOBAL_PENDING_WARN}",
            input.total_pending_ops
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_input() -> CodebaseHealthInput {
        CodebaseHealthInput {
            codebase_root_exists: true,
            index_status: IndexStatus::Indexed,
            synchronizer_present: true,
            mtime_cache_size: 42,
            pending_ops: 0,
        }
    }

    #[test]
    fn healthy_codebase_has_no_issues_or_warnings() {
        let report = codebase_health_check(&healthy_input());
        assert!(report.is_healthy());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_root_and_not_indexed_are_issues() {
        let input = CodebaseHealthInput {
            codebase_root_exists: false,
            index_status: IndexStatus::NotIndexed,
            synchronizer_present: false,
            ..healthy_input()
        };
        let report = codebase_health_check(&input);
        assert!(!report.is_healthy());
        assert_eq!(report.issues.len(), 3);
    }

    #[test]
    fn empty_mtime_cache_and_high_pending_ops_warn_only() {
        let input = CodebaseHealthInput {
            mtime_cache_size: 0,
            pending_ops: CODEBASE_PENDING_OPS_WARN + 1,
            ..healthy_input()
        };
        let report = codebase_health_check(&input);
        assert!(report.is_healthy());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn pending_ops_at_exactly_the_threshold_does_not_warn() {
        let input = CodebaseHealthInput {
            pending_ops: CODEBASE_PENDING_OPS_WARN,
            ..healthy_input()
        };
        let report = codebase_health_check(&input);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn global_thresholds_warn_when_exceeded() {
        let report = global_health_check(&GlobalHealthInput {
            cache_entry_count: GLOBAL_CACHE_COUNT_WARN + 1,
            total_pending_ops: GLOBAL_PENDING_WARN + 1,
        });
        assert!(report.is_healthy());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn global_thresholds_at_limit_do_not_warn() {
        let report = global_health_check(&GlobalHealthInput {
            cache_entry_count: GLOBAL_CACHE_COUNT_WARN,
            total_pending_ops: GLOBAL_PENDING_WARN,
        });
        assert!(report.warnings.is_empty());
    }
}
