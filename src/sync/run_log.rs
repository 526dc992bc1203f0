//! Sync Run Log
//!
//! Append-only record of one engine invocation: lifecycle status, per-task
//! counters, and either a completion summary or failure detail. The owning
//! engine is the sole writer for the lifetime of its run; once a run reaches
//! a terminal status the log never changes again.

use crate::platforms::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a run. Transitions are strictly forward-only:
/// pending -> running -> one of {completed, failed, cancelled}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Deadline-based termination; not part of the original lifecycle but
    /// closes the "aborted run stays running forever" gap
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// One task that failed during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task_id: String,
    pub error: String,
}

/// Failure detail, present only on failed runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(default)]
    pub task_errors: Vec<TaskFailure>,
}

/// Completion summary, present only on completed runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub created: u32,
    pub updated: u32,
    pub failed: u32,
    pub total: u32,
    pub source_platform: Platform,
    pub target_platform: Platform,
}

/// Record of one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRunLog {
    pub id: Uuid,
    /// Name of the owning configuration
    pub configuration: String,
    pub status: RunStatus,
    pub tasks_synced: u32,
    pub tasks_created: u32,
    pub tasks_updated: u32,
    pub tasks_failed: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_details: Option<ErrorDetails>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sync_summary: Option<SyncSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_seconds: Option<i64>,
}

impl SyncRunLog {
    /// Create a pending run for a configuration
    pub fn new(configuration: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            configuration: configuration.into(),
            status: RunStatus::Pending,
            tasks_synced: 0,
            tasks_created: 0,
            tasks_updated: 0,
            tasks_failed: 0,
            error_details: None,
            sync_summary: None,
            started_at: None,
            completed_at: None,
            duration_seconds: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn mark_running(&mut self) {
        if self.status != RunStatus::Pending {
            return;
        }
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, summary: SyncSummary) {
        if self.status != RunStatus::Running {
            return;
        }
        self.status = RunStatus::Completed;
        self.sync_summary = Some(summary);
        self.finish();
    }

    pub fn mark_failed(&mut self, message: impl Into<String>, task_errors: Vec<TaskFailure>) {
        if self.is_terminal() {
            return;
        }
        self.status = RunStatus::Failed;
        self.error_details = Some(ErrorDetails {
            message: message.into(),
            task_errors,
        });
        self.finish();
    }

    pub fn mark_cancelled(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = RunStatus::Cancelled;
        self.finish();
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_seconds = self
            .started_at
            .map(|started| (now - started).num_seconds());
    }

    pub fn increment_tasks_created(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.tasks_created += 1;
        self.tasks_synced += 1;
    }

    pub fn increment_tasks_updated(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.tasks_updated += 1;
        self.tasks_synced += 1;
    }

    pub fn increment_tasks_failed(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.tasks_failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_forward_only() {
        let mut log = SyncRunLog::new("pairing");
        assert_eq!(log.status, RunStatus::Pending);

        log.mark_running();
        assert_eq!(log.status, RunStatus::Running);
        assert!(log.started_at.is_some());

        log.mark_completed(SyncSummary {
            created: 1,
            updated: 0,
            failed: 0,
            total: 1,
            source_platform: Platform::ClickUp,
            target_platform: Platform::Monday,
        });
        assert_eq!(log.status, RunStatus::Completed);
        assert!(log.completed_at.is_some());
        assert!(log.duration_seconds.is_some());

        // terminal state never changes
        log.mark_failed("late failure", vec![]);
        assert_eq!(log.status, RunStatus::Completed);
        assert!(log.error_details.is_none());
    }

    #[test]
    fn test_cannot_complete_without_running() {
        let mut log = SyncRunLog::new("pairing");
        log.mark_completed(SyncSummary {
            created: 0,
            updated: 0,
            failed: 0,
            total: 0,
            source_platform: Platform::ClickUp,
            target_platform: Platform::ClickUp,
        });
        // pending -> completed is not a legal transition
        assert_eq!(log.status, RunStatus::Pending);
    }

    #[test]
    fn test_failed_from_pending_or_running() {
        let mut log = SyncRunLog::new("pairing");
        log.mark_running();
        log.mark_failed("source fetch failed", vec![]);
        assert_eq!(log.status, RunStatus::Failed);
        assert_eq!(
            log.error_details.as_ref().unwrap().message,
            "source fetch failed"
        );
    }

    #[test]
    fn test_synced_tracks_created_plus_updated() {
        let mut log = SyncRunLog::new("pairing");
        log.mark_running();
        log.increment_tasks_created();
        log.increment_tasks_created();
        log.increment_tasks_updated();
        log.increment_tasks_failed();

        assert_eq!(log.tasks_created, 2);
        assert_eq!(log.tasks_updated, 1);
        assert_eq!(log.tasks_failed, 1);
        assert_eq!(log.tasks_synced, log.tasks_created + log.tasks_updated);
    }

    #[test]
    fn test_counters_frozen_after_terminal() {
        let mut log = SyncRunLog::new("pairing");
        log.mark_running();
        log.mark_cancelled();
        log.increment_tasks_created();
        assert_eq!(log.tasks_created, 0);
        assert_eq!(log.tasks_synced, 0);
    }
}
