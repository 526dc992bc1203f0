//! Sync Engine
//!
//! Orchestrates one end-to-end run for a configuration: fetch every source
//! task, normalize, map, match against the target list, create or update,
//! optionally propagate comments, and aggregate the outcome into a run log.
//!
//! The engine is a pure orchestrator over its two adapters: it performs no
//! credential resolution, no persistence and no retries. Per-task failures
//! are isolated and counted; only a failure of the initial source fetch
//! aborts the run.

use crate::config::{ConflictResolution, MatchStrategy, SyncConfiguration};
use crate::platforms::PlatformAdapter;
use crate::sync::mapper::apply_mappings;
use crate::sync::matcher::{find_match, TargetEntry, SYNC_EXTERNAL_ID_FIELD};
use crate::sync::run_log::{SyncRunLog, SyncSummary};
use crate::task::CustomFieldValue;
use crate::{Result, TaskBridgeError};
use chrono::Utc;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Read-through cache of the target task list.
///
/// The target list is fetched once per run, on first use inside the per-task
/// guard (so a target fetch failure stays a per-task failure, as it would be
/// when re-fetching per task). Created tasks are appended so that later
/// source tasks can match them, preserving the re-fetch semantics.
struct TargetCache {
    entries: Option<Vec<TargetEntry>>,
}

impl TargetCache {
    fn new() -> Self {
        Self { entries: None }
    }

    async fn entries(
        &mut self,
        adapter: &dyn PlatformAdapter,
        list_ref: &str,
    ) -> Result<&[TargetEntry]> {
        if self.entries.is_none() {
            let mut collected = Vec::new();
            let mut page = 0;
            loop {
                let batch = adapter.list_tasks(list_ref, page).await?;
                if batch.tasks.is_empty() {
                    break;
                }
                for raw in &batch.tasks {
                    let task = adapter.to_common(raw)?;
                    collected.push(TargetEntry {
                        id: task.id.clone(),
                        task,
                    });
                }
                if !batch.has_more {
                    break;
                }
                page += 1;
            }
            debug!(count = collected.len(), "Cached target task list");
            self.entries = Some(collected);
        }
        Ok(self.entries.as_deref().unwrap_or_default())
    }

    fn push(&mut self, entry: TargetEntry) {
        if let Some(entries) = &mut self.entries {
            entries.push(entry);
        }
    }
}

/// What happened to a single source task
enum TaskOutcome {
    Created { target_id: String },
    Updated { target_id: String },
    /// Matched under `target_wins`: every per-task side effect is skipped
    Skipped,
}

/// Cross-platform synchronization engine.
///
/// Holds the pre-authenticated source and target adapters for the lifetime
/// of its runs; the pair is selected once, at configuration-load time.
pub struct SyncEngine {
    source: Box<dyn PlatformAdapter>,
    target: Box<dyn PlatformAdapter>,
    deadline: Option<Duration>,
}

impl SyncEngine {
    pub fn new(source: Box<dyn PlatformAdapter>, target: Box<dyn PlatformAdapter>) -> Self {
        Self {
            source,
            target,
            deadline: None,
        }
    }

    /// Bound the run's wall-clock time. When the deadline passes between
    /// tasks the run transitions to the terminal `cancelled` status instead
    /// of lingering in `running` forever.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Execute one sync run.
    ///
    /// Returns the completed (or cancelled) run log. A failure to fetch the
    /// source list at all marks the log failed and surfaces as
    /// [`TaskBridgeError::RunAborted`], carrying the log for the caller to
    /// persist or display.
    pub async fn run(&self, config: &mut SyncConfiguration) -> Result<SyncRunLog> {
        let mut log = SyncRunLog::new(&config.name);
        log.mark_running();
        let started = Instant::now();

        info!(
            configuration = %config.name,
            source = %self.source.platform(),
            target = %self.target.platform(),
            "Starting sync run"
        );

        let source_tasks = match self.fetch_all_source_tasks(&config.source.list_id).await {
            Ok(tasks) => tasks,
            Err(e) => {
                let message = e.to_string();
                let kind = match &e {
                    TaskBridgeError::Platform(p) => Some(p.kind),
                    _ => None,
                };
                error!(configuration = %config.name, error = %message, "Source fetch failed, aborting run");
                log.mark_failed(message.clone(), Vec::new());
                return Err(TaskBridgeError::RunAborted {
                    message,
                    kind,
                    log: Box::new(log),
                });
            }
        };

        let total = source_tasks.len() as u32;
        let strategy = config.match_strategy();
        let mut targets = TargetCache::new();

        for raw in &source_tasks {
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    warn!(
                        configuration = %config.name,
                        synced = log.tasks_synced,
                        total = total,
                        "Deadline exceeded, cancelling run"
                    );
                    log.mark_cancelled();
                    return Ok(log);
                }
            }

            match self.sync_one(raw, config, &strategy, &mut targets).await {
                Ok(TaskOutcome::Created { target_id }) => {
                    debug!(target_task = %target_id, "Created target task");
                    log.increment_tasks_created();
                }
                Ok(TaskOutcome::Updated { target_id }) => {
                    debug!(target_task = %target_id, "Updated target task");
                    log.increment_tasks_updated();
                }
                Ok(TaskOutcome::Skipped) => {
                    debug!(task_id = %raw_task_id(raw), "Matched task skipped (target wins)");
                }
                Err(e) => {
                    log.increment_tasks_failed();
                    error!(
                        configuration = %config.name,
                        task_id = %raw_task_id(raw),
                        error = %e,
                        "Task sync failed"
                    );
                }
            }
        }

        let summary = SyncSummary {
            created: log.tasks_created,
            updated: log.tasks_updated,
            failed: log.tasks_failed,
            total,
            source_platform: self.source.platform(),
            target_platform: self.target.platform(),
        };
        info!(
            configuration = %config.name,
            created = summary.created,
            updated = summary.updated,
            failed = summary.failed,
            total = summary.total,
            "Sync run complete"
        );
        log.mark_completed(summary);

        config.last_sync_at = Some(Utc::now());
        if config.is_scheduled() {
            config.calculate_next_sync_time();
        }

        Ok(log)
    }

    /// Accumulate every source task page in memory. Acceptable for typical
    /// list sizes; very large lists are a documented scaling limit.
    async fn fetch_all_source_tasks(&self, list_ref: &str) -> Result<Vec<Value>> {
        let mut tasks = Vec::new();
        let mut page = 0;
        loop {
            let batch = self.source.list_tasks(list_ref, page).await?;
            if batch.tasks.is_empty() {
                break;
            }
            tasks.extend(batch.tasks);
            if !batch.has_more {
                break;
            }
            page += 1;
        }
        info!(list = %list_ref, count = tasks.len(), "Fetched source tasks");
        Ok(tasks)
    }

    async fn sync_one(
        &self,
        raw: &Value,
        config: &SyncConfiguration,
        strategy: &MatchStrategy,
        targets: &mut TargetCache,
    ) -> Result<TaskOutcome> {
        let common = self.source.to_common(raw)?;
        let source_id = common.id.clone();

        let mut mapped = apply_mappings(common, config);
        if !config.sync_custom_fields {
            mapped.custom_fields.clear();
        }

        let entries = targets
            .entries(self.target.as_ref(), &config.target.list_id)
            .await?;
        let matched = find_match(&mapped, strategy, entries).map(|entry| entry.id.clone());

        let outcome = match matched {
            Some(target_id) => {
                if config.conflict_resolution == ConflictResolution::TargetWins {
                    return Ok(TaskOutcome::Skipped);
                }
                let data = self.target.from_common(&mapped);
                self.target.update_task(&target_id, &data).await?;
                TaskOutcome::Updated { target_id }
            }
            None => {
                if *strategy == MatchStrategy::ExternalId {
                    // stamp the source id so future runs can match this task
                    mapped.custom_fields.push(CustomFieldValue {
                        id: SYNC_EXTERNAL_ID_FIELD.to_string(),
                        name: SYNC_EXTERNAL_ID_FIELD.to_string(),
                        value: json!(source_id),
                    });
                }
                let data = self.target.from_common(&mapped);
                let created = self
                    .target
                    .create_task(&config.target.list_id, &data)
                    .await?;
                let target_id = match raw_id(&created) {
                    Some(id) => id,
                    None => {
                        return Err(TaskBridgeError::Payload(
                            "create response carried no task id".to_string(),
                        ))
                    }
                };

                let mut cached = mapped.clone();
                cached.id = target_id.clone();
                targets.push(TargetEntry {
                    id: target_id.clone(),
                    task: cached,
                });
                TaskOutcome::Created { target_id }
            }
        };

        let target_id = match &outcome {
            TaskOutcome::Created { target_id } | TaskOutcome::Updated { target_id } => target_id,
            TaskOutcome::Skipped => unreachable!("skip returns early"),
        };

        if config.sync_comments {
            if let Err(e) = self.propagate_comments(&source_id, target_id).await {
                warn!(
                    source_task = %source_id,
                    target_task = %target_id,
                    error = %e,
                    "Failed to sync comments"
                );
            }
        }

        if config.sync_attachments {
            // Cross-platform binary transfer is out of scope
            debug!(source_task = %source_id, "Attachment sync requested but not supported");
        }

        Ok(outcome)
    }

    /// Copy every source comment onto the target task. Best-effort: the
    /// caller logs failures without failing the task.
    async fn propagate_comments(&self, source_id: &str, target_id: &str) -> Result<()> {
        let comments = self.source.list_comments(source_id).await?;
        for comment in comments {
            if comment.text.is_empty() {
                continue;
            }
            self.target.create_comment(target_id, &comment.text).await?;
        }
        Ok(())
    }
}

/// Best-effort id extraction from an arbitrary raw payload, for log context
fn raw_task_id(raw: &Value) -> String {
    raw_id(raw).unwrap_or_else(|| "unknown".to_string())
}

fn raw_id(raw: &Value) -> Option<String> {
    match raw.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
