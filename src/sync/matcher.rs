//! Task Matcher
//!
//! Decides whether a mapped source task corresponds to an existing target
//! task. Targets are scanned in listing order and the first match wins; an
//! unsupported strategy degrades to "no match" (the engine then creates)
//! rather than failing the task.

use crate::config::MatchStrategy;
use crate::task::CommonTask;
use tracing::warn;

/// Custom field used to carry the source task id across platforms when
/// matching by external id
pub const SYNC_EXTERNAL_ID_FIELD: &str = "sync_external_id";

/// A target-side task, paired with the raw id used for update/comment calls
#[derive(Debug, Clone)]
pub struct TargetEntry {
    pub id: String,
    pub task: CommonTask,
}

/// Find the target task corresponding to `source`, if any.
pub fn find_match<'a>(
    source: &CommonTask,
    strategy: &MatchStrategy,
    targets: &'a [TargetEntry],
) -> Option<&'a TargetEntry> {
    match strategy {
        MatchStrategy::Name => targets.iter().find(|entry| entry.task.name == source.name),
        MatchStrategy::ExternalId => targets.iter().find(|entry| {
            entry
                .task
                .custom_field(SYNC_EXTERNAL_ID_FIELD)
                .map(|field| field.value.as_str() == Some(source.id.as_str()))
                .unwrap_or(false)
        }),
        MatchStrategy::CustomId => match source.custom_id.as_deref() {
            // only meaningful when both platforms expose a native custom id
            Some(custom_id) => targets
                .iter()
                .find(|entry| entry.task.custom_id.as_deref() == Some(custom_id)),
            None => None,
        },
        MatchStrategy::Unrecognized(raw) => {
            warn!(match_by = %raw, "Unrecognized match strategy, treating as no match");
            None
        }
    }
}
