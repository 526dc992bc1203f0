//! Common Task Format
//!
//! The canonical, platform-neutral task representation used as the pivot for
//! all transformations. Adapters normalize their wire payloads into this shape
//! on ingress and render it back to platform-specific data on egress. Instances
//! are transient: produced per task per run, never persisted outside the run
//! log summary.

use crate::platforms::Platform;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Task status with the platform's display color
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub name: String,
    pub color: String,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            color: "#d3d3d3".to_string(),
        }
    }
}

/// Task priority; not every platform (or task) has one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPriority {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// A person assigned to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A custom field value attached to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// The canonical task shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonTask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,
    /// Platform-native custom id, present only where the platform exposes one
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Milliseconds, as both platforms report durations
    #[serde(default)]
    pub time_estimate: Option<i64>,
    #[serde(default)]
    pub time_spent: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    pub platform: Platform,
}

impl CommonTask {
    /// Create a task with the required fields; everything else defaults empty.
    pub fn new(id: impl Into<String>, name: impl Into<String>, platform: Platform) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            due_date: None,
            start_date: None,
            assignees: Vec::new(),
            tags: Vec::new(),
            custom_fields: Vec::new(),
            custom_id: None,
            time_estimate: None,
            time_spent: None,
            url: None,
            platform,
        }
    }

    /// Find a custom field by name
    pub fn custom_field(&self, name: &str) -> Option<&CustomFieldValue> {
        self.custom_fields.iter().find(|f| f.name == name)
    }
}

/// A comment on a task, in canonical shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A custom field definition on a list/board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub field_type: Option<String>,
}

/// Normalize a platform date value to UTC.
///
/// Platforms disagree on date encoding: ClickUp sends epoch milliseconds
/// (usually as a string), Monday sends `YYYY-MM-DD` text, and both sometimes
/// send full RFC 3339 timestamps. Anything unparsable normalizes to None,
/// never an error.
pub fn normalize_date(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
    match raw {
        serde_json::Value::Number(n) => n.as_i64().and_then(from_epoch_millis),
        serde_json::Value::String(s) => normalize_date_str(s),
        _ => None,
    }
}

/// Normalize a date string to UTC; see [`normalize_date`].
pub fn normalize_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(millis) = s.parse::<i64>() {
        return from_epoch_millis(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|ndt| Utc.from_utc_datetime(&ndt));
    }
    None
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Render a normalized date as epoch milliseconds (ClickUp's native encoding)
pub fn to_epoch_millis(date: &DateTime<Utc>) -> i64 {
    date.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_epoch_millis_string() {
        let dt = normalize_date(&json!("1735689600000")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_normalize_epoch_millis_number() {
        let dt = normalize_date(&json!(1735689600000i64)).unwrap();
        assert_eq!(to_epoch_millis(&dt), 1735689600000);
    }

    #[test]
    fn test_normalize_plain_date() {
        let dt = normalize_date(&json!("2025-06-15")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-06-15T00:00:00+00:00");
    }

    #[test]
    fn test_normalize_rfc3339() {
        let dt = normalize_date(&json!("2025-06-15T08:30:00+02:00")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-06-15T06:30:00+00:00");
    }

    #[test]
    fn test_unparsable_dates_are_absent() {
        assert!(normalize_date(&json!("next tuesday")).is_none());
        assert!(normalize_date(&json!("")).is_none());
        assert!(normalize_date(&json!(null)).is_none());
        assert!(normalize_date(&json!({"date": "2025-01-01"})).is_none());
    }

    #[test]
    fn test_common_task_defaults() {
        let task = CommonTask::new("t1", "Write report", Platform::ClickUp);
        assert_eq!(task.status.name, "unknown");
        assert!(task.assignees.is_empty());
        assert!(task.custom_field("sync_external_id").is_none());
    }

    #[test]
    fn test_custom_field_lookup() {
        let mut task = CommonTask::new("t1", "Write report", Platform::ClickUp);
        task.custom_fields.push(CustomFieldValue {
            id: "f1".to_string(),
            name: "sync_external_id".to_string(),
            value: json!("src-9"),
        });
        assert_eq!(
            task.custom_field("sync_external_id").unwrap().value,
            json!("src-9")
        );
    }
}
