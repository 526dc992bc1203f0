//! Field/Status/User Mapper
//!
//! Pure translation of a canonical task through the configuration's mapping
//! tables. Each table has its own absent-key semantics:
//!
//! - status: identity (an unmapped status passes through unchanged)
//! - assignees: allow-list (an unmapped assignee is dropped, never passed
//!   through, so a source user id can never leak onto the target platform)
//! - custom fields: allow-list, same as assignees
//!
//! Empty user/field tables disable their filter entirely. Mapping only
//! translates identifiers supplied in configuration; it can never invent a
//! target-side reference.

use crate::config::SyncConfiguration;
use crate::task::CommonTask;

/// Apply the configuration's mapping tables to a canonical task.
pub fn apply_mappings(mut task: CommonTask, config: &SyncConfiguration) -> CommonTask {
    if let Some(mapped) = config.status_mapping.get(&task.status.name) {
        task.status.name = mapped.clone();
    }

    if !config.user_mapping.is_empty() {
        task.assignees = task
            .assignees
            .into_iter()
            .filter_map(|mut assignee| {
                config.user_mapping.get(&assignee.id).map(|target_id| {
                    assignee.id = target_id.clone();
                    assignee
                })
            })
            .collect();
    }

    if !config.field_mapping.is_empty() {
        task.custom_fields = task
            .custom_fields
            .into_iter()
            .filter_map(|mut field| {
                config.field_mapping.get(&field.id).map(|target_id| {
                    field.id = target_id.clone();
                    field
                })
            })
            .collect();
    }

    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlatformEndpoint, SyncConfiguration};
    use crate::platforms::Platform;
    use crate::task::{Assignee, CustomFieldValue};
    use serde_json::json;

    fn endpoint(platform: Platform) -> PlatformEndpoint {
        PlatformEndpoint {
            platform,
            token_env: "TOKEN".to_string(),
            workspace_id: None,
            space_id: None,
            folder_id: None,
            list_id: "l1".to_string(),
        }
    }

    fn config() -> SyncConfiguration {
        SyncConfiguration::new(
            "test",
            endpoint(Platform::ClickUp),
            endpoint(Platform::Monday),
        )
    }

    fn task_with_assignees(ids: &[&str]) -> CommonTask {
        let mut task = CommonTask::new("t1", "Task", Platform::ClickUp);
        task.assignees = ids
            .iter()
            .map(|id| Assignee {
                id: id.to_string(),
                name: format!("user-{}", id),
                email: None,
            })
            .collect();
        task
    }

    #[test]
    fn test_status_identity_when_unmapped() {
        let mut config = config();
        config.status_mapping.insert("Open".into(), "To Do".into());

        let mut task = CommonTask::new("t1", "Task", Platform::ClickUp);
        task.status.name = "in review".to_string();

        let mapped = apply_mappings(task, &config);
        assert_eq!(mapped.status.name, "in review");
    }

    #[test]
    fn test_status_translated_when_mapped() {
        let mut config = config();
        config.status_mapping.insert("Open".into(), "To Do".into());

        let mut task = CommonTask::new("t1", "Task", Platform::ClickUp);
        task.status.name = "Open".to_string();
        task.status.color = "#aabbcc".to_string();

        let mapped = apply_mappings(task, &config);
        assert_eq!(mapped.status.name, "To Do");
        // only the name translates
        assert_eq!(mapped.status.color, "#aabbcc");
    }

    #[test]
    fn test_assignee_allow_list() {
        let mut config = config();
        config.user_mapping.insert("u1".into(), "t1".into());

        let mapped = apply_mappings(task_with_assignees(&["u1", "u2"]), &config);
        let ids: Vec<&str> = mapped.assignees.iter().map(|a| a.id.as_str()).collect();
        // u2 has no entry and is dropped, not passed through
        assert_eq!(ids, vec!["t1"]);
        assert_eq!(mapped.assignees[0].name, "user-u1");
    }

    #[test]
    fn test_empty_user_mapping_passes_all() {
        let mapped = apply_mappings(task_with_assignees(&["u1", "u2"]), &config());
        assert_eq!(mapped.assignees.len(), 2);
        assert_eq!(mapped.assignees[0].id, "u1");
    }

    #[test]
    fn test_custom_field_allow_list() {
        let mut config = config();
        config.field_mapping.insert("src-f1".into(), "dst-f1".into());

        let mut task = CommonTask::new("t1", "Task", Platform::ClickUp);
        task.custom_fields = vec![
            CustomFieldValue {
                id: "src-f1".into(),
                name: "Effort".into(),
                value: json!(5),
            },
            CustomFieldValue {
                id: "src-f2".into(),
                name: "Notes".into(),
                value: json!("keep"),
            },
        ];

        let mapped = apply_mappings(task, &config);
        assert_eq!(mapped.custom_fields.len(), 1);
        assert_eq!(mapped.custom_fields[0].id, "dst-f1");
        assert_eq!(mapped.custom_fields[0].value, json!(5));
    }
}
