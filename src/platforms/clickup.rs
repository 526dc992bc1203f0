//! ClickUp Platform Adapter
//!
//! Wraps the ClickUp REST API v2. Task payloads are list-specific JSON; this
//! adapter parses them through typed wire structs and normalizes into the
//! Common Task Format.
//!
//! Transform loss: `from_common` keeps name, description, status, priority,
//! dates (as epoch milliseconds), assignee ids, tags, time estimate and
//! custom field values. Status/priority colors, comment history and the
//! source url do not survive egress.

use super::{classify_response, Container, Platform, PlatformAdapter, PlatformUser, TaskPage};
use crate::task::{
    normalize_date, to_epoch_millis, Assignee, CommonTask, CustomFieldDef, CustomFieldValue,
    TaskComment, TaskPriority, TaskStatus,
};
use crate::{Result, TaskBridgeError};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const BASE_URL: &str = "https://api.clickup.com/api/v2";

/// Per-request timeout for listing operations (can return large result sets)
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for single resource fetches
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create/update operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// ClickUp API client
pub struct ClickUpAdapter {
    client: Client,
    base_url: String,
}

// ---- wire structs (list-specific fields stay as Value) ----

#[derive(Debug, Clone, Deserialize)]
struct ClickUpTask {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<ClickUpStatus>,
    #[serde(default)]
    priority: Option<ClickUpPriority>,
    #[serde(default)]
    due_date: Option<Value>,
    #[serde(default)]
    start_date: Option<Value>,
    #[serde(default)]
    date_created: Option<Value>,
    #[serde(default)]
    assignees: Vec<ClickUpAssignee>,
    #[serde(default)]
    tags: Vec<ClickUpTag>,
    #[serde(default)]
    custom_fields: Vec<ClickUpCustomField>,
    #[serde(default)]
    custom_id: Option<String>,
    #[serde(default)]
    time_estimate: Option<i64>,
    #[serde(default)]
    time_spent: Option<i64>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClickUpStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClickUpPriority {
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClickUpAssignee {
    id: Value,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClickUpTag {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ClickUpCustomField {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(rename = "type", default)]
    field_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TasksResponse {
    #[serde(default)]
    tasks: Vec<Value>,
    #[serde(default)]
    last_page: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct UserResponse {
    user: UserBody,
}

#[derive(Debug, Clone, Deserialize)]
struct UserBody {
    id: Value,
    username: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TeamsResponse {
    #[serde(default)]
    teams: Vec<NamedResource>,
}

#[derive(Debug, Clone, Deserialize)]
struct SpacesResponse {
    #[serde(default)]
    spaces: Vec<NamedResource>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListsResponse {
    #[serde(default)]
    lists: Vec<NamedResource>,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedResource {
    id: Value,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CommentsResponse {
    #[serde(default)]
    comments: Vec<ClickUpComment>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClickUpComment {
    id: Value,
    #[serde(default)]
    comment_text: Option<String>,
    #[serde(default)]
    user: Option<CommentUser>,
    #[serde(default)]
    date: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct CommentUser {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldsResponse {
    #[serde(default)]
    fields: Vec<ClickUpCustomField>,
}

fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ClickUpAdapter {
    /// Create a new adapter authenticated with a personal or OAuth token.
    ///
    /// Returns an error if the HTTP client cannot be created. An invalid
    /// token surfaces as unauthorized on the first request.
    pub fn new(token: String) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&token)
            .map_err(|_| TaskBridgeError::Config("ClickUp token is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        timeout: Duration,
        action: &str,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "ClickUp request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .timeout(timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_response(Platform::ClickUp, action, response)
                .await
                .into());
        }

        Ok(response.json().await?)
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &Value,
        action: &str,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "ClickUp write request");

        let response = self
            .client
            .request(method, &url)
            .json(body)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_response(Platform::ClickUp, action, response)
                .await
                .into());
        }

        Ok(response.json().await?)
    }

    fn parse_task(&self, raw: &Value) -> Result<ClickUpTask> {
        serde_json::from_value(raw.clone())
            .map_err(|e| TaskBridgeError::Payload(format!("malformed ClickUp task: {}", e)))
    }
}

#[async_trait]
impl PlatformAdapter for ClickUpAdapter {
    fn platform(&self) -> Platform {
        Platform::ClickUp
    }

    async fn get_user(&self) -> Result<PlatformUser> {
        let body: UserResponse = self
            .get_json("user", &[], GET_TIMEOUT, "fetch user")
            .await?;
        Ok(PlatformUser {
            id: id_string(&body.user.id),
            name: body.user.username,
            email: body.user.email,
        })
    }

    async fn list_workspaces(&self) -> Result<Vec<Container>> {
        let body: TeamsResponse = self
            .get_json("team", &[], LIST_TIMEOUT, "fetch workspaces")
            .await?;
        Ok(body
            .teams
            .into_iter()
            .map(|t| Container {
                id: id_string(&t.id),
                name: t.name,
            })
            .collect())
    }

    async fn list_spaces(&self, workspace_id: &str) -> Result<Vec<Container>> {
        let path = format!("team/{}/space", workspace_id);
        let body: SpacesResponse = self
            .get_json(&path, &[("archived", "false")], LIST_TIMEOUT, "fetch spaces")
            .await?;
        Ok(body
            .spaces
            .into_iter()
            .map(|s| Container {
                id: id_string(&s.id),
                name: s.name,
            })
            .collect())
    }

    async fn list_lists(
        &self,
        folder_id: Option<&str>,
        space_id: Option<&str>,
    ) -> Result<Vec<Container>> {
        let path = match (folder_id, space_id) {
            (Some(folder), _) => format!("folder/{}/list", folder),
            (None, Some(space)) => format!("space/{}/list", space),
            (None, None) => {
                return Err(TaskBridgeError::Config(
                    "either a folder id or a space id is required to list ClickUp lists"
                        .to_string(),
                ))
            }
        };
        let body: ListsResponse = self
            .get_json(&path, &[("archived", "false")], LIST_TIMEOUT, "fetch lists")
            .await?;
        Ok(body
            .lists
            .into_iter()
            .map(|l| Container {
                id: id_string(&l.id),
                name: l.name,
            })
            .collect())
    }

    async fn list_tasks(&self, list_ref: &str, page: u32) -> Result<TaskPage> {
        let path = format!("list/{}/task", list_ref);
        let page_str = page.to_string();
        let query = [
            ("archived", "false"),
            ("page", page_str.as_str()),
            ("order_by", "created"),
            ("reverse", "false"),
            ("subtasks", "true"),
            ("include_closed", "true"),
        ];

        let body: TasksResponse = self
            .get_json(&path, &query, LIST_TIMEOUT, "fetch tasks")
            .await?;

        info!(
            list = %list_ref,
            page = page,
            count = body.tasks.len(),
            "Fetched ClickUp task page"
        );

        let has_more = match body.last_page {
            Some(last) => !last,
            None => !body.tasks.is_empty(),
        };

        Ok(TaskPage {
            tasks: body.tasks,
            has_more,
        })
    }

    async fn get_task(&self, task_id: &str) -> Result<Value> {
        let path = format!("task/{}", task_id);
        self.get_json(&path, &[], GET_TIMEOUT, "fetch task").await
    }

    async fn create_task(&self, list_ref: &str, data: &Value) -> Result<Value> {
        let path = format!("list/{}/task", list_ref);
        info!(list = %list_ref, "Creating ClickUp task");
        self.send_json(reqwest::Method::POST, &path, data, "create task")
            .await
    }

    async fn update_task(&self, task_id: &str, data: &Value) -> Result<Value> {
        let path = format!("task/{}", task_id);
        info!(task = %task_id, "Updating ClickUp task");
        self.send_json(reqwest::Method::PUT, &path, data, "update task")
            .await
    }

    async fn list_comments(&self, task_id: &str) -> Result<Vec<TaskComment>> {
        let path = format!("task/{}/comment", task_id);
        let body: CommentsResponse = self
            .get_json(&path, &[], LIST_TIMEOUT, "fetch comments")
            .await?;
        Ok(body
            .comments
            .into_iter()
            .map(|c| TaskComment {
                id: id_string(&c.id),
                text: c.comment_text.unwrap_or_default(),
                author: c.user.and_then(|u| u.username),
                created_at: c.date.as_ref().and_then(normalize_date),
            })
            .collect())
    }

    async fn create_comment(&self, task_id: &str, text: &str) -> Result<TaskComment> {
        let path = format!("task/{}/comment", task_id);
        let body = json!({ "comment_text": text });
        let created: Value = self
            .send_json(reqwest::Method::POST, &path, &body, "create comment")
            .await?;
        Ok(TaskComment {
            id: id_string(created.get("id").unwrap_or(&Value::Null)),
            text: text.to_string(),
            author: None,
            created_at: None,
        })
    }

    async fn list_custom_fields(&self, list_ref: &str) -> Result<Vec<CustomFieldDef>> {
        let path = format!("list/{}/field", list_ref);
        let body: FieldsResponse = self
            .get_json(&path, &[], LIST_TIMEOUT, "fetch custom fields")
            .await?;
        Ok(body
            .fields
            .into_iter()
            .map(|f| CustomFieldDef {
                name: f.name.unwrap_or_else(|| f.id.clone()),
                id: f.id,
                field_type: f.field_type,
            })
            .collect())
    }

    fn to_common(&self, raw: &Value) -> Result<CommonTask> {
        let task = self.parse_task(raw)?;

        let mut common = CommonTask::new(task.id, task.name, Platform::ClickUp);
        common.description = task.description.unwrap_or_default();

        if let Some(status) = task.status {
            common.status = TaskStatus {
                name: status.status.unwrap_or_else(|| "unknown".to_string()),
                color: status.color.unwrap_or_else(|| "#d3d3d3".to_string()),
            };
        }
        if let Some(priority) = task.priority {
            common.priority = TaskPriority {
                name: priority.priority,
                color: priority.color,
            };
        }

        common.due_date = task.due_date.as_ref().and_then(normalize_date);
        // ClickUp tasks without an explicit start date fall back to creation time
        common.start_date = task
            .start_date
            .as_ref()
            .and_then(normalize_date)
            .or_else(|| task.date_created.as_ref().and_then(normalize_date));

        common.assignees = task
            .assignees
            .into_iter()
            .map(|a| Assignee {
                id: id_string(&a.id),
                name: a.username.unwrap_or_default(),
                email: a.email,
            })
            .collect();

        common.tags = task.tags.into_iter().map(|t| t.name).collect();

        common.custom_fields = task
            .custom_fields
            .into_iter()
            .map(|f| CustomFieldValue {
                name: f.name.unwrap_or_else(|| f.id.clone()),
                id: f.id,
                value: f.value,
            })
            .collect();

        common.custom_id = task.custom_id;
        common.time_estimate = task.time_estimate;
        common.time_spent = task.time_spent;
        common.url = task.url;

        Ok(common)
    }

    fn from_common(&self, task: &CommonTask) -> Value {
        let mut data = serde_json::Map::new();
        data.insert("name".to_string(), json!(task.name));
        data.insert("description".to_string(), json!(task.description));
        data.insert("status".to_string(), json!(task.status.name));

        if let Some(ref priority) = task.priority.name {
            data.insert("priority".to_string(), json!(priority));
        }
        if let Some(ref due) = task.due_date {
            data.insert("due_date".to_string(), json!(to_epoch_millis(due)));
        }
        if let Some(ref start) = task.start_date {
            data.insert("start_date".to_string(), json!(to_epoch_millis(start)));
        }
        if !task.assignees.is_empty() {
            let ids: Vec<&str> = task.assignees.iter().map(|a| a.id.as_str()).collect();
            data.insert("assignees".to_string(), json!(ids));
        }
        if !task.tags.is_empty() {
            data.insert("tags".to_string(), json!(task.tags));
        }
        if let Some(estimate) = task.time_estimate {
            data.insert("time_estimate".to_string(), json!(estimate));
        }
        if !task.custom_fields.is_empty() {
            let fields: Vec<Value> = task
                .custom_fields
                .iter()
                .map(|f| json!({ "id": f.id, "value": f.value }))
                .collect();
            data.insert("custom_fields".to_string(), json!(fields));
        }

        Value::Object(data)
    }

    fn progress_percent(&self, status_name: &str) -> u8 {
        let status = status_name.to_lowercase();
        if ["done", "complete", "closed"].iter().any(|s| status.contains(s)) {
            100
        } else if ["progress", "working"].iter().any(|s| status.contains(s)) {
            50
        } else {
            0
        }
    }
}
