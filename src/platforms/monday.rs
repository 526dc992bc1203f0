//! Monday.com Platform Adapter
//!
//! Wraps the Monday GraphQL API (v2). Monday has no space/folder hierarchy:
//! boards stand in for workspaces and lists, groups stand in for spaces, items
//! are tasks, updates are comments and columns are custom fields.
//!
//! Transform loss: `from_common` keeps the item name and renders custom field
//! values as `column_values` keyed by target column id (board columns are the
//! only writable surface, so status/dates/people egress only through a
//! configured field mapping). Descriptions, tags and priorities do not survive
//! egress. Ingress is richer: status, date, people and tag columns are
//! recognized by column type.

use super::{classify_response, Container, Platform, PlatformAdapter, PlatformUser, TaskPage};
use crate::task::{
    normalize_date_str, Assignee, CommonTask, CustomFieldDef, CustomFieldValue, TaskComment,
    TaskStatus,
};
use crate::error::{PlatformRequestError, RequestErrorKind};
use crate::{Result, TaskBridgeError};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const BASE_URL: &str = "https://api.monday.com/v2";
const API_VERSION: &str = "2023-10";

/// Per-request timeout for queries (item listings can be large)
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for mutations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// Monday GraphQL API client
pub struct MondayAdapter {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphQLResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Clone, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MondayItem {
    id: Value,
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    column_values: Vec<MondayColumnValue>,
}

#[derive(Debug, Clone, Deserialize)]
struct MondayColumnValue {
    id: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    column: Option<MondayColumn>,
}

#[derive(Debug, Clone, Deserialize)]
struct MondayColumn {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "type", default)]
    column_type: Option<String>,
}

fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escape a string for embedding in a GraphQL document
fn escape(text: &str) -> String {
    text.chars()
        .flat_map(|c| match c {
            '"' => vec!['\\', '"'],
            '\\' => vec!['\\', '\\'],
            '\n' => vec!['\\', 'n'],
            '\r' => vec![],
            other => vec![other],
        })
        .collect()
}

/// Parse a JSON blob a column value carries (people, status color, tags)
fn parse_value_blob(raw: &Option<String>) -> Option<Value> {
    raw.as_ref().and_then(|s| serde_json::from_str(s).ok())
}

impl MondayAdapter {
    /// Create a new adapter authenticated with an API token.
    ///
    /// Returns an error if the HTTP client cannot be created. An invalid
    /// token surfaces as unauthorized on the first request.
    pub fn new(token: String) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&token)
            .map_err(|_| TaskBridgeError::Config("Monday token is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert("API-Version", header::HeaderValue::from_static(API_VERSION));

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

    /// Execute a GraphQL document and return the `data` payload.
    ///
    /// GraphQL-level errors come back with HTTP 200; they classify as generic
    /// request failures with the joined messages.
    async fn graphql(&self, document: &str, timeout: Duration, action: &str) -> Result<Value> {
        debug!(action = action, "Monday GraphQL request");

        let response = self
            .client
            .post(&self.base_url)
            .json(&json!({ "query": document }))
            .timeout(timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_response(Platform::Monday, action, response)
                .await
                .into());
        }

        let body: GraphQLResponse = response.json().await?;

        if let Some(errors) = body.errors {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PlatformRequestError::new(
                Platform::Monday,
                RequestErrorKind::Generic,
                format!("failed to {}: GraphQL error: {}", action, joined),
            )
            .into());
        }

        body.data.ok_or_else(|| {
            PlatformRequestError::new(
                Platform::Monday,
                RequestErrorKind::Generic,
                format!("failed to {}: no data in GraphQL response", action),
            )
            .into()
        })
    }

    fn parse_item(&self, raw: &Value) -> Result<MondayItem> {
        serde_json::from_value(raw.clone())
            .map_err(|e| TaskBridgeError::Payload(format!("malformed Monday item: {}", e)))
    }

    async fn set_column_values(&self, item_id: &str, column_values: &Value) -> Result<()> {
        if let Some(map) = column_values.as_object() {
            for (column_id, value) in map {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let value_json = serde_json::to_string(&json!(text))?;
                let mutation = format!(
                    r#"mutation {{ change_column_value(item_id: {}, column_id: "{}", value: "{}") {{ id }} }}"#,
                    item_id,
                    escape(column_id),
                    escape(&value_json)
                );
                self.graphql(&mutation, WRITE_TIMEOUT, "change column value")
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for MondayAdapter {
    fn platform(&self) -> Platform {
        Platform::Monday
    }

    async fn get_user(&self) -> Result<PlatformUser> {
        let data = self
            .graphql("query { me { id name email } }", QUERY_TIMEOUT, "fetch user")
            .await?;
        let me = &data["me"];
        Ok(PlatformUser {
            id: id_string(&me["id"]),
            name: me["name"].as_str().unwrap_or_default().to_string(),
            email: me["email"].as_str().map(String::from),
        })
    }

    async fn list_workspaces(&self) -> Result<Vec<Container>> {
        let data = self
            .graphql(
                "query { boards { id name } }",
                QUERY_TIMEOUT,
                "fetch boards",
            )
            .await?;
        let boards = data["boards"].as_array().cloned().unwrap_or_default();
        Ok(boards
            .iter()
            .map(|b| Container {
                id: id_string(&b["id"]),
                name: b["name"].as_str().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn list_spaces(&self, workspace_id: &str) -> Result<Vec<Container>> {
        // Groups within a board are the closest Monday analogue of spaces
        let query = format!(
            "query {{ boards(ids: [{}]) {{ groups {{ id title }} }} }}",
            workspace_id
        );
        let data = self.graphql(&query, QUERY_TIMEOUT, "fetch groups").await?;
        let groups = data["boards"][0]["groups"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        Ok(groups
            .iter()
            .map(|g| Container {
                id: id_string(&g["id"]),
                name: g["title"].as_str().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn list_lists(
        &self,
        _folder_id: Option<&str>,
        _space_id: Option<&str>,
    ) -> Result<Vec<Container>> {
        // A Monday "list" is a board
        self.list_workspaces().await
    }

    async fn list_tasks(&self, list_ref: &str, page: u32) -> Result<TaskPage> {
        // The items query returns the whole board in one response; pages past
        // the first are empty by construction.
        if page > 0 {
            return Ok(TaskPage::default());
        }

        let query = format!(
            r#"query {{
                boards(ids: [{}]) {{
                    items {{
                        id
                        name
                        url
                        column_values {{ id text value column {{ title type }} }}
                        group {{ id title }}
                    }}
                }}
            }}"#,
            list_ref
        );

        let data = self.graphql(&query, QUERY_TIMEOUT, "fetch items").await?;
        let tasks = data["boards"][0]["items"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        info!(board = %list_ref, count = tasks.len(), "Fetched Monday items");

        Ok(TaskPage {
            tasks,
            has_more: false,
        })
    }

    async fn get_task(&self, task_id: &str) -> Result<Value> {
        let query = format!(
            r#"query {{
                items(ids: [{}]) {{
                    id
                    name
                    url
                    column_values {{ id text value column {{ title type }} }}
                    group {{ id title }}
                }}
            }}"#,
            task_id
        );
        let data = self.graphql(&query, QUERY_TIMEOUT, "fetch item").await?;
        data["items"][0].as_object().cloned().map(Value::Object).ok_or_else(|| {
            PlatformRequestError::new(
                Platform::Monday,
                RequestErrorKind::NotFound,
                format!("failed to fetch item: no item with id {}", task_id),
            )
            .into()
        })
    }

    async fn create_task(&self, list_ref: &str, data: &Value) -> Result<Value> {
        let name = data["name"].as_str().unwrap_or_default();
        info!(board = %list_ref, name = %name, "Creating Monday item");

        let mutation = format!(
            r#"mutation {{ create_item(board_id: {}, item_name: "{}") {{ id name }} }}"#,
            list_ref,
            escape(name)
        );
        let created = self
            .graphql(&mutation, WRITE_TIMEOUT, "create item")
            .await?;
        let item = created["create_item"].clone();

        let item_id = id_string(&item["id"]);
        if let Some(column_values) = data.get("column_values") {
            self.set_column_values(&item_id, column_values).await?;
        }

        Ok(item)
    }

    async fn update_task(&self, task_id: &str, data: &Value) -> Result<Value> {
        info!(item = %task_id, "Updating Monday item");

        if let Some(name) = data["name"].as_str() {
            let mutation = format!(
                r#"mutation {{ change_item_name(item_id: {}, new_name: "{}") {{ id name }} }}"#,
                task_id,
                escape(name)
            );
            self.graphql(&mutation, WRITE_TIMEOUT, "rename item").await?;
        }

        if let Some(column_values) = data.get("column_values") {
            self.set_column_values(task_id, column_values).await?;
        }

        self.get_task(task_id).await
    }

    async fn list_comments(&self, task_id: &str) -> Result<Vec<TaskComment>> {
        let query = format!(
            r#"query {{
                items(ids: [{}]) {{
                    updates {{ id body created_at creator {{ id name }} }}
                }}
            }}"#,
            task_id
        );
        let data = self.graphql(&query, QUERY_TIMEOUT, "fetch updates").await?;
        let updates = data["items"][0]["updates"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        Ok(updates
            .iter()
            .map(|u| TaskComment {
                id: id_string(&u["id"]),
                text: u["body"].as_str().unwrap_or_default().to_string(),
                author: u["creator"]["name"].as_str().map(String::from),
                created_at: u["created_at"].as_str().and_then(normalize_date_str),
            })
            .collect())
    }

    async fn create_comment(&self, task_id: &str, text: &str) -> Result<TaskComment> {
        let mutation = format!(
            r#"mutation {{ create_update(item_id: {}, body: "{}") {{ id body }} }}"#,
            task_id,
            escape(text)
        );
        let data = self
            .graphql(&mutation, WRITE_TIMEOUT, "create update")
            .await?;
        let update = &data["create_update"];
        Ok(TaskComment {
            id: id_string(&update["id"]),
            text: update["body"].as_str().unwrap_or(text).to_string(),
            author: None,
            created_at: None,
        })
    }

    async fn list_custom_fields(&self, list_ref: &str) -> Result<Vec<CustomFieldDef>> {
        let query = format!(
            "query {{ boards(ids: [{}]) {{ columns {{ id title type }} }} }}",
            list_ref
        );
        let data = self.graphql(&query, QUERY_TIMEOUT, "fetch columns").await?;
        let columns = data["boards"][0]["columns"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        Ok(columns
            .iter()
            .map(|c| CustomFieldDef {
                id: id_string(&c["id"]),
                name: c["title"].as_str().unwrap_or_default().to_string(),
                field_type: c["type"].as_str().map(String::from),
            })
            .collect())
    }

    fn to_common(&self, raw: &Value) -> Result<CommonTask> {
        let item = self.parse_item(raw)?;

        let mut common = CommonTask::new(id_string(&item.id), item.name, Platform::Monday);
        common.url = item.url;

        for column in &item.column_values {
            let column_type = column
                .column
                .as_ref()
                .and_then(|c| c.column_type.as_deref())
                .unwrap_or_default();
            let title = column
                .column
                .as_ref()
                .and_then(|c| c.title.clone())
                .unwrap_or_else(|| column.id.clone());

            match column_type {
                "status" => {
                    let color = parse_value_blob(&column.value)
                        .and_then(|v| v["color"].as_str().map(String::from))
                        .unwrap_or_else(|| "#d3d3d3".to_string());
                    common.status = TaskStatus {
                        name: column.text.clone().unwrap_or_else(|| "unknown".to_string()),
                        color,
                    };
                }
                "date" => {
                    let lowered = title.to_lowercase();
                    let parsed = column.text.as_deref().and_then(normalize_date_str);
                    if lowered.contains("start") {
                        common.start_date = parsed;
                    } else if lowered.contains("due") || lowered.contains("end") {
                        common.due_date = parsed;
                    }
                }
                "people" => {
                    if let Some(blob) = parse_value_blob(&column.value) {
                        if let Some(persons) = blob["personsAndTeams"].as_array() {
                            common.assignees = persons
                                .iter()
                                .map(|p| Assignee {
                                    id: id_string(&p["id"]),
                                    name: p["name"].as_str().unwrap_or("Unknown").to_string(),
                                    email: p["email"].as_str().map(String::from),
                                })
                                .collect();
                        }
                    }
                }
                "tags" => {
                    if let Some(blob) = parse_value_blob(&column.value) {
                        if let Some(tag_ids) = blob["tag_ids"].as_array() {
                            common.tags = tag_ids.iter().map(id_string).collect();
                        }
                    }
                }
                _ => {}
            }

            // Every column doubles as a custom field so cross-platform
            // matching (sync_external_id) can see it
            common.custom_fields.push(CustomFieldValue {
                id: column.id.clone(),
                name: title,
                value: column
                    .text
                    .as_ref()
                    .map(|t| json!(t))
                    .unwrap_or(Value::Null),
            });
        }

        Ok(common)
    }

    fn from_common(&self, task: &CommonTask) -> Value {
        let mut column_values = serde_json::Map::new();
        for field in &task.custom_fields {
            let text = match &field.value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            column_values.insert(field.id.clone(), json!(text));
        }

        let mut data = serde_json::Map::new();
        data.insert("name".to_string(), json!(task.name));
        if !column_values.is_empty() {
            data.insert("column_values".to_string(), Value::Object(column_values));
        }
        Value::Object(data)
    }

    fn progress_percent(&self, status_name: &str) -> u8 {
        let status = status_name.to_lowercase();
        if ["done", "complete", "finished"].iter().any(|s| status.contains(s)) {
            100
        } else if ["working on it", "in progress", "started"]
            .iter()
            .any(|s| status.contains(s))
        {
            50
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> MondayAdapter {
        MondayAdapter::new("monday_test_token".to_string()).expect("Failed to create adapter")
    }

    fn sample_item() -> Value {
        json!({
            "id": "901245",
            "name": "Review onboarding copy",
            "url": "https://acme.monday.com/boards/7/pulses/901245",
            "column_values": [
                {
                    "id": "status",
                    "text": "Working on it",
                    "value": "{\"index\":1,\"color\":\"#fdab3d\"}",
                    "column": { "title": "Status", "type": "status" }
                },
                {
                    "id": "date4",
                    "text": "2025-03-10",
                    "value": "{\"date\":\"2025-03-10\"}",
                    "column": { "title": "Due date", "type": "date" }
                },
                {
                    "id": "date5",
                    "text": "2025-03-01",
                    "value": "{\"date\":\"2025-03-01\"}",
                    "column": { "title": "Start", "type": "date" }
                },
                {
                    "id": "people",
                    "text": "Ana",
                    "value": "{\"personsAndTeams\":[{\"id\":8001,\"name\":\"Ana\",\"email\":\"ana@example.com\",\"kind\":\"person\"}]}",
                    "column": { "title": "Owner", "type": "people" }
                },
                {
                    "id": "text7",
                    "text": "cu-42",
                    "value": "\"cu-42\"",
                    "column": { "title": "sync_external_id", "type": "text" }
                }
            ],
            "group": { "id": "topics", "title": "This week" }
        })
    }

    #[test]
    fn test_to_common() {
        let common = adapter().to_common(&sample_item()).unwrap();

        assert_eq!(common.id, "901245");
        assert_eq!(common.name, "Review onboarding copy");
        assert_eq!(common.platform, Platform::Monday);
        assert_eq!(common.status.name, "Working on it");
        assert_eq!(common.status.color, "#fdab3d");
        assert_eq!(
            common.due_date.unwrap().to_rfc3339(),
            "2025-03-10T00:00:00+00:00"
        );
        assert_eq!(
            common.start_date.unwrap().to_rfc3339(),
            "2025-03-01T00:00:00+00:00"
        );
        assert_eq!(common.assignees.len(), 1);
        assert_eq!(common.assignees[0].id, "8001");
        assert_eq!(common.assignees[0].email.as_deref(), Some("ana@example.com"));
        // Monday exposes no native custom id
        assert!(common.custom_id.is_none());
        // columns double as custom fields
        assert_eq!(
            common.custom_field("sync_external_id").unwrap().value,
            json!("cu-42")
        );
    }

    #[test]
    fn test_to_common_rejects_malformed_payload() {
        assert!(adapter().to_common(&json!({ "id": "1" })).is_err());
        assert!(adapter().to_common(&json!([])).is_err());
    }

    #[test]
    fn test_from_common_renders_column_values() {
        let mut common = CommonTask::new("x", "New item", Platform::Monday);
        common.custom_fields.push(CustomFieldValue {
            id: "text7".to_string(),
            name: "sync_external_id".to_string(),
            value: json!("cu-42"),
        });

        let data = adapter().from_common(&common);
        assert_eq!(data["name"], json!("New item"));
        assert_eq!(data["column_values"]["text7"], json!("cu-42"));
    }

    #[test]
    fn test_from_common_without_fields_is_name_only() {
        let common = CommonTask::new("x", "Bare item", Platform::Monday);
        let data = adapter().from_common(&common);
        assert_eq!(data["name"], json!("Bare item"));
        assert!(data.get("column_values").is_none());
    }

    #[test]
    fn test_graphql_escaping() {
        assert_eq!(escape(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape("a\\b"), "a\\\\b");
        assert_eq!(escape("line\nbreak"), "line\\nbreak");
    }

    #[test]
    fn test_progress_heuristic() {
        let a = adapter();
        assert_eq!(a.progress_percent("Done"), 100);
        assert_eq!(a.progress_percent("finished"), 100);
        assert_eq!(a.progress_percent("Working on it"), 50);
        assert_eq!(a.progress_percent("started"), 50);
        assert_eq!(a.progress_percent("Stuck"), 0);
    }

    #[test]
    fn test_base_url_override() {
        let a = adapter().with_base_url("http://localhost:9999/v2");
        assert_eq!(a.base_url, "http://localhost:9999/v2");
    }
}
