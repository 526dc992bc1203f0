//! Platform Adapters
//!
//! One adapter per external task platform, behind a single trait. Adapters
//! wrap the platform's REST/GraphQL surface, expose a uniform operation set,
//! and carry the bidirectional transforms to/from the Common Task Format.
//!
//! # Adding a platform
//!
//! Implement [`PlatformAdapter`], add a [`Platform`] variant, and register the
//! constructor in [`build_adapter`]. The engine never inspects platform types
//! at runtime; the adapter pair is selected once at configuration-load time
//! and held for the run's lifetime.

pub mod clickup;
pub mod monday;

use crate::error::{PlatformRequestError, RequestErrorKind};
use crate::task::{CommonTask, CustomFieldDef, TaskComment};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use clickup::ClickUpAdapter;
pub use monday::MondayAdapter;

/// The closed set of supported platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    ClickUp,
    Monday,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::ClickUp => f.write_str("clickup"),
            Platform::Monday => f.write_str("monday"),
        }
    }
}

/// One page of raw platform task payloads
#[derive(Debug, Clone, Default)]
pub struct TaskPage {
    pub tasks: Vec<Value>,
    pub has_more: bool,
}

/// Identity of the authenticated account, for connection checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A workspace/space/folder/list container on a platform.
///
/// Monday has no space or folder concepts; its boards surface both as
/// workspaces and as lists, and groups surface as spaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: String,
}

/// Uniform operation set over a task platform.
///
/// Raw task payloads cross this boundary as [`serde_json::Value`]: the task
/// schema is list/board-specific on both platforms, and the engine only ever
/// interprets payloads through `to_common`. All network-facing operations fail
/// with [`PlatformRequestError`] carrying the classified HTTP status.
/// `to_common`/`from_common` are pure; they are inverses up to the information
/// loss documented on each adapter.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Identity of the token's account
    async fn get_user(&self) -> Result<PlatformUser>;

    /// Top-level containers (ClickUp teams, Monday boards)
    async fn list_workspaces(&self) -> Result<Vec<Container>>;

    /// Second-level containers (ClickUp spaces, Monday groups)
    async fn list_spaces(&self, workspace_id: &str) -> Result<Vec<Container>>;

    /// Task lists (ClickUp lists under a folder or space, Monday boards)
    async fn list_lists(
        &self,
        folder_id: Option<&str>,
        space_id: Option<&str>,
    ) -> Result<Vec<Container>>;

    /// One page of tasks on a list. Page indices start at 0; callers fetch
    /// until `has_more` is false or a page comes back empty.
    async fn list_tasks(&self, list_ref: &str, page: u32) -> Result<TaskPage>;

    async fn get_task(&self, task_id: &str) -> Result<Value>;

    /// Create a task from platform-shaped data (as produced by `from_common`)
    async fn create_task(&self, list_ref: &str, data: &Value) -> Result<Value>;

    async fn update_task(&self, task_id: &str, data: &Value) -> Result<Value>;

    async fn list_comments(&self, task_id: &str) -> Result<Vec<TaskComment>>;

    async fn create_comment(&self, task_id: &str, text: &str) -> Result<TaskComment>;

    async fn list_custom_fields(&self, list_ref: &str) -> Result<Vec<CustomFieldDef>>;

    /// Normalize a raw task payload into the Common Task Format.
    /// Fails only on structurally unusable payloads (missing id/name).
    fn to_common(&self, raw: &Value) -> Result<CommonTask>;

    /// Render a canonical task as this platform's write payload
    fn from_common(&self, task: &CommonTask) -> Value;

    /// Percent-complete heuristic from this platform's status vocabulary.
    /// Heuristic only, not authoritative: platforms do not report progress,
    /// so this infers it from status text.
    fn progress_percent(&self, status_name: &str) -> u8;
}

/// Construct the adapter for a platform, pre-authenticated with `token`.
///
/// An invalid token is not detected here; it surfaces as an unauthorized
/// [`PlatformRequestError`] on the first call.
pub fn build_adapter(platform: Platform, token: String) -> Result<Box<dyn PlatformAdapter>> {
    match platform {
        Platform::ClickUp => Ok(Box::new(ClickUpAdapter::new(token)?)),
        Platform::Monday => Ok(Box::new(MondayAdapter::new(token)?)),
    }
}

/// Turn a non-success HTTP response into a classified platform error,
/// consuming the body for the message.
pub(crate) async fn classify_response(
    platform: Platform,
    action: &str,
    response: reqwest::Response,
) -> PlatformRequestError {
    let status = response.status();
    let kind = RequestErrorKind::from_status(status);
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let body = response.text().await.unwrap_or_default();

    PlatformRequestError::new(
        platform,
        kind,
        format!("failed to {}: HTTP {}: {}", action, status.as_u16(), body),
    )
    .with_retry_after(retry_after)
}
