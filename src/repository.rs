//! Remote task repository.
//!
//! [`TaskRepository`] is the seam between the store and the persistence
//! service. [`HttpTaskRepository`] talks JSON over HTTP:
//!
//! - `GET /tasks`
//! - `POST /tasks`
//! - `PUT /tasks/{id}`
//! - `DELETE /tasks/{id}`
//! - `PATCH /tasks/{id}/completed`

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, TaskError};
use crate::task::{Completion, Task, TaskDraft, TaskId};

/// Remote operations on tasks. Implementations hold no task state.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// The complete current set. Items that do not decode are left out.
    async fn list(&self) -> Result<Vec<Task>>;

    async fn create(&self, draft: &TaskDraft) -> Result<Task>;

    /// Full replace by id.
    async fn update(&self, task: &Task) -> Result<Task>;

    async fn delete(&self, id: TaskId) -> Result<()>;

    async fn set_completion(&self, id: TaskId, completed: Completion) -> Result<Task>;
}

#[derive(Debug, Serialize)]
struct CreateTaskRequest {
    title: String,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateTaskRequest<'a> {
    title: &'a str,
    description: Option<&'a str>,
    completed: Completion,
}

#[derive(Debug, Serialize)]
struct SetCompletionRequest {
    completed: Completion,
}

/// Which call a failed response belongs to; decides how statuses map to
/// [`TaskError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    List,
    Create,
    Update(TaskId),
    Delete(TaskId),
}

#[derive(Debug, Clone)]
pub struct HttpTaskRepository {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTaskRepository {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaskError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, id: TaskId) -> String {
        format!("{}/tasks/{id}", self.base_url)
    }

    async fn checked(response: reqwest::Response, operation: Operation) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = classify_failure(operation, status, &body);
        warn!(?operation, status = status.as_u16(), error = %err, "task request failed");
        Err(err)
    }

    async fn decode_task(response: reqwest::Response) -> Result<Task> {
        let value: Value = response
            .json()
            .await
            .map_err(|e| TaskError::transport(format!("invalid response body: {e}")))?;
        Task::from_value(value).map_err(|e| TaskError::transport(format!("invalid task in response: {e}")))
    }
}

#[async_trait]
impl TaskRepository for HttpTaskRepository {
    async fn list(&self) -> Result<Vec<Task>> {
        debug!(url = %self.tasks_url(), "listing tasks");
        let response = self.client.get(self.tasks_url()).send().await?;
        let response = Self::checked(response, Operation::List).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| TaskError::transport(format!("invalid response body: {e}")))?;
        decode_listing(body)
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task> {
        let (title, description) = draft.normalized();
        debug!(%title, "creating task");
        let response = self
            .client
            .post(self.tasks_url())
            .json(&CreateTaskRequest { title, description })
            .send()
            .await?;
        let response = Self::checked(response, Operation::Create).await?;
        Self::decode_task(response).await
    }

    async fn update(&self, task: &Task) -> Result<Task> {
        debug!(id = task.id, "updating task");
        let response = self
            .client
            .put(self.task_url(task.id))
            .json(&UpdateTaskRequest {
                title: task.title.trim(),
                description: task.description.as_deref(),
                completed: task.completed,
            })
            .send()
            .await?;
        let response = Self::checked(response, Operation::Update(task.id)).await?;
        Self::decode_task(response).await
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        debug!(id, "deleting task");
        let response = self.client.delete(self.task_url(id)).send().await?;
        let _ = Self::checked(response, Operation::Delete(id)).await?;
        Ok(())
    }

    async fn set_completion(&self, id: TaskId, completed: Completion) -> Result<Task> {
        debug!(id, completed = completed.as_wire(), "setting task completion");
        let response = self
            .client
            .patch(format!("{}/completed", self.task_url(id)))
            .json(&SetCompletionRequest { completed })
            .send()
            .await?;
        let response = Self::checked(response, Operation::Update(id)).await?;
        Self::decode_task(response).await
    }
}

/// Decodes a listing item by item, dropping (and logging) the ones that do
/// not conform.
fn decode_listing(body: Value) -> Result<Vec<Task>> {
    let Value::Array(items) = body else {
        return Err(TaskError::transport("task listing is not a JSON array"));
    };
    let mut tasks = Vec::with_capacity(items.len());
    let mut seen = HashSet::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match Task::from_value(item) {
            Ok(task) if !seen.insert(task.id) => {
                warn!(index, id = task.id, "excluding duplicate task from listing");
            }
            Ok(task) => tasks.push(task),
            Err(error) => warn!(index, %error, "excluding malformed task from listing"),
        }
    }
    Ok(tasks)
}

fn classify_failure(operation: Operation, status: StatusCode, body: &str) -> TaskError {
    match (operation, status) {
        (Operation::Update(id) | Operation::Delete(id), StatusCode::NOT_FOUND) => {
            TaskError::NotFound { id }
        }
        (
            Operation::Create | Operation::Update(_),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY,
        ) => TaskError::Validation(rejection_reason(body)),
        _ => TaskError::unexpected_status(status.as_u16(), body),
    }
}

/// Pulls a human readable reason out of an error body, which may be a JSON
/// object with `error` or `message`, or plain text.
fn rejection_reason(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["error", "message"]
            .iter()
            .find_map(|key| v.get(key)?.as_str().map(String::from))
    });
    match from_json {
        Some(reason) => reason,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => "rejected by server".to_string(),
    }
}
