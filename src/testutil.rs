//! In-memory repository for store and gate tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use crate::error::{Result, TaskError};
use crate::repository::TaskRepository;
use crate::task::{Completion, Task, TaskDraft, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    List,
    Create,
    Update,
    Delete,
    SetCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create(String),
    Update(TaskId),
    Delete(TaskId),
    SetCompletion(TaskId, Completion),
    /// Recorded when a call returns, so overlapping calls are visible.
    Finished(CallKind),
}

#[derive(Debug, Default)]
struct Server {
    tasks: Vec<Task>,
    next_id: TaskId,
}

/// Behaves like the persistence service, with failure injection, optional
/// latency, and a log of every call.
#[derive(Debug, Default)]
pub struct FakeRepository {
    server: Mutex<Server>,
    failures: Mutex<HashMap<CallKind, TaskError>>,
    calls: Mutex<Vec<Call>>,
    latency: Mutex<Option<Duration>>,
    /// Listings capture server state when the request arrives rather than
    /// when the response is sent.
    list_at_request: Mutex<bool>,
}

pub fn task(id: TaskId, title: &str, completed: Completion, minute: u32) -> Task {
    Task {
        id,
        title: title.to_string(),
        description: None,
        completed,
        created_at: Utc.with_ymd_and_hms(2024, 11, 29, 12, minute, 0).unwrap(),
    }
}

impl FakeRepository {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        Self {
            server: Mutex::new(Server { tasks, next_id }),
            ..Self::default()
        }
    }

    pub fn fail(&self, kind: CallKind, err: TaskError) {
        let _ = self.failures.lock().insert(kind, err);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn list_at_request(&self) {
        *self.list_at_request.lock() = true;
    }

    /// Changes server state behind the store's back.
    pub fn server_insert(&self, task: Task) {
        self.server.lock().tasks.push(task);
    }

    pub fn server_remove(&self, id: TaskId) {
        self.server.lock().tasks.retain(|t| t.id != id);
    }

    pub fn server_tasks(&self) -> Vec<Task> {
        self.server.lock().tasks.clone()
    }

    /// Calls made so far, without the completion markers.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| !matches!(c, Call::Finished(_)))
            .cloned()
            .collect()
    }

    pub fn timeline(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn enter(&self, call: Call, kind: CallKind) -> Result<()> {
        self.calls.lock().push(call);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let injected = self.failures.lock().get(&kind).cloned();
        match injected {
            Some(err) => {
                self.exit(kind);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn exit(&self, kind: CallKind) {
        self.calls.lock().push(Call::Finished(kind));
    }
}

#[async_trait]
impl TaskRepository for FakeRepository {
    async fn list(&self) -> Result<Vec<Task>> {
        let early = (*self.list_at_request.lock()).then(|| self.server_tasks());
        self.enter(Call::List, CallKind::List).await?;
        let tasks = early.unwrap_or_else(|| self.server_tasks());
        self.exit(CallKind::List);
        Ok(tasks)
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task> {
        self.enter(Call::Create(draft.title.clone()), CallKind::Create)
            .await?;
        let result = if draft.title.trim().is_empty() {
            Err(TaskError::Validation("title is required".to_string()))
        } else {
            let (title, description) = draft.normalized();
            let mut server = self.server.lock();
            let id = server.next_id.max(1);
            server.next_id = id + 1;
            let minute = u32::try_from(id % 60).unwrap_or_default();
            let created = Task {
                description,
                ..task(id, &title, Completion::Pending, minute)
            };
            server.tasks.push(created.clone());
            Ok(created)
        };
        self.exit(CallKind::Create);
        result
    }

    async fn update(&self, task: &Task) -> Result<Task> {
        self.enter(Call::Update(task.id), CallKind::Update).await?;
        let result = {
            let mut server = self.server.lock();
            match server.tasks.iter_mut().find(|t| t.id == task.id) {
                Some(stored) => {
                    stored.title = task.title.clone();
                    stored.description = task.description.clone();
                    stored.completed = task.completed;
                    Ok(stored.clone())
                }
                None => Err(TaskError::NotFound { id: task.id }),
            }
        };
        self.exit(CallKind::Update);
        result
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        self.enter(Call::Delete(id), CallKind::Delete).await?;
        let result = {
            let mut server = self.server.lock();
            let before = server.tasks.len();
            server.tasks.retain(|t| t.id != id);
            if server.tasks.len() == before {
                Err(TaskError::NotFound { id })
            } else {
                Ok(())
            }
        };
        self.exit(CallKind::Delete);
        result
    }

    async fn set_completion(&self, id: TaskId, completed: Completion) -> Result<Task> {
        self.enter(Call::SetCompletion(id, completed), CallKind::SetCompletion)
            .await?;
        let result = {
            let mut server = self.server.lock();
            match server.tasks.iter_mut().find(|t| t.id == id) {
                Some(stored) => {
                    stored.completed = completed;
                    Ok(stored.clone())
                }
                None => Err(TaskError::NotFound { id }),
            }
        };
        self.exit(CallKind::SetCompletion);
        result
    }
}
