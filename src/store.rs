//! In-memory task list kept in sync with the persistence service.
//!
//! The store is the only writer of the task collection. After a mutation
//! it either patches the single record it already knows in full (edit) or
//! refetches the whole listing (create, delete, toggle) so that server
//! assigned fields and removals are never guessed locally.
//!
//! Mutations that target an existing task hold a per-task lock from the
//! remote call until the follow-up refetch is done, so two intents on the
//! same task never interleave.
//!
//! Listings and edit patches are stamped from one counter. A listing that
//! was requested before the newest applied change is not allowed to
//! overwrite it; if that change was a local patch the listing is requested
//! again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::error::{Result, TaskError};
use crate::notification::{Notification, Notifications};
use crate::repository::TaskRepository;
use crate::task::{self, Task, TaskDraft, TaskId};

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    /// Listings in flight.
    loading: usize,
    /// Last stamp handed out to a listing or a patch.
    generation: u64,
    /// Stamp of the change `tasks` currently reflects.
    applied: u64,
    /// Whether that change was a full listing.
    applied_listing: bool,
}

impl StoreState {
    fn next_stamp(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

/// Upper bound on refetches after a listing is overtaken by local patches.
const MAX_LISTING_ATTEMPTS: usize = 3;

type RowLocks = Mutex<HashMap<TaskId, Arc<tokio::sync::Mutex<()>>>>;

pub struct TaskStore {
    repository: Arc<dyn TaskRepository>,
    state: RwLock<StoreState>,
    notifications: Mutex<Notifications>,
    row_locks: RowLocks,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

/// Clears one unit of the loading counter when dropped, including when the
/// listing future is dropped half way.
struct LoadingGuard<'a>(&'a RwLock<StoreState>);

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a RwLock<StoreState>) -> Self {
        state.write().loading += 1;
        Self(state)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.write();
        state.loading = state.loading.saturating_sub(1);
    }
}

/// Exclusive access to one task for the duration of a mutation. The lock
/// entry is pruned once nobody else is waiting on it.
struct RowGuard<'a> {
    locks: &'a RowLocks,
    id: TaskId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RowGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        if locks.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            let _ = locks.remove(&self.id);
        }
    }
}

impl TaskStore {
    pub fn new(repository: Arc<dyn TaskRepository>, notification_display: Duration) -> Self {
        Self {
            repository,
            state: RwLock::new(StoreState::default()),
            notifications: Mutex::new(Notifications::new(notification_display)),
            row_locks: Mutex::new(HashMap::new()),
        }
    }

    // ── Observable state ────────────────────────────────────────────────

    /// Snapshot of the collection, in no particular order.
    pub fn tasks(&self) -> Vec<Task> {
        self.state.read().tasks.clone()
    }

    /// Snapshot in display order, newest first.
    pub fn sorted_tasks(&self) -> Vec<Task> {
        task::sorted_by_recency(&self.state.read().tasks)
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.state.read().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading > 0
    }

    pub fn active_notification(&self) -> Option<Notification> {
        self.notifications.lock().active().cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().history().cloned().collect()
    }

    // ── Synchronization ─────────────────────────────────────────────────

    /// Initial load. Replaces whatever is in memory with the server's view.
    pub async fn initialize(&self) -> Result<()> {
        self.load("Could not load tasks").await
    }

    /// User-triggered reload, same semantics as [`Self::initialize`].
    pub async fn refresh(&self) -> Result<()> {
        self.load("Could not refresh tasks").await
    }

    async fn load(&self, failure: &str) -> Result<()> {
        let _loading = LoadingGuard::start(&self.state);
        self.resync(failure).await
    }

    async fn resync(&self, failure: &str) -> Result<()> {
        for attempt in 1..=MAX_LISTING_ATTEMPTS {
            let stamp = self.state.write().next_stamp();
            let tasks = match self.repository.list().await {
                Ok(tasks) => tasks,
                Err(err) => {
                    self.report_failure(failure, &err);
                    return Err(err);
                }
            };

            let mut state = self.state.write();
            if stamp > state.applied {
                debug!(count = tasks.len(), stamp, "task list resynchronized");
                state.tasks = tasks;
                state.applied = stamp;
                state.applied_listing = true;
                return Ok(());
            }
            if state.applied_listing {
                // A listing requested later already landed and saw everything this one did.
                debug!(stamp, applied = state.applied, "discarding superseded listing");
                return Ok(());
            }
            debug!(stamp, attempt, "listing overtaken by a local patch, refetching");
        }
        warn!(attempts = MAX_LISTING_ATTEMPTS, "task list kept changing during refetch");
        Ok(())
    }

    /// Runs a mutation and, if it succeeded, replaces the collection with a
    /// fresh listing. A failed refetch is reported on its own; it does not
    /// turn the successful mutation into a failure.
    async fn mutate_then_resync<T, F>(&self, mutation: F, success: &str, failure: &str) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match mutation.await {
            Ok(value) => {
                info!(outcome = success, "task mutation applied");
                self.notifications.lock().success(success);
                let _ = self.resync("Could not refresh tasks").await;
                Ok(value)
            }
            Err(err) => {
                self.report_failure(failure, &err);
                Err(err)
            }
        }
    }

    fn report_failure(&self, context: &str, err: &TaskError) {
        warn!(error = %err, "{context}");
        self.notifications.lock().error(format!("{context}: {err}"));
    }

    async fn lock_row(&self, id: TaskId) -> RowGuard<'_> {
        let lock = Arc::clone(self.row_locks.lock().entry(id).or_default());
        let guard = lock.lock_owned().await;
        RowGuard {
            locks: &self.row_locks,
            id,
            guard: Some(guard),
        }
    }

    // ── Mutations ───────────────────────────────────────────────────────

    pub async fn apply_create(&self, draft: TaskDraft) -> Result<Task> {
        if let Err(err) = draft.validate() {
            self.report_failure("Could not create task", &err);
            return Err(err);
        }
        self.mutate_then_resync(
            self.repository.create(&draft),
            "Task created",
            "Could not create task",
        )
        .await
    }

    /// Sends the full record and patches the local copy with what the server
    /// returned. `id` and `created_at` of the local copy are kept.
    pub async fn apply_edit(&self, edited: Task) -> Result<Task> {
        if let Err(err) = task::validate_title(&edited.title) {
            self.report_failure("Could not edit task", &err);
            return Err(err);
        }
        let _row = self.lock_row(edited.id).await;
        match self.repository.update(&edited).await {
            Ok(updated) => {
                {
                    let mut state = self.state.write();
                    let stamp = state.next_stamp();
                    let patched = match state.tasks.iter_mut().find(|t| t.id == edited.id) {
                        Some(existing) => {
                            existing.title.clone_from(&updated.title);
                            existing.description.clone_from(&updated.description);
                            existing.completed = updated.completed;
                            true
                        }
                        None => false,
                    };
                    if patched {
                        state.applied = stamp;
                        state.applied_listing = false;
                    }
                }
                info!(id = edited.id, "task edited");
                self.notifications.lock().success("Task edited");
                Ok(updated)
            }
            Err(err) => {
                self.report_failure("Could not edit task", &err);
                Err(err)
            }
        }
    }

    /// Deletes without asking. Callers go through the confirmation gate.
    pub async fn apply_delete(&self, id: TaskId) -> Result<()> {
        let _row = self.lock_row(id).await;
        self.mutate_then_resync(
            self.repository.delete(id),
            "Task deleted",
            "Could not delete task",
        )
        .await
    }

    /// Flips completion of a task currently in memory. Unknown ids are
    /// ignored; the row may have vanished between render and key press.
    pub async fn apply_toggle(&self, id: TaskId) -> Result<()> {
        let _row = self.lock_row(id).await;
        let Some(current) = self.task(id) else {
            debug!(id, "toggle ignored, task not in memory");
            return Ok(());
        };
        self.mutate_then_resync(
            self.repository.set_completion(id, current.completed.toggled()),
            "Task status updated",
            "Could not update task status",
        )
        .await
        .map(|_| ())
    }
}
