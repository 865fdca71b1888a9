//! Confirmation step in front of deletes.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::store::TaskStore;
use crate::task::TaskId;

/// The deletion waiting for a yes/no. The title is captured when the
/// request is made so the prompt does not depend on later list changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    pub id: TaskId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Idle,
    AwaitingConfirmation(PendingDeletion),
}

/// Holds at most one pending deletion. A new request replaces the old one.
#[derive(Debug)]
pub struct ConfirmationGate {
    store: Arc<TaskStore>,
    state: Mutex<GateState>,
}

impl ConfirmationGate {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            state: Mutex::new(GateState::Idle),
        }
    }

    pub fn state(&self) -> GateState {
        self.state.lock().clone()
    }

    pub fn pending(&self) -> Option<PendingDeletion> {
        match &*self.state.lock() {
            GateState::Idle => None,
            GateState::AwaitingConfirmation(pending) => Some(pending.clone()),
        }
    }

    pub fn request_delete(&self, id: TaskId) {
        let title = self.store.task(id).map(|t| t.title).unwrap_or_default();
        debug!(id, %title, "delete requested, awaiting confirmation");
        *self.state.lock() = GateState::AwaitingConfirmation(PendingDeletion { id, title });
    }

    pub fn cancel_delete(&self) {
        if let GateState::AwaitingConfirmation(pending) = std::mem::take(&mut *self.state.lock()) {
            debug!(id = pending.id, "delete cancelled");
        }
    }

    /// Returns the gate to idle and hands back what was pending. Once this
    /// returns, a later cancel has nothing left to undo.
    pub fn take_confirmed(&self) -> Option<PendingDeletion> {
        match std::mem::take(&mut *self.state.lock()) {
            GateState::Idle => None,
            GateState::AwaitingConfirmation(pending) => {
                info!(id = pending.id, "delete confirmed");
                Some(pending)
            }
        }
    }

    /// Returns the gate to idle and runs the pending delete. The outcome is
    /// reported by the store; the error is only passed through.
    pub async fn confirm_delete(&self) -> Result<()> {
        match self.take_confirmed() {
            Some(pending) => self.store.apply_delete(pending.id).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::TaskError;
    use crate::task::Completion;
    use crate::testutil::{task, Call, FakeRepository};

    async fn gate_with(tasks: Vec<crate::task::Task>) -> (Arc<FakeRepository>, Arc<TaskStore>, ConfirmationGate) {
        let repo = Arc::new(FakeRepository::with_tasks(tasks));
        let store = Arc::new(TaskStore::new(repo.clone(), Duration::from_secs(3)));
        store.initialize().await.unwrap();
        repo.clear_calls();
        let gate = ConfirmationGate::new(Arc::clone(&store));
        (repo, store, gate)
    }

    fn buy_milk() -> crate::task::Task {
        task(5, "Buy milk", Completion::Pending, 5)
    }

    #[tokio::test]
    async fn request_captures_title_and_does_not_delete() {
        let (repo, _store, gate) = gate_with(vec![buy_milk()]).await;
        gate.request_delete(5);
        assert_eq!(
            gate.state(),
            GateState::AwaitingConfirmation(PendingDeletion {
                id: 5,
                title: "Buy milk".to_string()
            })
        );
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn cancel_returns_to_idle_without_side_effects() {
        let (repo, store, gate) = gate_with(vec![buy_milk()]).await;
        let before = store.tasks();
        gate.request_delete(5);
        gate.cancel_delete();
        assert_eq!(gate.state(), GateState::Idle);
        assert_eq!(store.tasks(), before);
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn confirm_deletes_and_returns_to_idle() {
        let (repo, store, gate) = gate_with(vec![buy_milk()]).await;
        gate.request_delete(5);
        gate.confirm_delete().await.unwrap();
        assert_eq!(gate.state(), GateState::Idle);
        assert_eq!(repo.calls(), vec![Call::Delete(5), Call::List]);
        assert!(store.tasks().is_empty());
    }

    #[tokio::test]
    async fn confirm_while_idle_does_nothing() {
        let (repo, _store, gate) = gate_with(vec![buy_milk()]).await;
        gate.confirm_delete().await.unwrap();
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn cancel_after_take_does_not_undo_confirmation() {
        let (repo, store, gate) = gate_with(vec![buy_milk()]).await;
        gate.request_delete(5);
        let confirmed = gate.take_confirmed().unwrap();
        gate.cancel_delete();
        assert_eq!(gate.state(), GateState::Idle);
        assert!(gate.take_confirmed().is_none());

        store.apply_delete(confirmed.id).await.unwrap();
        assert_eq!(repo.calls(), vec![Call::Delete(5), Call::List]);
    }

    #[tokio::test]
    async fn latest_request_wins() {
        let (repo, _store, gate) = gate_with(vec![buy_milk(), task(6, "Walk dog", Completion::Done, 6)]).await;
        gate.request_delete(5);
        gate.request_delete(6);
        assert_eq!(gate.pending().map(|p| p.id), Some(6));
        gate.confirm_delete().await.unwrap();
        assert_eq!(repo.calls()[0], Call::Delete(6));
    }

    #[tokio::test]
    async fn failed_delete_still_resets_gate() {
        let (repo, store, gate) = gate_with(vec![buy_milk()]).await;
        repo.server_remove(5);
        let before = store.tasks();

        gate.request_delete(5);
        let err = gate.confirm_delete().await.unwrap_err();
        assert_eq!(err, TaskError::NotFound { id: 5 });
        assert_eq!(gate.state(), GateState::Idle);
        assert_eq!(store.tasks(), before);
        assert!(store.active_notification().unwrap().is_error());
    }

    #[tokio::test]
    async fn request_for_unknown_task_has_empty_title() {
        let (_repo, _store, gate) = gate_with(vec![]).await;
        gate.request_delete(42);
        assert_eq!(
            gate.pending(),
            Some(PendingDeletion {
                id: 42,
                title: String::new()
            })
        );
    }
}
