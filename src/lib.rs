//! Terminal client for a remote to-do service.
//!
//! [`store::TaskStore`] owns the in-memory task list and keeps it in sync
//! with the service through a [`repository::TaskRepository`].
//! [`gate::ConfirmationGate`] stands in front of deletes. The ratatui front
//! end in [`app`] and [`ui`] only reads the store and forwards intents.

pub mod app;
pub mod error;
pub mod gate;
pub mod logging;
pub mod notification;
pub mod repository;
pub mod settings;
pub mod store;
pub mod task;
pub mod ui;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Result, TaskError};
pub use gate::{ConfirmationGate, GateState, PendingDeletion};
pub use repository::{HttpTaskRepository, TaskRepository};
pub use store::TaskStore;
pub use task::{Completion, Task, TaskDraft, TaskId};
