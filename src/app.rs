//! Terminal UI state and key handling.
//!
//! Key presses are turned into synchronous state changes (selection, form
//! editing, opening or cancelling the delete prompt) and, for anything that
//! talks to the service, an [`Intent`] the event loop spawns.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::gate::{ConfirmationGate, PendingDeletion};
use crate::store::TaskStore;
use crate::task::{Task, TaskDraft, TaskId};

/// Work that needs a round-trip to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Load,
    Refresh,
    Create(TaskDraft),
    Edit(Task),
    Toggle(TaskId),
    /// Already confirmed through the gate.
    Delete(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    /// Editing keeps the original record so id, completion and creation
    /// date go back unchanged.
    Edit(Task),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub mode: FormMode,
    pub title: String,
    pub description: String,
    pub focus: FormField,
    pub error: Option<String>,
}

impl TaskForm {
    fn create() -> Self {
        Self {
            mode: FormMode::Create,
            title: String::new(),
            description: String::new(),
            focus: FormField::Title,
            error: None,
        }
    }

    fn edit(task: Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            mode: FormMode::Edit(task),
            focus: FormField::Title,
            error: None,
        }
    }

    pub fn heading(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "New task",
            FormMode::Edit(_) => "Edit task",
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Title => &mut self.title,
            FormField::Description => &mut self.description,
        }
    }

    fn switch_focus(&mut self) {
        self.focus = match self.focus {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Title,
        };
    }

    fn submit(&self) -> Intent {
        match &self.mode {
            FormMode::Create => Intent::Create(TaskDraft::new(self.title.clone(), self.description.clone())),
            FormMode::Edit(original) => {
                let description = self.description.trim();
                Intent::Edit(Task {
                    title: self.title.trim().to_string(),
                    description: (!description.is_empty()).then(|| description.to_string()),
                    ..original.clone()
                })
            }
        }
    }
}

pub struct App {
    store: Arc<TaskStore>,
    gate: Arc<ConfirmationGate>,
    selected: usize,
    form: Option<TaskForm>,
    should_quit: bool,
}

impl App {
    pub fn new(store: Arc<TaskStore>, gate: Arc<ConfirmationGate>) -> Self {
        Self {
            store,
            gate,
            selected: 0,
            form: None,
            should_quit: false,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn form(&self) -> Option<&TaskForm> {
        self.form.as_ref()
    }

    pub fn pending_deletion(&self) -> Option<PendingDeletion> {
        self.gate.pending()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Row index of the selection, clamped to the current list.
    pub fn selected_index(&self, rows: usize) -> Option<usize> {
        (rows > 0).then(|| self.selected.min(rows - 1))
    }

    pub fn selected_task(&self) -> Option<Task> {
        let tasks = self.store.sorted_tasks();
        let index = self.selected_index(tasks.len())?;
        tasks.into_iter().nth(index)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Intent> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }
        if self.gate.pending().is_some() {
            return self.handle_confirmation_key(key);
        }
        if self.form.is_some() {
            return self.handle_form_key(key);
        }
        self.handle_list_key(key)
    }

    fn handle_confirmation_key(&mut self, key: KeyEvent) -> Option<Intent> {
        match key.code {
            KeyCode::Char('y' | 'Y') | KeyCode::Enter => {
                self.gate.take_confirmed().map(|pending| Intent::Delete(pending.id))
            }
            KeyCode::Char('n' | 'N') | KeyCode::Esc => {
                self.gate.cancel_delete();
                None
            }
            _ => None,
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Option<Intent> {
        let form = self.form.as_mut()?;
        match key.code {
            KeyCode::Esc => {
                self.form = None;
                None
            }
            KeyCode::Tab | KeyCode::BackTab => {
                form.switch_focus();
                None
            }
            KeyCode::Enter => {
                if form.title.trim().is_empty() {
                    form.error = Some("Title is required".to_string());
                    return None;
                }
                let intent = form.submit();
                self.form = None;
                Some(intent)
            }
            KeyCode::Backspace => {
                let _ = form.focused_mut().pop();
                None
            }
            KeyCode::Char(c) => {
                form.focused_mut().push(c);
                form.error = None;
                None
            }
            _ => None,
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> Option<Intent> {
        let rows = self.store.tasks().len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected_index(rows).unwrap_or(0).saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if let Some(current) = self.selected_index(rows) {
                    self.selected = (current + 1).min(rows - 1);
                }
                None
            }
            KeyCode::Char('a') => {
                self.form = Some(TaskForm::create());
                None
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.selected_task() {
                    self.form = Some(TaskForm::edit(task));
                }
                None
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.selected_task().map(|t| Intent::Toggle(t.id)),
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(task) = self.selected_task() {
                    self.gate.request_delete(task.id);
                }
                None
            }
            KeyCode::Char('r') => Some(Intent::Refresh),
            _ => None,
        }
    }

    /// Runs the intent in the background so the UI keeps responding.
    pub fn dispatch(&self, intent: Intent) -> JoinHandle<()> {
        tokio::spawn(run_intent(Arc::clone(&self.store), intent))
    }
}

/// Outcomes are already reported by the store; errors are only traced here.
pub async fn run_intent(store: Arc<TaskStore>, intent: Intent) {
    let result = match intent {
        Intent::Load => store.initialize().await,
        Intent::Refresh => store.refresh().await,
        Intent::Create(draft) => store.apply_create(draft).await.map(|_| ()),
        Intent::Edit(task) => store.apply_edit(task).await.map(|_| ()),
        Intent::Toggle(id) => store.apply_toggle(id).await,
        Intent::Delete(id) => store.apply_delete(id).await,
    };
    if let Err(error) = result {
        debug!(%error, "intent finished with an error");
    }
}
