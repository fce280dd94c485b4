//! In-memory task state and the reducer that transforms it.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use parking_lot::RwLock;
use tokio::sync::watch;
use ulid::Ulid;

use crate::model::{CustomCategory, ModalMode, NewCategory, NewTask, Task, TaskFilter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
    /// Tasks in the order the server returned them.
    pub tasks: Vec<Task>,
    pub modal_open: bool,
    /// Task behind the open form. A stub (empty id) means a pre-filled create.
    pub editing_task: Option<Task>,
    pub active_category: Option<String>,
    pub custom_categories: Vec<CustomCategory>,
    pub active_filter: TaskFilter,
}

impl TaskState {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn modal_mode(&self) -> Option<ModalMode> {
        self.modal_open
            .then(|| ModalMode::for_task(self.editing_task.as_ref()))
    }

    /// Tasks after the active category and the active filter are applied.
    pub fn visible_tasks(&self, today: NaiveDate) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| {
                self.active_category
                    .as_deref()
                    .map_or(true, |category| task.category == category)
            })
            .filter(|task| self.active_filter.matches(task, today))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|task| !task.completed).count()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.completed).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetTasks(Vec<Task>),
    /// Creation needs a backend id; the reducer leaves state untouched.
    Add(NewTask),
    Toggle(String),
    Delete(String),
    Edit(Task),
    OpenModal(Option<Task>),
    CloseModal,
    SetCategory(Option<String>),
    SetFilter(String),
    AddCustomCategory(NewCategory),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetTasks(_) => "set_tasks",
            Command::Add(_) => "add",
            Command::Toggle(_) => "toggle",
            Command::Delete(_) => "delete",
            Command::Edit(_) => "edit",
            Command::OpenModal(_) => "open_modal",
            Command::CloseModal => "close_modal",
            Command::SetCategory(_) => "set_category",
            Command::SetFilter(_) => "set_filter",
            Command::AddCustomCategory(_) => "add_custom_category",
        }
    }
}

pub fn reduce(mut state: TaskState, command: Command) -> TaskState {
    match command {
        Command::SetTasks(tasks) => {
            state.tasks = tasks;
        }
        Command::Add(_) => {}
        Command::Toggle(id) => {
            if let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) {
                task.completed = !task.completed;
            }
        }
        Command::Delete(id) => {
            state.tasks.retain(|task| task.id != id);
        }
        Command::Edit(updated) => {
            if let Some(task) = state.tasks.iter_mut().find(|task| task.id == updated.id) {
                *task = updated;
            }
            state.modal_open = false;
            state.editing_task = None;
        }
        Command::OpenModal(task) => {
            state.modal_open = true;
            state.editing_task = task;
        }
        Command::CloseModal => {
            state.modal_open = false;
            state.editing_task = None;
        }
        Command::SetCategory(category) => {
            state.active_category = category;
        }
        Command::SetFilter(token) => {
            state.active_filter = TaskFilter::from_token(&token);
        }
        Command::AddCustomCategory(category) => {
            state.custom_categories.push(CustomCategory {
                id: Ulid::new().to_string(),
                name: category.name,
                color: category.color,
            });
        }
    }
    state
}

/// Shared holder for [`TaskState`]; one per running session.
pub struct TaskStore {
    state: RwLock<TaskState>,
    version: AtomicU64,
    updates: watch::Sender<TaskState>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_state(TaskState::default())
    }

    pub fn with_state(state: TaskState) -> Self {
        let (updates, _) = watch::channel(state.clone());
        Self {
            state: RwLock::new(state),
            version: AtomicU64::new(0),
            updates,
        }
    }

    pub fn dispatch(&self, command: Command) {
        tracing::trace!(command = command.name(), "dispatch");
        // Publish under the write guard so subscribers see snapshots in dispatch order.
        let mut guard = self.state.write();
        let current = std::mem::take(&mut *guard);
        *guard = reduce(current, command);
        self.version.fetch_add(1, Ordering::AcqRel);
        self.updates.send_replace(guard.clone());
    }

    pub fn snapshot(&self) -> TaskState {
        self.state.read().clone()
    }

    /// Read a value out of the current state without cloning all of it.
    pub fn read<T>(&self, f: impl FnOnce(&TaskState) -> T) -> T {
        f(&self.state.read())
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.updates.subscribe()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
