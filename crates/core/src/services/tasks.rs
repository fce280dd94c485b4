use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::analytics::{tasks_by_day, TaskSummary};
use crate::api::{HttpTaskApi, TaskApi};
use crate::config::AppConfig;
use crate::database::Database;
use crate::extras::ExtrasStore;
use crate::model::{CustomCategory, NewCategory, NewTask, Task, TaskFilter, TaskPatch};
use crate::store::{Command, TaskStore};
use crate::sync::{Session, SyncEngine, SyncOutcome};

#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub filter: TaskFilter,
    pub category: Option<String>,
    pub tasks: Vec<Task>,
    pub pending: usize,
    pub completed: usize,
    pub custom_categories: Vec<CustomCategory>,
}

/// A mutation as the caller sees it once the engine has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChange {
    pub id: String,
    pub title: String,
    pub completed: Option<bool>,
    pub outcome: SyncOutcome,
}

/// Wires config, the extras database, the HTTP client and the sync engine together.
pub struct TasksService {
    config: AppConfig,
    engine: SyncEngine,
}

impl TasksService {
    pub fn new(config: AppConfig) -> Result<Self> {
        let api: Option<Arc<dyn TaskApi>> = if config.has_session() {
            let http = HttpTaskApi::from_config(&config).context("Failed to build task API client")?;
            Some(Arc::new(http))
        } else {
            None
        };
        Self::assemble(config, api)
    }

    /// Use a caller-supplied backend instead of HTTP.
    pub fn with_api(config: AppConfig, api: Arc<dyn TaskApi>) -> Result<Self> {
        Self::assemble(config, Some(api))
    }

    fn assemble(config: AppConfig, api: Option<Arc<dyn TaskApi>>) -> Result<Self> {
        let database = Database::initialize(&config).with_context(|| {
            format!("Failed to open extras store at {}", config.db_path().display())
        })?;
        let extras: Arc<dyn ExtrasStore> = Arc::new(database);
        let session = match (config.user_id(), api) {
            (Some(user_id), Some(api)) => Some(Session::new(user_id, api)),
            _ => None,
        };
        if session.is_none() {
            tracing::info!("no signed-in user; changes stay local");
        }
        let engine = SyncEngine::new(Arc::new(TaskStore::new()), extras, session);
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn is_authenticated(&self) -> bool {
        self.engine.is_authenticated()
    }

    pub async fn refresh(&self) -> Result<()> {
        self.engine
            .load()
            .await
            .context("Failed to load tasks from the server")?;
        Ok(())
    }

    pub fn view(&self, filter: TaskFilter, category: Option<&str>, today: NaiveDate) -> ViewSnapshot {
        let store = self.engine.store();
        store.dispatch(Command::SetCategory(category.map(str::to_string)));
        store.dispatch(Command::SetFilter(filter.as_str().to_string()));
        store.read(|state| ViewSnapshot {
            filter: state.active_filter,
            category: state.active_category.clone(),
            tasks: state.visible_tasks(today).into_iter().cloned().collect(),
            pending: state.pending_count(),
            completed: state.completed_count(),
            custom_categories: state.custom_categories.clone(),
        })
    }

    pub fn fetch_task(&self, id: &str) -> Option<Task> {
        self.engine.store().read(|state| state.task(id).cloned())
    }

    /// `None` when there is no session to create the task in.
    pub async fn capture(&self, task: NewTask) -> Result<Option<Task>> {
        self.engine.store().dispatch(Command::OpenModal(None));
        let created = self.engine.add(task).await;
        if self.engine.store().read(|state| state.modal_open) {
            self.engine.store().dispatch(Command::CloseModal);
        }
        Ok(created?)
    }

    pub async fn toggle(&self, id: &str) -> Result<Option<TaskChange>> {
        if self.fetch_task(id).is_none() {
            return Ok(None);
        }
        let outcome = self.engine.dispatch(Command::Toggle(id.to_string())).await?;
        Ok(self.fetch_task(id).map(|task| TaskChange {
            id: task.id,
            title: task.title,
            completed: Some(task.completed),
            outcome,
        }))
    }

    /// Deletes each known id in turn; unknown ids are skipped.
    pub async fn delete(&self, ids: &[String]) -> Result<Vec<TaskChange>> {
        let mut changes = Vec::new();
        for id in ids {
            let Some(task) = self.fetch_task(id) else {
                continue;
            };
            let outcome = self.engine.dispatch(Command::Delete(id.clone())).await?;
            changes.push(TaskChange {
                id: task.id,
                title: task.title,
                completed: None,
                outcome,
            });
        }
        Ok(changes)
    }

    pub async fn edit(&self, id: &str, patch: &TaskPatch) -> Result<Option<TaskChange>> {
        let Some(existing) = self.fetch_task(id) else {
            return Ok(None);
        };
        let updated = patch.apply(&existing);
        self.engine
            .store()
            .dispatch(Command::OpenModal(Some(existing)));
        let result = self.engine.dispatch(Command::Edit(updated)).await;
        if result.is_err() {
            self.engine.store().dispatch(Command::CloseModal);
        }
        let outcome = result?;
        Ok(self.fetch_task(id).map(|task| TaskChange {
            id: task.id,
            title: task.title,
            completed: Some(task.completed),
            outcome,
        }))
    }

    pub async fn add_category(&self, category: NewCategory) -> Result<CustomCategory> {
        self.engine
            .dispatch(Command::AddCustomCategory(category))
            .await?;
        self.engine
            .store()
            .read(|state| state.custom_categories.last().cloned())
            .context("Category was not recorded")
    }

    pub fn summary(&self, today: NaiveDate) -> TaskSummary {
        self.engine.store().read(|state| {
            TaskSummary::from_tasks(&state.tasks, today, &state.custom_categories)
        })
    }

    pub fn calendar(&self) -> BTreeMap<NaiveDate, Vec<Task>> {
        self.engine.store().read(|state| {
            tasks_by_day(&state.tasks)
                .into_iter()
                .map(|(day, tasks)| (day, tasks.into_iter().cloned().collect()))
                .collect()
        })
    }
}
