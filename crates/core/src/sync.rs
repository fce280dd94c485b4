//! Optimistic synchronization between the [`TaskStore`] and the task API.
//!
//! Every mutating command runs in three phases: apply the local change,
//! issue the remote call, then confirm or compensate. Compensation is a
//! re-toggle for TOGGLE and a full reload for DELETE and EDIT. ADD makes no
//! optimistic change, so a failed ADD leaves nothing behind.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::api::TaskApi;
use crate::error::{ApiError, ApiResult, SyncResult};
use crate::extras::{merge_all, merge_task, purge_extras, save_extras, ExtrasStore, TaskExtras};
use crate::model::{CreateTask, NewTask, Task, UpdateTask};
use crate::store::{Command, TaskStore};

/// A signed-in user and the backend their commands reach.
#[derive(Clone)]
pub struct Session {
    user_id: String,
    api: Arc<dyn TaskApi>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, api: Arc<dyn TaskApi>) -> Self {
        Self {
            user_id: user_id.into(),
            api,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// How a dispatched command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Applied to local state only; nothing was sent.
    Local,
    /// The backend accepted the change.
    Confirmed,
    /// The backend rejected the change and local state was rolled back or reloaded.
    Compensated { reason: String },
}

impl SyncOutcome {
    pub fn is_compensated(&self) -> bool {
        matches!(self, SyncOutcome::Compensated { .. })
    }
}

/// One async mutex per task id, held from the optimistic step through compensation.
#[derive(Default)]
struct TaskLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TaskLocks {
    async fn acquire(&self, task_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(task_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct SyncEngine {
    store: Arc<TaskStore>,
    extras: Arc<dyn ExtrasStore>,
    session: Option<Session>,
    locks: TaskLocks,
}

impl SyncEngine {
    pub fn new(
        store: Arc<TaskStore>,
        extras: Arc<dyn ExtrasStore>,
        session: Option<Session>,
    ) -> Self {
        Self {
            store,
            extras,
            session,
            locks: TaskLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn extras(&self) -> &dyn ExtrasStore {
        self.extras.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Replace local tasks with the backend's list. Without a session this does nothing.
    pub async fn load(&self) -> SyncResult<SyncOutcome> {
        let Some(session) = &self.session else {
            return Ok(SyncOutcome::Local);
        };
        self.reload(session).await?;
        Ok(SyncOutcome::Confirmed)
    }

    pub async fn dispatch(&self, command: Command) -> SyncResult<SyncOutcome> {
        match &command {
            Command::Add(task) => task.validate()?,
            Command::Edit(task) => task.validate()?,
            Command::AddCustomCategory(category) => category.validate()?,
            _ => {}
        }

        let Some(session) = self.session.clone() else {
            self.store.dispatch(command);
            return Ok(SyncOutcome::Local);
        };

        match command {
            Command::Add(task) => {
                self.create(&session, task).await?;
                Ok(SyncOutcome::Confirmed)
            }
            Command::Toggle(id) => Ok(self.toggle(&session, id).await),
            Command::Delete(id) => Ok(self.delete(&session, id).await),
            Command::Edit(task) => Ok(self.edit(&session, task).await),
            local => {
                self.store.dispatch(local);
                Ok(SyncOutcome::Local)
            }
        }
    }

    /// ADD, returning the created task as it appears after the reload.
    ///
    /// Without a session the reducer ignores ADD and `None` is returned.
    pub async fn add(&self, task: NewTask) -> SyncResult<Option<Task>> {
        task.validate()?;
        let Some(session) = self.session.clone() else {
            self.store.dispatch(Command::Add(task));
            return Ok(None);
        };
        self.create(&session, task).await.map(Some)
    }

    async fn create(&self, session: &Session, task: NewTask) -> SyncResult<Task> {
        let request = CreateTask {
            title: task.title.clone(),
            description: task.description.clone(),
        };
        let created = session
            .api
            .create_task(&session.user_id, &request)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "create task failed");
                err
            })?;

        let id = created.id.to_string();
        save_extras(self.extras.as_ref(), &id, &TaskExtras::from(&task));
        tracing::debug!(task_id = id.as_str(), "task created");

        self.reload(session).await?;
        self.store.dispatch(Command::CloseModal);

        let merged = self
            .store
            .read(|state| state.task(&id).cloned())
            .unwrap_or_else(|| merge_task(&created, self.extras.as_ref()));
        Ok(merged)
    }

    async fn toggle(&self, session: &Session, id: String) -> SyncOutcome {
        let _guard = self.locks.acquire(&id).await;
        self.store.dispatch(Command::Toggle(id.clone()));

        match session.api.toggle_task(&session.user_id, &id).await {
            Ok(_) => SyncOutcome::Confirmed,
            Err(err) => {
                tracing::warn!(task_id = id.as_str(), error = %err, "toggle failed, reverting");
                self.store.dispatch(Command::Toggle(id));
                SyncOutcome::Compensated {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn delete(&self, session: &Session, id: String) -> SyncOutcome {
        let _guard = self.locks.acquire(&id).await;
        self.store.dispatch(Command::Delete(id.clone()));
        purge_extras(self.extras.as_ref(), &id);

        match session.api.delete_task(&session.user_id, &id).await {
            Ok(()) => SyncOutcome::Confirmed,
            Err(err) => {
                tracing::warn!(task_id = id.as_str(), error = %err, "delete failed, reloading");
                self.reconcile(session).await;
                SyncOutcome::Compensated {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn edit(&self, session: &Session, task: Task) -> SyncOutcome {
        let id = task.id.clone();
        let _guard = self.locks.acquire(&id).await;
        save_extras(self.extras.as_ref(), &id, &TaskExtras::from(&task));

        let had_description = self
            .store
            .read(|state| state.task(&id).map(|current| current.description.is_some()))
            .unwrap_or(false);
        // The backend keeps any omitted field, so a cleared description goes out as "".
        let description = match &task.description {
            Some(text) => Some(text.clone()),
            None if had_description => Some(String::new()),
            None => None,
        };
        let update = UpdateTask {
            title: Some(task.title.clone()),
            description,
        };
        self.store.dispatch(Command::Edit(task));

        match session.api.update_task(&session.user_id, &id, &update).await {
            Ok(_) => SyncOutcome::Confirmed,
            Err(err) => {
                tracing::warn!(task_id = id.as_str(), error = %err, "update failed, reloading");
                self.reconcile(session).await;
                SyncOutcome::Compensated {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn reload(&self, session: &Session) -> ApiResult<()> {
        let records = session.api.list_tasks(&session.user_id).await?;
        let tasks = merge_all(&records, self.extras.as_ref());
        tracing::debug!(count = tasks.len(), "tasks reloaded");
        self.store.dispatch(Command::SetTasks(tasks));
        Ok(())
    }

    /// Reload after a failed mutation. A failed reload leaves state as it is.
    async fn reconcile(&self, session: &Session) {
        if let Err(err) = self.reload(session).await {
            log_reload_failure(&err);
        }
    }
}

fn log_reload_failure(err: &ApiError) {
    tracing::warn!(error = %err, "reload after failed mutation also failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{InMemoryTaskApi, Operation};
    use crate::error::SyncError;
    use crate::extras::MemoryExtrasStore;
    use crate::model::{NewCategory, Priority};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const USER: &str = "user-1";

    struct Harness {
        api: Arc<InMemoryTaskApi>,
        extras: Arc<MemoryExtrasStore>,
        engine: SyncEngine,
    }

    fn online() -> Harness {
        let api = Arc::new(InMemoryTaskApi::new());
        let extras = Arc::new(MemoryExtrasStore::new());
        let engine = SyncEngine::new(
            Arc::new(TaskStore::new()),
            extras.clone(),
            Some(Session::new(USER, api.clone())),
        );
        Harness {
            api,
            extras,
            engine,
        }
    }

    fn titles(engine: &SyncEngine) -> Vec<String> {
        engine
            .store()
            .read(|state| state.tasks.iter().map(|t| t.title.clone()).collect())
    }

    fn completed(engine: &SyncEngine, id: &str) -> bool {
        engine
            .store()
            .read(|state| state.task(id).map(|t| t.completed))
            .expect("task present")
    }

    #[tokio::test]
    async fn load_merges_extras_into_backend_records() {
        let h = online();
        let record = h.api.seed(USER, "Audit", false);
        h.extras
            .save(
                &record.id.to_string(),
                &TaskExtras {
                    priority: Some(Priority::High),
                    ..TaskExtras::default()
                },
            )
            .unwrap();

        h.engine.load().await.expect("load");

        let task = h
            .engine
            .store()
            .read(|state| state.tasks[0].clone());
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.category, "work");
    }

    #[tokio::test]
    async fn add_creates_saves_extras_and_closes_modal() {
        let h = online();
        h.engine.store().dispatch(Command::OpenModal(None));

        let mut draft = NewTask::titled("Submit budget");
        draft.priority = Priority::High;
        draft.category = "personal".into();
        draft.due_date = NaiveDate::from_ymd_opt(2026, 2, 21);

        let created = h.engine.add(draft).await.expect("add").expect("task");

        assert_eq!(created.title, "Submit budget");
        assert_eq!(created.priority, Priority::High);
        assert_eq!(created.category, "personal");
        assert_eq!(h.api.calls(Operation::Create), 1);
        assert_eq!(h.api.calls(Operation::List), 1);
        assert!(h.extras.load(&created.id).unwrap().is_some());

        let state = h.engine.store().snapshot();
        assert!(!state.modal_open);
        assert_eq!(state.tasks.len(), 1);
    }

    #[tokio::test]
    async fn failed_add_commits_nothing() {
        let h = online();
        h.engine.store().dispatch(Command::OpenModal(None));
        h.api.fail_next(Operation::Create, 1);

        let result = h.engine.dispatch(Command::Add(NewTask::titled("Lost"))).await;

        assert!(matches!(result, Err(SyncError::Api(_))));
        let state = h.engine.store().snapshot();
        assert!(state.tasks.is_empty());
        assert!(state.modal_open);
        assert!(h.extras.is_empty());
        assert_eq!(h.api.calls(Operation::List), 0);

        let retried = h.engine.add(NewTask::titled("Lost")).await.expect("retry");
        assert!(retried.is_some());
    }

    #[tokio::test]
    async fn invalid_add_never_reaches_backend() {
        let h = online();
        let result = h.engine.dispatch(Command::Add(NewTask::titled("  "))).await;

        assert!(matches!(result, Err(SyncError::Validation(_))));
        assert_eq!(h.api.total_calls(), 0);
    }

    #[tokio::test]
    async fn toggle_confirms_or_reverts() {
        let h = online();
        let id = h.api.seed(USER, "Run", false).id.to_string();
        h.engine.load().await.unwrap();

        let outcome = h.engine.dispatch(Command::Toggle(id.clone())).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Confirmed);
        assert!(completed(&h.engine, &id));

        h.api.fail_next(Operation::Toggle, 1);
        let outcome = h.engine.dispatch(Command::Toggle(id.clone())).await.unwrap();
        assert!(outcome.is_compensated());
        assert!(completed(&h.engine, &id));
        assert!(h.api.records(USER)[0].completed);
    }

    #[tokio::test]
    async fn delete_purges_extras_even_when_backend_fails() {
        let h = online();
        let id = h.api.seed(USER, "Groceries", false).id.to_string();
        h.extras
            .save(
                &id,
                &TaskExtras {
                    priority: Some(Priority::Low),
                    ..TaskExtras::default()
                },
            )
            .unwrap();
        h.engine.load().await.unwrap();
        h.api.fail_next(Operation::Delete, 1);

        let outcome = h.engine.dispatch(Command::Delete(id.clone())).await.unwrap();

        assert!(outcome.is_compensated());
        assert!(h.extras.load(&id).unwrap().is_none());
        let restored = h
            .engine
            .store()
            .read(|state| state.task(&id).cloned())
            .expect("reloaded from backend");
        assert_eq!(restored.priority, Priority::Medium);
    }

    #[tokio::test]
    async fn delete_confirmed_removes_locally_and_remotely() {
        let h = online();
        let id = h.api.seed(USER, "Obsolete", false).id.to_string();
        h.engine.load().await.unwrap();

        let outcome = h.engine.dispatch(Command::Delete(id)).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Confirmed);
        assert!(titles(&h.engine).is_empty());
        assert!(h.api.records(USER).is_empty());
        assert_eq!(h.api.calls(Operation::List), 1);
    }

    #[tokio::test]
    async fn failed_edit_restores_server_truth_and_keeps_extras() {
        let h = online();
        let id = h.api.seed(USER, "A", false).id.to_string();
        h.engine.load().await.unwrap();
        h.api.fail_next(Operation::Update, 1);
        h.api.set_latency(Some(Duration::from_millis(50)));

        let mut edited = h.engine.store().read(|state| state.tasks[0].clone());
        edited.title = "B".into();
        edited.due_date = NaiveDate::from_ymd_opt(2026, 3, 1);

        let engine = Arc::new(h.engine);
        let mut updates = engine.store().subscribe();
        let handle = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.dispatch(Command::Edit(edited)).await })
        };

        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().tasks[0].title, "B");

        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.is_compensated());
        let task = engine.store().read(|state| state.task(&id).cloned()).unwrap();
        assert_eq!(task.title, "A");
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2026, 3, 1));
    }

    #[tokio::test]
    async fn edit_confirmed_updates_backend_title() {
        let h = online();
        h.api.seed(USER, "Draft", false);
        h.engine.load().await.unwrap();
        h.engine
            .store()
            .dispatch(Command::OpenModal(Some(h.engine.store().snapshot().tasks[0].clone())));

        let mut edited = h.engine.store().snapshot().tasks[0].clone();
        edited.title = "Final".into();
        let outcome = h.engine.dispatch(Command::Edit(edited)).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Confirmed);
        assert_eq!(h.api.records(USER)[0].title, "Final");
        assert!(!h.engine.store().snapshot().modal_open);
    }

    #[tokio::test]
    async fn edit_clearing_description_reaches_backend() {
        let h = online();
        let mut draft = NewTask::titled("Write notes");
        draft.description = Some("old notes".into());
        let created = h.engine.add(draft).await.unwrap().unwrap();

        let mut edited = created.clone();
        edited.description = None;
        let outcome = h.engine.dispatch(Command::Edit(edited)).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Confirmed);
        assert_eq!(h.api.records(USER)[0].description.as_deref(), Some(""));

        h.engine.load().await.unwrap();
        let reloaded = h.engine.store().read(|state| state.task(&created.id).cloned());
        assert_eq!(reloaded.and_then(|task| task.description), None);
    }

    #[tokio::test]
    async fn edit_without_description_leaves_it_out_of_the_update() {
        let h = online();
        h.api.seed(USER, "Plain", false);
        h.engine.load().await.unwrap();

        let mut edited = h.engine.store().snapshot().tasks[0].clone();
        edited.title = "Plainer".into();
        h.engine.dispatch(Command::Edit(edited)).await.unwrap();

        assert_eq!(h.api.records(USER)[0].description, None);
    }

    #[tokio::test]
    async fn offline_dispatch_only_touches_local_state() {
        let api = Arc::new(InMemoryTaskApi::new());
        let extras = Arc::new(MemoryExtrasStore::new());
        let store = Arc::new(TaskStore::new());
        let engine = SyncEngine::new(store.clone(), extras.clone(), None);

        let mut local = Task {
            id: "1".into(),
            title: "Local".into(),
            description: None,
            priority: Priority::Low,
            category: "work".into(),
            due_date: None,
            due_time: None,
            recurring: false,
            reminder: false,
            completed: false,
            created_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
        };
        store.dispatch(Command::SetTasks(vec![local.clone()]));

        assert_eq!(
            engine.dispatch(Command::Add(NewTask::titled("Ignored"))).await.unwrap(),
            SyncOutcome::Local
        );
        engine.dispatch(Command::Toggle("1".into())).await.unwrap();
        assert!(store.read(|s| s.tasks[0].completed));

        local.title = "Renamed".into();
        engine.dispatch(Command::Edit(local)).await.unwrap();
        assert_eq!(store.read(|s| s.tasks[0].title.clone()), "Renamed");

        engine.dispatch(Command::Delete("1".into())).await.unwrap();
        assert!(store.read(|s| s.tasks.is_empty()));

        assert_eq!(engine.load().await.unwrap(), SyncOutcome::Local);
        assert_eq!(api.total_calls(), 0);
        assert!(extras.is_empty());
    }

    #[tokio::test]
    async fn concurrent_toggles_on_one_task_are_serialized() {
        let h = online();
        let id = h.api.seed(USER, "Double", false).id.to_string();
        h.engine.load().await.unwrap();
        h.api.set_latency(Some(Duration::from_millis(20)));
        h.api.fail_next(Operation::Toggle, 1);

        let engine = Arc::new(h.engine);
        let first = {
            let engine = engine.clone();
            let id = id.clone();
            tokio::spawn(async move { engine.dispatch(Command::Toggle(id)).await })
        };
        let second = {
            let engine = engine.clone();
            let id = id.clone();
            tokio::spawn(async move { engine.dispatch(Command::Toggle(id)).await })
        };
        let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_compensated()).count(), 1);
        let backend = h.api.records(USER)[0].completed;
        assert_eq!(completed(&engine, &id), backend);
        assert!(backend);
    }

    #[tokio::test]
    async fn local_commands_pass_straight_to_reducer() {
        let h = online();
        let outcome = h
            .engine
            .dispatch(Command::AddCustomCategory(NewCategory {
                name: "Errands".into(),
                color: "#abc".into(),
            }))
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Local);
        assert_eq!(h.engine.store().snapshot().custom_categories.len(), 1);
        assert_eq!(h.api.total_calls(), 0);

        let invalid = h
            .engine
            .dispatch(Command::AddCustomCategory(NewCategory {
                name: "Bad".into(),
                color: "blue".into(),
            }))
            .await;
        assert!(matches!(invalid, Err(SyncError::Validation(_))));
    }
}
