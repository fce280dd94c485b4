//! Side-store for the task fields the backend does not persist.
//!
//! Priority, category, due date/time and the recurring/reminder flags live
//! here, keyed by the backend task id. [`merge_task`] is the only place a
//! backend record becomes a client [`Task`].

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::model::{clock_time, BackendTask, NewTask, Priority, Task, DEFAULT_CATEGORY};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "clock_time"
    )]
    pub due_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<bool>,
}

impl From<&Task> for TaskExtras {
    fn from(task: &Task) -> Self {
        Self {
            priority: Some(task.priority),
            category: Some(task.category.clone()),
            due_date: task.due_date,
            due_time: task.due_time,
            recurring: Some(task.recurring),
            reminder: Some(task.reminder),
        }
    }
}

impl From<&NewTask> for TaskExtras {
    fn from(task: &NewTask) -> Self {
        Self {
            priority: Some(task.priority),
            category: Some(task.category.clone()),
            due_date: task.due_date,
            due_time: task.due_time,
            recurring: Some(task.recurring),
            reminder: Some(task.reminder),
        }
    }
}

/// Key-value storage for [`TaskExtras`], one entry per task id.
pub trait ExtrasStore: Send + Sync {
    fn load(&self, task_id: &str) -> StorageResult<Option<TaskExtras>>;
    fn save(&self, task_id: &str, extras: &TaskExtras) -> StorageResult<()>;
    fn remove(&self, task_id: &str) -> StorageResult<()>;
}

/// Session-scoped store, used when nothing should touch disk.
#[derive(Debug, Default)]
pub struct MemoryExtrasStore {
    entries: Mutex<HashMap<String, TaskExtras>>,
}

impl MemoryExtrasStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ExtrasStore for MemoryExtrasStore {
    fn load(&self, task_id: &str) -> StorageResult<Option<TaskExtras>> {
        Ok(self.entries.lock().get(task_id).cloned())
    }

    fn save(&self, task_id: &str, extras: &TaskExtras) -> StorageResult<()> {
        self.entries
            .lock()
            .insert(task_id.to_string(), extras.clone());
        Ok(())
    }

    fn remove(&self, task_id: &str) -> StorageResult<()> {
        self.entries.lock().remove(task_id);
        Ok(())
    }
}

/// Persist extras, logging and swallowing storage failures.
pub fn save_extras(store: &dyn ExtrasStore, task_id: &str, extras: &TaskExtras) {
    if let Err(err) = store.save(task_id, extras) {
        tracing::warn!(task_id, error = %err, "failed to persist task extras");
    }
}

/// Drop the extras for a task, logging and swallowing storage failures.
pub fn purge_extras(store: &dyn ExtrasStore, task_id: &str) {
    if let Err(err) = store.remove(task_id) {
        tracing::warn!(task_id, error = %err, "failed to purge task extras");
    }
}

/// Map a backend record into a client task, overlaying stored extras on the defaults.
pub fn merge_task(record: &BackendTask, store: &dyn ExtrasStore) -> Task {
    let id = record.id.to_string();
    let extras = match store.load(&id) {
        Ok(extras) => extras.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(task_id = id.as_str(), error = %err, "failed to read task extras");
            TaskExtras::default()
        }
    };

    Task {
        title: record.title.clone(),
        description: record
            .description
            .clone()
            .filter(|text| !text.trim().is_empty()),
        priority: extras.priority.unwrap_or_default(),
        category: extras
            .category
            .filter(|category| !category.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        due_date: extras.due_date,
        due_time: extras.due_time,
        recurring: extras.recurring.unwrap_or(false),
        reminder: extras.reminder.unwrap_or(false),
        completed: record.completed,
        created_at: record.created_or_fallback(),
        id,
    }
}

pub fn merge_all(records: &[BackendTask], store: &dyn ExtrasStore) -> Vec<Task> {
    records
        .iter()
        .map(|record| merge_task(record, store))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use pretty_assertions::assert_eq;

    fn record(id: i64, title: &str) -> BackendTask {
        BackendTask {
            id,
            user_id: Some("u1".into()),
            title: title.into(),
            description: None,
            completed: false,
            created_at: None,
            updated_at: None,
        }
    }

    struct BrokenStore;

    impl ExtrasStore for BrokenStore {
        fn load(&self, _task_id: &str) -> StorageResult<Option<TaskExtras>> {
            Err(StorageError::Json(
                serde_json::from_str::<TaskExtras>("{").unwrap_err(),
            ))
        }

        fn save(&self, _task_id: &str, _extras: &TaskExtras) -> StorageResult<()> {
            Err(StorageError::Json(
                serde_json::from_str::<TaskExtras>("{").unwrap_err(),
            ))
        }

        fn remove(&self, _task_id: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    #[test]
    fn merge_applies_defaults_without_extras() {
        let store = MemoryExtrasStore::new();
        let task = merge_task(&record(3, "Plain"), &store);

        assert_eq!(task.id, "3");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, "work");
        assert_eq!(task.due_date, None);
        assert!(!task.recurring);
        assert!(!task.reminder);
    }

    #[test]
    fn merge_overlays_stored_extras() {
        let store = MemoryExtrasStore::new();
        let extras = TaskExtras {
            priority: Some(Priority::High),
            category: Some("health".into()),
            due_date: NaiveDate::from_ymd_opt(2026, 2, 21),
            due_time: NaiveTime::from_hms_opt(7, 30, 0),
            recurring: Some(true),
            reminder: None,
        };
        store.save("8", &extras).unwrap();

        let task = merge_task(&record(8, "Yoga"), &store);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.category, "health");
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2026, 2, 21));
        assert_eq!(task.due_time, NaiveTime::from_hms_opt(7, 30, 0));
        assert!(task.recurring);
        assert!(!task.reminder);
    }

    #[test]
    fn merge_is_idempotent() {
        let store = MemoryExtrasStore::new();
        store
            .save(
                "4",
                &TaskExtras {
                    priority: Some(Priority::Low),
                    ..TaskExtras::default()
                },
            )
            .unwrap();
        let backend = record(4, "Budget");

        assert_eq!(merge_task(&backend, &store), merge_task(&backend, &store));
    }

    #[test]
    fn unreadable_store_falls_back_to_defaults() {
        let task = merge_task(&record(1, "Anything"), &BrokenStore);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, "work");

        save_extras(&BrokenStore, "1", &TaskExtras::default());
    }

    #[test]
    fn extras_round_trip_through_json_with_short_times() {
        let extras = TaskExtras {
            due_time: NaiveTime::from_hms_opt(9, 5, 0),
            ..TaskExtras::default()
        };
        let json = serde_json::to_string(&extras).unwrap();
        assert_eq!(json, r#"{"dueTime":"09:05"}"#);
    }
}
