pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod dates;
pub mod error;
pub mod extras;
pub mod model;
pub mod services;
pub mod store;
pub mod sync;

pub use analytics::{tasks_by_day, CategoryStats, TaskSummary};
pub use api::{HttpTaskApi, InMemoryTaskApi, TaskApi};
pub use config::{AppConfig, ConfigOverrides, TokenSource};
pub use database::Database;
pub use error::{ApiError, StorageError, SyncError, ValidationError};
pub use extras::{ExtrasStore, MemoryExtrasStore, TaskExtras};
pub use model::*;
pub use services::{TaskChange, TasksService, ViewSnapshot};
pub use store::{reduce, Command, TaskState, TaskStore};
pub use sync::{Session, SyncEngine, SyncOutcome};
