use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{named_params, Connection, OptionalExtension};

use crate::config::AppConfig;
use crate::error::{StorageError, StorageResult};
use crate::extras::{ExtrasStore, TaskExtras};

const SCHEMA_VERSION: &str = "1";

/// SQLite-backed extras store living in the data directory.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn initialize(config: &AppConfig) -> StorageResult<Self> {
        let conn = Connection::open(config.db_path()).map_err(|source| StorageError::Open {
            path: config.db_path().display().to_string(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.apply_migrations()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> StorageResult<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Ids of every task that currently has extras stored.
    #[cfg(test)]
    pub(crate) fn stored_ids(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT task_id FROM task_extras ORDER BY task_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn apply_migrations(&self) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT);
             CREATE TABLE IF NOT EXISTS task_extras (
                task_id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );",
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', :version)",
            named_params![":version": SCHEMA_VERSION],
        )?;
        Ok(())
    }
}

impl ExtrasStore for Database {
    fn load(&self, task_id: &str) -> StorageResult<Option<TaskExtras>> {
        let conn = self.conn.lock();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM task_extras WHERE task_id = :id",
                named_params![":id": task_id],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|raw| serde_json::from_str(&raw).map_err(StorageError::from))
            .transpose()
    }

    fn save(&self, task_id: &str, extras: &TaskExtras) -> StorageResult<()> {
        let payload = serde_json::to_string(extras)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO task_extras (task_id, payload, updated_at)
             VALUES (:id, :payload, :updated)
             ON CONFLICT(task_id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            named_params![
                ":id": task_id,
                ":payload": payload,
                ":updated": Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn remove(&self, task_id: &str) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM task_extras WHERE task_id = :id",
            named_params![":id": task_id],
        )?;
        Ok(())
    }
}
