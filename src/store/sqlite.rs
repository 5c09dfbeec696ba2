use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{ContextStore, StoreError};
use crate::models::MedicalContext;

/// Context store backed by a single SQLite connection. Each context is one
/// JSON row keyed by session id.
pub struct SqliteContextStore {
    conn: Mutex<Connection>,
}

impl SqliteContextStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Run all pending migrations
fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_context_store.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| StoreError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }
    Ok(())
}

/// Current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

impl ContextStore for SqliteContextStore {
    fn get(&self, session_id: Uuid) -> Result<Option<MedicalContext>, StoreError> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT context_json FROM session_contexts WHERE session_id = ?1",
            params![session_id.to_string()],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, session_id: Uuid, context: &MedicalContext) -> Result<(), StoreError> {
        let json = serde_json::to_string(context)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO session_contexts (session_id, context_json, urgency, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                context_json = excluded.context_json,
                urgency = excluded.urgency,
                updated_at = excluded.updated_at",
            params![
                session_id.to_string(),
                json,
                context.urgency.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn remove(&self, session_id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM session_contexts WHERE session_id = ?1",
            params![session_id.to_string()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HpiField, UrgencyLevel};

    #[test]
    fn round_trip_in_memory() {
        let store = SqliteContextStore::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        assert!(store.get(id).unwrap().is_none());

        let mut ctx = MedicalContext::new();
        ctx.hpi.record(HpiField::Duration, "2 days");
        ctx.escalate(UrgencyLevel::Emergency);
        store.put(id, &ctx).unwrap();
        assert_eq!(store.get(id).unwrap(), Some(ctx.clone()));

        ctx.turns = 3;
        store.put(id, &ctx).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().turns, 3);

        store.remove(id).unwrap();
        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn migration_idempotent() {
        let store = SqliteContextStore::open_in_memory().unwrap();
        let conn = store.conn().unwrap();
        assert!(run_migrations(&conn).is_ok());
        assert_eq!(get_current_version(&conn), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contexts.db");
        let id = Uuid::new_v4();
        {
            let store = SqliteContextStore::open(&path).unwrap();
            store.put(id, &MedicalContext::new()).unwrap();
        }
        let store = SqliteContextStore::open(&path).unwrap();
        assert!(store.get(id).unwrap().is_some());
    }
}
