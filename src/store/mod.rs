//! Persistence of per-session medical context.

pub mod sqlite;

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;
use uuid::Uuid;

use crate::models::MedicalContext;

pub use sqlite::SqliteContextStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Where session contexts live between turns.
pub trait ContextStore: Send + Sync {
    fn get(&self, session_id: Uuid) -> Result<Option<MedicalContext>, StoreError>;
    fn put(&self, session_id: Uuid, context: &MedicalContext) -> Result<(), StoreError>;
    fn remove(&self, session_id: Uuid) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryContextStore {
    contexts: RwLock<HashMap<Uuid, MedicalContext>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contexts.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContextStore for InMemoryContextStore {
    fn get(&self, session_id: Uuid) -> Result<Option<MedicalContext>, StoreError> {
        let contexts = self.contexts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(contexts.get(&session_id).cloned())
    }

    fn put(&self, session_id: Uuid, context: &MedicalContext) -> Result<(), StoreError> {
        let mut contexts = self.contexts.write().map_err(|_| StoreError::LockPoisoned)?;
        contexts.insert(session_id, context.clone());
        Ok(())
    }

    fn remove(&self, session_id: Uuid) -> Result<(), StoreError> {
        let mut contexts = self.contexts.write().map_err(|_| StoreError::LockPoisoned)?;
        contexts.remove(&session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UrgencyLevel;

    #[test]
    fn in_memory_round_trip() {
        let store = InMemoryContextStore::new();
        let id = Uuid::new_v4();
        assert!(store.get(id).unwrap().is_none());

        let mut ctx = MedicalContext::new();
        ctx.escalate(UrgencyLevel::Urgent);
        store.put(id, &ctx).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().urgency, UrgencyLevel::Urgent);
        assert_eq!(store.len(), 1);

        store.remove(id).unwrap();
        assert!(store.is_empty());
    }
}
