//! In-memory entity store with staged-write sessions.

use atrium_core::error::{EntityError, Result};
use atrium_core::id::RecordId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use super::{EntityStore, StoreSession};
use crate::record::EntityRecord;

type RecordKey = (String, RecordId);

/// An in-memory entity store.
///
/// Commits take the write lock once and apply every staged write in one
/// step, so concurrent readers never observe a half-applied session.
#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
    records: Arc<RwLock<HashMap<RecordKey, EntityRecord>>>,
}

impl InMemoryEntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records across all kinds.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no committed records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl EntityStore for InMemoryEntityStore {
    fn begin(&self) -> Box<dyn StoreSession> {
        Box::new(MemorySession {
            base: self.records.clone(),
            staged: HashMap::new(),
        })
    }

    fn fetch(&self, kind: &str, id: RecordId) -> Option<EntityRecord> {
        self.records.read().get(&(kind.to_string(), id)).cloned()
    }

    fn fetch_kind(&self, kind: &str) -> Vec<EntityRecord> {
        self.records
            .read()
            .iter()
            .filter(|((k, _), _)| k == kind)
            .map(|(_, record)| record.clone())
            .collect()
    }
}

struct MemorySession {
    base: Arc<RwLock<HashMap<RecordKey, EntityRecord>>>,
    staged: HashMap<RecordKey, EntityRecord>,
}

impl StoreSession for MemorySession {
    fn get(&self, kind: &str, id: RecordId) -> Option<EntityRecord> {
        let key = (kind.to_string(), id);
        if let Some(record) = self.staged.get(&key) {
            return Some(record.clone());
        }
        self.base.read().get(&key).cloned()
    }

    fn insert(&mut self, record: EntityRecord) -> Result<()> {
        let key = (record.kind.clone(), record.id);
        if self.staged.contains_key(&key) || self.base.read().contains_key(&key) {
            return Err(EntityError::Conflict(format!(
                "{} {} already exists",
                record.kind, record.id
            ))
            .into());
        }
        self.staged.insert(key, record);
        Ok(())
    }

    fn update(&mut self, record: EntityRecord) -> Result<()> {
        let key = (record.kind.clone(), record.id);
        if !self.staged.contains_key(&key) && !self.base.read().contains_key(&key) {
            return Err(EntityError::NotFound {
                kind: record.kind.clone(),
                id: record.id,
            }
            .into());
        }
        self.staged.insert(key, record);
        Ok(())
    }

    fn list(&self, kind: &str) -> Vec<EntityRecord> {
        let mut records: HashMap<RecordKey, EntityRecord> = self
            .base
            .read()
            .iter()
            .filter(|((k, _), _)| k == kind)
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();
        for (key, record) in &self.staged {
            if key.0 == kind {
                records.insert(key.clone(), record.clone());
            }
        }
        records.into_values().collect()
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let staged = self.staged.len();
        let mut base = self.base.write();
        for (key, record) in self.staged {
            base.insert(key, record);
        }
        trace!(writes = staged, "session committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        trace!(writes = self.staged.len(), "session rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::id::UserId;
    use chrono::Utc;

    fn record(kind: &str) -> EntityRecord {
        EntityRecord {
            id: RecordId::new(),
            kind: kind.to_string(),
            created_at: Utc::now(),
            created_by: UserId::new(),
            updated_at: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
            user_id: None,
            team_id: None,
            parent_id: None,
            attributes: Default::default(),
        }
    }

    #[test]
    fn test_staged_writes_invisible_until_commit() {
        let store = InMemoryEntityStore::new();
        let r = record("project");

        let mut session = store.begin();
        session.insert(r.clone()).unwrap();

        // Visible inside the session, not outside.
        assert!(session.get("project", r.id).is_some());
        assert!(store.fetch("project", r.id).is_none());

        session.commit().unwrap();
        assert!(store.fetch("project", r.id).is_some());
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let store = InMemoryEntityStore::new();
        let r = record("project");

        let mut session = store.begin();
        session.insert(r.clone()).unwrap();
        session.rollback();

        assert!(store.fetch("project", r.id).is_none());
    }

    #[test]
    fn test_insert_conflicts_on_existing_id() {
        let store = InMemoryEntityStore::new();
        let r = record("project");

        let mut session = store.begin();
        session.insert(r.clone()).unwrap();
        session.commit().unwrap();

        let mut second = store.begin();
        assert!(second.insert(r).is_err());
    }

    #[test]
    fn test_update_requires_existing_record() {
        let store = InMemoryEntityStore::new();
        let r = record("project");

        let mut session = store.begin();
        assert!(session.update(r.clone()).is_err());
        session.insert(r.clone()).unwrap();

        let mut changed = r.clone();
        changed.attributes.insert("name".into(), "x".into());
        session.update(changed).unwrap();
        session.commit().unwrap();

        let fetched = store.fetch("project", r.id).unwrap();
        assert_eq!(fetched.attributes.get("name"), Some(&"x".into()));
    }

    #[test]
    fn test_list_merges_staged_over_committed() {
        let store = InMemoryEntityStore::new();
        let a = record("project");
        let mut session = store.begin();
        session.insert(a.clone()).unwrap();
        session.commit().unwrap();

        let mut session = store.begin();
        let b = record("project");
        session.insert(b).unwrap();
        assert_eq!(session.list("project").len(), 2);
        assert_eq!(store.fetch_kind("project").len(), 1);
    }
}
