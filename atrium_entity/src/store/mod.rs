//! Record storage and the session abstraction.
//!
//! Every pipeline operation runs inside a session: writes are staged
//! and become visible to other readers only on commit. When the caller
//! supplies a session the pipeline joins it and leaves commit to the
//! outermost owner; otherwise the pipeline owns the session and
//! commits or rolls back itself.

mod memory;

pub use memory::InMemoryEntityStore;

use atrium_core::error::Result;
use atrium_core::id::RecordId;

use crate::record::EntityRecord;

/// A unit-of-work over record storage.
///
/// Reads observe committed state plus the session's own staged writes.
pub trait StoreSession: Send {
    /// Fetch one record, including soft-deleted ones.
    fn get(&self, kind: &str, id: RecordId) -> Option<EntityRecord>;

    /// Stage an insert. Fails with a conflict when the id exists.
    fn insert(&mut self, record: EntityRecord) -> Result<()>;

    /// Stage an update of an existing record.
    fn update(&mut self, record: EntityRecord) -> Result<()>;

    /// All records of one kind, committed plus staged.
    fn list(&self, kind: &str) -> Vec<EntityRecord>;

    /// Apply every staged write atomically.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every staged write.
    fn rollback(self: Box<Self>);
}

/// Record storage: committed reads plus session creation.
pub trait EntityStore: Send + Sync {
    /// Open a new session.
    fn begin(&self) -> Box<dyn StoreSession>;

    /// Read one committed record, including soft-deleted ones.
    fn fetch(&self, kind: &str, id: RecordId) -> Option<EntityRecord>;

    /// All committed records of one kind.
    fn fetch_kind(&self, kind: &str) -> Vec<EntityRecord>;
}

/// A shareable handle over one session.
///
/// The pipeline joins a caller-supplied handle instead of opening its
/// own session; commit stays with the outermost owner. Once rolled
/// back, a handle refuses further work, mirroring a poisoned database
/// transaction.
#[derive(Clone)]
pub struct SessionHandle {
    inner: std::sync::Arc<parking_lot::Mutex<Option<Box<dyn StoreSession>>>>,
}

impl SessionHandle {
    /// Open a new session on the store.
    pub fn new(store: &dyn EntityStore) -> Self {
        Self {
            inner: std::sync::Arc::new(parking_lot::Mutex::new(Some(store.begin()))),
        }
    }

    /// Run a closure against the live session.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut dyn StoreSession) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.inner.lock();
        match guard.as_mut() {
            Some(session) => f(session.as_mut()),
            None => Err(atrium_core::error::EntityError::PreconditionFailed(
                "session already committed or rolled back".into(),
            )
            .into()),
        }
    }

    /// Commit every staged write and close the handle.
    pub fn commit(&self) -> Result<()> {
        match self.inner.lock().take() {
            Some(session) => session.commit(),
            None => Err(atrium_core::error::EntityError::PreconditionFailed(
                "session already committed or rolled back".into(),
            )
            .into()),
        }
    }

    /// Discard every staged write and close the handle. Idempotent.
    pub fn rollback(&self) {
        if let Some(session) = self.inner.lock().take() {
            session.rollback();
        }
    }

    /// Whether the handle still owns a live session.
    pub fn is_open(&self) -> bool {
        self.inner.lock().is_some()
    }
}
