//! The resource seam between the permission engine and record storage.
//!
//! The engine never touches record storage directly. Whatever owns the
//! records (the entity pipeline's store, or a database driver) implements
//! [`ResourceResolver`], handing the engine just the facts a permission
//! decision needs: ownership, tombstone state, and the declared
//! permission references with their current targets.

use atrium_core::id::{RecordId, TeamId, UserId};
use atrium_core::types::KindDescriptor;

/// The permission-relevant facts about one record.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceFacts {
    /// Entity kind of the record.
    pub kind: String,
    /// Record identifier.
    pub id: RecordId,
    /// Who created the record.
    pub created_by: UserId,
    /// Direct owner, when the kind is user-owned.
    pub user_id: Option<UserId>,
    /// Owning team, when the kind is team-owned.
    pub team_id: Option<TeamId>,
    /// Whether the record is soft-deleted.
    pub deleted: bool,
    /// Current targets of the declared permission references:
    /// `(reference name, target kind, target id)`. Unpopulated
    /// references carry `None`.
    pub references: Vec<(String, String, Option<RecordId>)>,
}

/// Read-only access to records and kind descriptors for permission
/// evaluation.
pub trait ResourceResolver: Send + Sync {
    /// Fetch the facts for a record, including soft-deleted ones.
    /// Returns `None` when no such record exists at all.
    fn resource(&self, kind: &str, id: RecordId) -> Option<ResourceFacts>;

    /// Fetch the descriptor for a kind, if registered.
    fn descriptor(&self, kind: &str) -> Option<KindDescriptor>;
}
