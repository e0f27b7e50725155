//! Managed entity records.
//!
//! A record is the engine's storage-neutral row: fixed audit and
//! ownership columns plus a JSON attribute bag validated against the
//! kind descriptor. Drafts and patches are the write-side counterparts
//! used by create and update.

use atrium_core::id::{RecordId, TeamId, UserId};
use atrium_core::types::KindDescriptor;
use atrium_permission::ResourceFacts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// One managed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Unique identifier.
    pub id: RecordId,
    /// Entity kind.
    pub kind: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Who created the record.
    pub created_by: UserId,
    /// When the record was last updated, if ever.
    pub updated_at: Option<DateTime<Utc>>,
    /// Who last updated the record.
    pub updated_by: Option<UserId>,
    /// Tombstone instant; a set value soft-deletes the record.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Who soft-deleted the record.
    pub deleted_by: Option<UserId>,
    /// Direct owner, for user-owned kinds.
    pub user_id: Option<UserId>,
    /// Owning team, for team-owned kinds.
    pub team_id: Option<TeamId>,
    /// Parent record, for parented kinds.
    pub parent_id: Option<RecordId>,
    /// Declared payload fields.
    pub attributes: Map<String, Value>,
}

impl EntityRecord {
    /// Whether the record is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Read one attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Read an attribute holding a record id (reference fields store the
    /// target as a UUID string).
    pub fn reference_target(&self, field: &str) -> Option<RecordId> {
        match self.attributes.get(field) {
            Some(Value::String(s)) => RecordId::from_str(s).ok(),
            _ => None,
        }
    }

    /// Extract the permission-relevant facts for this record.
    pub fn facts(&self, descriptor: &KindDescriptor) -> ResourceFacts {
        let references = descriptor
            .permission_references
            .iter()
            .map(|r| {
                (
                    r.name.clone(),
                    r.target_kind.clone(),
                    self.reference_target(&r.id_field()),
                )
            })
            .collect();
        ResourceFacts {
            kind: self.kind.clone(),
            id: self.id,
            created_by: self.created_by,
            user_id: self.user_id,
            team_id: self.team_id,
            deleted: self.is_deleted(),
            references,
        }
    }

    /// Reduce the attribute bag to a whitelist of fields. The fixed
    /// columns are untouched; callers validate the whitelist first.
    pub fn project(&self, fields: &[String]) -> EntityRecord {
        if fields.is_empty() {
            return self.clone();
        }
        let mut projected = self.clone();
        projected.attributes = self
            .attributes
            .iter()
            .filter(|(name, _)| fields.iter().any(|f| f == *name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        projected
    }
}

/// Payload for creating a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Explicit identifier; used by the seeder to make inserts
    /// idempotent. Defaults to a fresh random id.
    #[serde(default)]
    pub id: Option<RecordId>,
    /// Direct owner override; defaults to the manager's target user for
    /// user-owned kinds.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Owning team override; defaults to the manager's target team for
    /// team-owned kinds.
    #[serde(default)]
    pub team_id: Option<TeamId>,
    /// Parent record, for parented kinds.
    #[serde(default)]
    pub parent_id: Option<RecordId>,
    /// Declared payload fields.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Draft {
    /// Start an empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one attribute.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Point a reference field at a record.
    pub fn reference(mut self, field: impl Into<String>, target: RecordId) -> Self {
        self.attributes
            .insert(field.into(), Value::String(target.to_string()));
        self
    }

    /// Own the draft record directly.
    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Own the draft record through a team.
    pub fn in_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    /// Pin the record id, for idempotent seeding.
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Payload for updating a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Attributes to overwrite; absent attributes are left alone.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Optional optimistic-concurrency guard: the update only applies if
    /// the record's `updated_at` still matches.
    #[serde(default)]
    pub expected_updated_at: Option<DateTime<Utc>>,
}

impl Patch {
    /// Start an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one attribute.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Guard the update on the record's current `updated_at`.
    pub fn expecting(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.expected_updated_at = updated_at;
        self
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::types::{FieldSpec, FieldType, PermissionReference};

    fn record() -> EntityRecord {
        let mut attributes = Map::new();
        attributes.insert("name".into(), Value::String("alpha".into()));
        attributes.insert("budget".into(), Value::from(12));
        EntityRecord {
            id: RecordId::new(),
            kind: "project".into(),
            created_at: Utc::now(),
            created_by: UserId::new(),
            updated_at: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
            user_id: None,
            team_id: None,
            parent_id: None,
            attributes,
        }
    }

    #[test]
    fn test_projection_keeps_whitelisted_attributes() {
        let record = record();
        let projected = record.project(&["name".to_string()]);
        assert_eq!(projected.attributes.len(), 1);
        assert!(projected.attribute("name").is_some());
        assert!(projected.attribute("budget").is_none());
        // Fixed columns survive projection.
        assert_eq!(projected.id, record.id);
    }

    #[test]
    fn test_facts_extract_reference_targets() {
        let target = RecordId::new();
        let mut record = record();
        record.kind = "conversation".into();
        record
            .attributes
            .insert("project_id".into(), Value::String(target.to_string()));

        let descriptor = KindDescriptor::new("conversation")
            .with_field(FieldSpec::required("name", FieldType::String))
            .with_reference(PermissionReference::new("project", "project"));

        let facts = record.facts(&descriptor);
        assert_eq!(
            facts.references,
            vec![("project".to_string(), "project".to_string(), Some(target))]
        );
    }

    #[test]
    fn test_draft_builder() {
        let target = RecordId::new();
        let draft = Draft::new()
            .set("name", "alpha")
            .reference("project_id", target);
        assert_eq!(
            draft.attributes.get("name"),
            Some(&Value::String("alpha".into()))
        );
        assert_eq!(
            draft.attributes.get("project_id"),
            Some(&Value::String(target.to_string()))
        );
    }
}
