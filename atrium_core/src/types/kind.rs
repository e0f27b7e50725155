//! Declarative entity-kind descriptors.
//!
//! An entity kind is described by a flat record of traits and fields
//! rather than an inheritance chain: the pipeline inspects the descriptor
//! directly to decide which audit columns exist, whether soft delete
//! applies, who can own the record, and which foreign keys participate in
//! permission inheritance.

use serde::{Deserialize, Serialize};

/// Value type of a declared field, used to validate search clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 text.
    String,
    /// Integer or float.
    Number,
    /// Boolean flag.
    Boolean,
    /// Instant or calendar date.
    Date,
    /// Foreign key to another record.
    Reference,
}

/// One declared field of an entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Value type.
    pub field_type: FieldType,
    /// Whether creation requires the field.
    pub required: bool,
}

impl FieldSpec {
    /// Declare a required field.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Declare an optional field.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }
}

/// Composable traits a kind can carry.
///
/// Every kind has `id`, `created_at`, and `created_by`; the flags below
/// add the optional column groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindTraits {
    /// `updated_at` / `updated_by` stamping on mutation.
    pub update_audit: bool,
    /// `deleted_at` / `deleted_by` tombstones instead of hard deletes.
    pub soft_delete: bool,
    /// A direct `user_id` owner column.
    pub user_owned: bool,
    /// A `team_id` owner column.
    pub team_owned: bool,
    /// A self-referencing `parent_id` column.
    pub parent: bool,
}

/// A relation eligible for eager inclusion: child records of
/// `target_kind` whose `foreign_key` field points back at the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSpec {
    /// Relation name used in `include` requests.
    pub name: String,
    /// Kind of the related records.
    pub target_kind: String,
    /// Field on the related records holding this record's id.
    pub foreign_key: String,
}

impl RelationSpec {
    /// Declare a relation.
    pub fn new(
        name: impl Into<String>,
        target_kind: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_kind: target_kind.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

/// A declared permission reference: a named foreign key whose target's
/// access contributes to this kind's access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionReference {
    /// Reference name; the owning record stores the target id in the
    /// `<name>_id` field.
    pub name: String,
    /// Kind of the referenced entity.
    pub target_kind: String,
}

impl PermissionReference {
    /// Declare a reference.
    pub fn new(name: impl Into<String>, target_kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_kind: target_kind.into(),
        }
    }

    /// The field on the owning record that stores the target id.
    pub fn id_field(&self) -> String {
        format!("{}_id", self.name)
    }
}

/// Full description of one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindDescriptor {
    /// Kind name (snake case, unique per process).
    pub kind: String,
    /// System kinds are only mutable by root/system.
    pub system: bool,
    /// Optional column groups.
    pub traits: KindTraits,
    /// Declared payload fields.
    pub fields: Vec<FieldSpec>,
    /// Relations valid in `include` requests.
    pub relations: Vec<RelationSpec>,
    /// Foreign keys participating in permission inheritance.
    pub permission_references: Vec<PermissionReference>,
    /// The single reference whose access governs creation. Must name one
    /// of `permission_references`; defaulted to the sole reference when
    /// exactly one is declared.
    pub create_permission_reference: Option<String>,
}

impl KindDescriptor {
    /// Start a descriptor for the named kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            system: false,
            traits: KindTraits::default(),
            fields: Vec::new(),
            relations: Vec::new(),
            permission_references: Vec::new(),
            create_permission_reference: None,
        }
    }

    /// Mark the kind as a system kind.
    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    /// Set the optional column groups.
    pub fn with_traits(mut self, traits: KindTraits) -> Self {
        self.traits = traits;
        self
    }

    /// Declare a payload field.
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare a relation valid for eager inclusion.
    pub fn with_relation(mut self, relation: RelationSpec) -> Self {
        self.relations.push(relation);
        self
    }

    /// Declare a permission reference.
    pub fn with_reference(mut self, reference: PermissionReference) -> Self {
        self.permission_references.push(reference);
        self
    }

    /// Name the reference that governs creation.
    pub fn with_create_reference(mut self, name: impl Into<String>) -> Self {
        self.create_permission_reference = Some(name.into());
        self
    }

    /// Look up a declared field.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a declared permission reference.
    pub fn reference(&self, name: &str) -> Option<&PermissionReference> {
        self.permission_references.iter().find(|r| r.name == name)
    }

    /// Look up a declared relation.
    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// The effective create-permission reference.
    ///
    /// Falls back to the sole declared reference when none is named; a
    /// kind with several references and no explicit choice has no create
    /// reference and fails validation.
    pub fn effective_create_reference(&self) -> Option<&PermissionReference> {
        match &self.create_permission_reference {
            Some(name) => self.reference(name),
            None if self.permission_references.len() == 1 => self.permission_references.first(),
            None => None,
        }
    }

    /// Whether `name` is a valid field for projection or search, taking
    /// the trait-driven columns into account.
    pub fn is_projectable(&self, name: &str) -> bool {
        if matches!(name, "id" | "created_at" | "created_by") {
            return true;
        }
        if self.traits.update_audit && matches!(name, "updated_at" | "updated_by") {
            return true;
        }
        if self.traits.soft_delete && matches!(name, "deleted_at" | "deleted_by") {
            return true;
        }
        if self.traits.user_owned && name == "user_id" {
            return true;
        }
        if self.traits.team_owned && name == "team_id" {
            return true;
        }
        if self.traits.parent && name == "parent_id" {
            return true;
        }
        if self.field(name).is_some() {
            return true;
        }
        self.permission_references
            .iter()
            .any(|r| r.id_field() == name)
    }

    /// Validate internal consistency.
    ///
    /// Checks that the create-permission reference, when named, is one of
    /// the declared references, and that kinds with several references
    /// name one.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.create_permission_reference {
            if self.reference(name).is_none() {
                return Err(format!(
                    "create_permission_reference '{}' is not a declared reference of '{}'",
                    name, self.kind
                ));
            }
        } else if self.permission_references.len() > 1 {
            return Err(format!(
                "kind '{}' declares multiple permission references but no create_permission_reference",
                self.kind
            ));
        }
        Ok(())
    }
}
