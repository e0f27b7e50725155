//! Data structures shared across the Atrium subsystems.

pub mod access;
pub mod kind;
pub mod principal;

pub use access::AccessLevel;
pub use kind::{FieldSpec, FieldType, KindDescriptor, KindTraits, PermissionReference, RelationSpec};
pub use principal::{Principal, SystemPrincipals, TeamMembership};
