//! # Atrium Core
//!
//! `atrium_core` provides the fundamental building blocks for the Atrium
//! entity-management engine: error types, strongly-typed identifiers,
//! access levels, the distinguished system principals, declarative
//! entity-kind descriptors, and version utilities.
//!
//! ## Architectural principles
//!
//! 1. **Reference-aware permissions**: access to a record can come from
//!    ownership, team membership, explicit grants, or be inherited
//!    through declared permission references to other records.
//!
//! 2. **Descriptors over inheritance**: entity kinds are described by a
//!    flat record of traits (audit, soft delete, owners, parent) that the
//!    pipeline inspects directly; there are no mixin chains and no
//!    virtual dispatch in the data model.
//!
//! 3. **Three distinguished principals**: root bypasses every check,
//!    system may mutate system-flagged kinds, and template owns records
//!    readable by everyone.
//!
//! ## Crate structure
//!
//! - **error**: the error hierarchy for all Atrium components
//! - **id**: strongly-typed identifier types and the reserved seed range
//! - **types**: access levels, principals, kind descriptors
//! - **utils**: semantic versions and version requirements

pub mod error;
pub mod id;
pub mod types;
pub mod utils;

pub use error::{
    ConfigError, EntityError, Error, ExtensionError, PermissionError, Result, SeedError,
    ServiceError,
};
pub use id::{GrantId, RecordId, RoleId, TeamId, UserId};
pub use types::{
    AccessLevel, FieldSpec, FieldType, KindDescriptor, KindTraits, PermissionReference, Principal,
    RelationSpec, SystemPrincipals, TeamMembership,
};
pub use utils::{Version, VersionReq};
