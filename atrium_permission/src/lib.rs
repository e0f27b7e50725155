//! # Atrium Permission
//!
//! `atrium_permission` implements the reference-aware permission model
//! of the Atrium engine: ownership, team membership with hierarchy,
//! explicit grants, role dominance, reference inheritance, time limits,
//! and the rules for the three distinguished principals.
//!
//! ## Structure
//!
//! - **model**: grants, roles, teams, decisions
//! - **store**: directory and grant storage (trait + in-memory)
//! - **engine**: `check`, `filter`, `can_create`, delegation, and the
//!   hierarchy snapshot cache
//! - **resource**: the seam through which the engine reads record facts

pub mod engine;
pub mod model;
pub mod resource;
pub mod store;

pub use engine::{FilterPredicate, HierarchyCache, HierarchySnapshot, PermissionEngine};
pub use model::{
    AccessFlags, Decision, DenialReason, Grant, GrantSubject, Role, Team, ROLE_ADMIN,
    ROLE_SUPERADMIN, ROLE_USER,
};
pub use resource::{ResourceFacts, ResourceResolver};
pub use store::{DirectoryStore, GrantStore, InMemoryDirectory, InMemoryGrantStore};
