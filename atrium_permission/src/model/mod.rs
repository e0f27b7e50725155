//! Data model for the permission engine.

pub mod decision;
pub mod grant;
pub mod role;
pub mod team;

pub use decision::{Decision, DenialReason};
pub use grant::{AccessFlags, Grant, GrantSubject};
pub use role::{Role, ROLE_ADMIN, ROLE_SUPERADMIN, ROLE_USER};
pub use team::Team;
