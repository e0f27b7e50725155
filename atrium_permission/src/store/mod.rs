//! Storage interfaces for the permission engine.
//!
//! Two stores back the engine: the directory (principals, teams, roles,
//! memberships) and the grant store. Both are traits so a relational
//! driver can replace the in-memory implementations without touching the
//! evaluation rules.

mod in_memory;

pub use in_memory::{InMemoryDirectory, InMemoryGrantStore};

use atrium_core::error::Result;
use atrium_core::id::{GrantId, RecordId, RoleId, TeamId, UserId};
use atrium_core::types::{Principal, TeamMembership};

use crate::model::{Grant, Role, Team};

/// Storage for principals, teams, roles, and memberships.
pub trait DirectoryStore: Send + Sync {
    /// Fetch a principal.
    fn principal(&self, id: UserId) -> Option<Principal>;

    /// Insert or replace a principal.
    fn upsert_principal(&self, principal: Principal) -> Result<()>;

    /// Fetch a team.
    fn team(&self, id: TeamId) -> Option<Team>;

    /// Insert or replace a team.
    fn upsert_team(&self, team: Team) -> Result<()>;

    /// All teams.
    fn teams(&self) -> Vec<Team>;

    /// Fetch a role.
    fn role(&self, id: RoleId) -> Option<Role>;

    /// Fetch a role by its unique name.
    fn role_by_name(&self, name: &str) -> Option<Role>;

    /// Insert or replace a role.
    fn upsert_role(&self, role: Role) -> Result<()>;

    /// All roles.
    fn roles(&self) -> Vec<Role>;

    /// All memberships of one principal, active or not.
    fn memberships_of(&self, user_id: UserId) -> Vec<TeamMembership>;

    /// All memberships on one team, active or not.
    fn memberships_on(&self, team_id: TeamId) -> Vec<TeamMembership>;

    /// Insert or replace a membership (keyed by user and team).
    fn upsert_membership(&self, membership: TeamMembership) -> Result<()>;
}

/// Storage for permission grants.
pub trait GrantStore: Send + Sync {
    /// Add a grant.
    fn add(&self, grant: Grant) -> Result<()>;

    /// Remove a grant.
    fn remove(&self, id: GrantId) -> Result<()>;

    /// All grants attached to one record, in unspecified order.
    fn for_resource(&self, kind: &str, id: RecordId) -> Vec<Grant>;

    /// All grants on a kind, in unspecified order. Used by filter
    /// construction to precompute the requester's granted record set.
    fn for_kind(&self, kind: &str) -> Vec<Grant>;
}
