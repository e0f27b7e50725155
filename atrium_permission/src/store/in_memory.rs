//! In-memory directory and grant stores.
//!
//! These back tests and single-process deployments; a relational driver
//! replaces them in production.

use atrium_core::error::{PermissionError, Result};
use atrium_core::id::{GrantId, RecordId, RoleId, TeamId, UserId};
use atrium_core::types::{Principal, TeamMembership};
use dashmap::DashMap;
use std::sync::Arc;

use super::{DirectoryStore, GrantStore};
use crate::model::{Grant, Role, Team};

/// An in-memory directory store.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    principals: Arc<DashMap<UserId, Principal>>,
    teams: Arc<DashMap<TeamId, Team>>,
    roles: Arc<DashMap<RoleId, Role>>,
    memberships: Arc<DashMap<(UserId, TeamId), TeamMembership>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DirectoryStore for InMemoryDirectory {
    fn principal(&self, id: UserId) -> Option<Principal> {
        self.principals.get(&id).map(|p| p.clone())
    }

    fn upsert_principal(&self, principal: Principal) -> Result<()> {
        self.principals.insert(principal.id, principal);
        Ok(())
    }

    fn team(&self, id: TeamId) -> Option<Team> {
        self.teams.get(&id).map(|t| t.clone())
    }

    fn upsert_team(&self, team: Team) -> Result<()> {
        self.teams.insert(team.id, team);
        Ok(())
    }

    fn teams(&self) -> Vec<Team> {
        self.teams.iter().map(|t| t.value().clone()).collect()
    }

    fn role(&self, id: RoleId) -> Option<Role> {
        self.roles.get(&id).map(|r| r.clone())
    }

    fn role_by_name(&self, name: &str) -> Option<Role> {
        self.roles
            .iter()
            .find(|r| r.value().name == name)
            .map(|r| r.value().clone())
    }

    fn upsert_role(&self, role: Role) -> Result<()> {
        self.roles.insert(role.id, role);
        Ok(())
    }

    fn roles(&self) -> Vec<Role> {
        self.roles.iter().map(|r| r.value().clone()).collect()
    }

    fn memberships_of(&self, user_id: UserId) -> Vec<TeamMembership> {
        self.memberships
            .iter()
            .filter(|m| m.key().0 == user_id)
            .map(|m| m.value().clone())
            .collect()
    }

    fn memberships_on(&self, team_id: TeamId) -> Vec<TeamMembership> {
        self.memberships
            .iter()
            .filter(|m| m.key().1 == team_id)
            .map(|m| m.value().clone())
            .collect()
    }

    fn upsert_membership(&self, membership: TeamMembership) -> Result<()> {
        self.memberships
            .insert((membership.user_id, membership.team_id), membership);
        Ok(())
    }
}

/// An in-memory grant store.
#[derive(Clone, Default)]
pub struct InMemoryGrantStore {
    grants: Arc<DashMap<GrantId, Grant>>,
}

impl InMemoryGrantStore {
    /// Create an empty grant store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GrantStore for InMemoryGrantStore {
    fn add(&self, grant: Grant) -> Result<()> {
        if self.grants.contains_key(&grant.id) {
            return Err(
                PermissionError::Denied(format!("grant {} already exists", grant.id)).into(),
            );
        }
        self.grants.insert(grant.id, grant);
        Ok(())
    }

    fn remove(&self, id: GrantId) -> Result<()> {
        if self.grants.remove(&id).is_none() {
            return Err(PermissionError::Denied(format!("grant {} not found", id)).into());
        }
        Ok(())
    }

    fn for_resource(&self, kind: &str, id: RecordId) -> Vec<Grant> {
        self.grants
            .iter()
            .filter(|g| g.value().resource_kind == kind && g.value().resource_id == id)
            .map(|g| g.value().clone())
            .collect()
    }

    fn for_kind(&self, kind: &str) -> Vec<Grant> {
        self.grants
            .iter()
            .filter(|g| g.value().resource_kind == kind)
            .map(|g| g.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessFlags, GrantSubject};

    #[test]
    fn test_directory_round_trip() {
        let directory = InMemoryDirectory::new();

        let user = Principal::new(UserId::new(), "ada");
        directory.upsert_principal(user.clone()).unwrap();
        assert_eq!(directory.principal(user.id), Some(user.clone()));

        let team = Team::root(TeamId::new(), "research");
        directory.upsert_team(team.clone()).unwrap();
        assert_eq!(directory.team(team.id), Some(team.clone()));

        let role = Role::root(RoleId::new(), "admin");
        directory.upsert_role(role.clone()).unwrap();
        assert_eq!(directory.role_by_name("admin"), Some(role.clone()));

        let membership = TeamMembership::new(user.id, team.id, role.id);
        directory.upsert_membership(membership.clone()).unwrap();
        assert_eq!(directory.memberships_of(user.id), vec![membership.clone()]);
        assert_eq!(directory.memberships_on(team.id), vec![membership]);
    }

    #[test]
    fn test_grant_store_duplicate_rejected() {
        let store = InMemoryGrantStore::new();
        let grant = Grant::new(
            "project",
            RecordId::new(),
            GrantSubject::Global,
            AccessFlags::view_only(),
            UserId::new(),
        );

        store.add(grant.clone()).unwrap();
        assert!(store.add(grant.clone()).is_err());
        assert_eq!(
            store.for_resource("project", grant.resource_id).len(),
            1
        );
    }

    #[test]
    fn test_grant_store_remove() {
        let store = InMemoryGrantStore::new();
        let grant = Grant::new(
            "project",
            RecordId::new(),
            GrantSubject::Global,
            AccessFlags::view_only(),
            UserId::new(),
        );

        store.add(grant.clone()).unwrap();
        store.remove(grant.id).unwrap();
        assert!(store.remove(grant.id).is_err());
        assert!(store.for_kind("project").is_empty());
    }
}
