//! The permission evaluation engine.
//!
//! The engine exposes three operations:
//!
//! - [`PermissionEngine::check`]: decide one (principal, level, record)
//!   question, evaluating the full rule chain including reference
//!   inheritance.
//! - [`PermissionEngine::filter`]: produce a predicate for bulk queries
//!   covering ownership, team membership, and explicit grants. Reference
//!   inheritance is *not* expanded at filter time; callers that need
//!   exact semantics post-filter list results through `check`.
//! - [`PermissionEngine::can_create`]: the creation check, which requires
//!   edit access on the create-permission reference and view access on
//!   every other populated reference.

mod check;
mod create;
mod filter;
mod snapshot;

pub use filter::FilterPredicate;
pub use snapshot::{HierarchyCache, HierarchySnapshot};

use atrium_core::id::{TeamId, UserId};
use atrium_core::types::{SystemPrincipals, TeamMembership};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Grant, GrantSubject};
use crate::store::{DirectoryStore, GrantStore};

/// The permission engine.
///
/// One engine instance serves the whole process; it is cheap to share
/// behind an `Arc` and safe for concurrent use.
pub struct PermissionEngine {
    system: SystemPrincipals,
    directory: Arc<dyn DirectoryStore>,
    grants: Arc<dyn GrantStore>,
    hierarchy: HierarchyCache,
}

impl PermissionEngine {
    /// Create an engine over the given stores.
    pub fn new(
        system: SystemPrincipals,
        directory: Arc<dyn DirectoryStore>,
        grants: Arc<dyn GrantStore>,
        max_team_depth: usize,
    ) -> Self {
        let hierarchy = HierarchyCache::new(directory.clone(), max_team_depth);
        Self {
            system,
            directory,
            grants,
            hierarchy,
        }
    }

    /// The three distinguished principals.
    pub fn system_principals(&self) -> &SystemPrincipals {
        &self.system
    }

    /// The hierarchy cache; invalidate it after structural changes to
    /// roles or teams.
    pub fn hierarchy(&self) -> &HierarchyCache {
        &self.hierarchy
    }

    /// The grant store backing explicit-grant evaluation.
    pub fn grants(&self) -> &Arc<dyn GrantStore> {
        &self.grants
    }

    /// The directory backing membership and hierarchy lookups.
    pub fn directory(&self) -> &Arc<dyn DirectoryStore> {
        &self.directory
    }

    fn memberships(&self, user_id: UserId) -> Vec<TeamMembership> {
        self.directory.memberships_of(user_id)
    }

    /// The teams reachable by the requester's active memberships, with
    /// the role of the nearest membership.
    fn accessible_teams(
        &self,
        requester: UserId,
        now: DateTime<Utc>,
    ) -> HashMap<TeamId, (atrium_core::id::RoleId, usize)> {
        let snapshot = self.hierarchy.snapshot();
        snapshot.accessible_teams(&self.memberships(requester), now)
    }

    /// Whether one grant applies to the requester.
    ///
    /// A user grant must name the requester; a team grant must name an
    /// accessible team; a role grant applies when a held role dominates
    /// the grant's role; a global grant applies to everyone.
    fn grant_applies(
        &self,
        grant: &Grant,
        requester: UserId,
        accessible: &HashMap<TeamId, (atrium_core::id::RoleId, usize)>,
        now: DateTime<Utc>,
    ) -> bool {
        if !grant.is_active(now) {
            return false;
        }
        match grant.subject {
            GrantSubject::User(user) => user == requester,
            GrantSubject::Team(team) => accessible.contains_key(&team),
            GrantSubject::Role(role) => {
                let snapshot = self.hierarchy.snapshot();
                self.memberships(requester)
                    .iter()
                    .filter(|m| m.is_active(now))
                    .any(|m| snapshot.dominates(m.role_id, role))
            }
            GrantSubject::Global => true,
        }
    }

    /// Active grants for one record, earliest-expiring first so the
    /// strongest still-valid grant is examined before longer-lived ones.
    fn sorted_grants(&self, kind: &str, id: atrium_core::id::RecordId) -> Vec<Grant> {
        let mut grants = self.grants.for_resource(kind, id);
        grants.sort_by_key(|g| (g.expires_at.is_none(), g.expires_at));
        grants
    }
}
