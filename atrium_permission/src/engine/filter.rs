//! Bulk-query filtering.
//!
//! `filter` compiles the requester's standing on one kind into a
//! self-contained predicate a store (or a database driver translating it
//! to SQL) applies per record. The predicate covers root bypass,
//! tombstones, the creator-class rules, direct ownership, team
//! membership with role sufficiency, and explicit grants.
//!
//! Reference inheritance is deliberately not expanded here: list results
//! are a conservative superset over direct standing, and callers that
//! need exact semantics post-filter through `check`.

use atrium_core::id::{RecordId, RoleId, TeamId, UserId};
use atrium_core::types::{AccessLevel, SystemPrincipals};
use chrono::Utc;
use std::collections::{HashMap, HashSet};

use super::PermissionEngine;
use crate::resource::ResourceFacts;

/// A compiled per-record access predicate.
#[derive(Debug, Clone)]
pub struct FilterPredicate {
    requester: UserId,
    level: AccessLevel,
    system: SystemPrincipals,
    is_root: bool,
    may_mutate_system: bool,
    system_kind: bool,
    /// Teams whose nearest membership role dominates the level's
    /// minimum role.
    sufficient_teams: HashSet<TeamId>,
    /// Records granted to the requester through explicit grants.
    granted: HashSet<RecordId>,
    /// Whether soft-deleted records pass (root only).
    include_deleted: bool,
}

impl FilterPredicate {
    /// A predicate matching nothing.
    fn deny_all(requester: UserId, level: AccessLevel, system: SystemPrincipals) -> Self {
        Self {
            requester,
            level,
            system,
            is_root: false,
            may_mutate_system: false,
            system_kind: true,
            sufficient_teams: HashSet::new(),
            granted: HashSet::new(),
            include_deleted: false,
        }
    }

    /// Whether one record passes the predicate.
    pub fn matches(&self, facts: &ResourceFacts) -> bool {
        // Tombstones are filtered from every read unless root asked for
        // them explicitly.
        if facts.deleted && !self.include_deleted {
            return false;
        }
        if self.is_root {
            return true;
        }
        // System kinds are global catalogs: readable by everyone,
        // mutable only by root/system.
        if self.system_kind {
            return self.may_mutate_system || self.level <= AccessLevel::View;
        }
        // Creator-class rules.
        if self.system.is_root(facts.created_by) {
            return false;
        }
        if self.system.is_system(facts.created_by) {
            return self.level <= AccessLevel::View || self.may_mutate_system;
        }
        if self.system.is_template(facts.created_by) {
            return self.level.template_open() || self.may_mutate_system;
        }
        // Direct ownership.
        if facts.user_id == Some(self.requester) || facts.created_by == self.requester {
            return true;
        }
        // Team ownership with a sufficient role.
        if let Some(team_id) = facts.team_id {
            if self.sufficient_teams.contains(&team_id) {
                return true;
            }
        }
        // Explicit grants precomputed for this kind.
        self.granted.contains(&facts.id)
    }

    /// The access level the predicate was compiled for.
    pub fn level(&self) -> AccessLevel {
        self.level
    }

    /// The requester the predicate was compiled for.
    pub fn requester(&self) -> UserId {
        self.requester
    }
}

impl PermissionEngine {
    /// Compile the requester's standing on `kind` at `level` into a
    /// predicate for bulk queries.
    ///
    /// Pass `include_deleted = true` only for root; it is ignored for
    /// everyone else.
    pub fn filter(
        &self,
        requester: UserId,
        kind: &str,
        level: AccessLevel,
        system_kind: bool,
        include_deleted: bool,
    ) -> FilterPredicate {
        let system = *self.system_principals();
        let is_root = system.is_root(requester);
        let may_mutate_system = system.may_mutate_system(requester);

        if system_kind && level > AccessLevel::View && !may_mutate_system {
            return FilterPredicate::deny_all(requester, level, system);
        }

        let now = Utc::now();
        let accessible: HashMap<TeamId, (RoleId, usize)> = self.accessible_teams(requester, now);
        let snapshot = self.hierarchy().snapshot();

        let sufficient_teams = accessible
            .iter()
            .filter(|(_, (role_id, _))| snapshot.role_satisfies(*role_id, level.minimum_role()))
            .map(|(team_id, _)| *team_id)
            .collect();

        let granted = self
            .grants()
            .for_kind(kind)
            .into_iter()
            .filter(|g| g.flags.allows(level))
            .filter(|g| self.grant_applies(g, requester, &accessible, now))
            .map(|g| g.resource_id)
            .collect();

        FilterPredicate {
            requester,
            level,
            system,
            is_root,
            may_mutate_system,
            system_kind,
            sufficient_teams,
            granted,
            include_deleted: is_root && include_deleted,
        }
    }
}
