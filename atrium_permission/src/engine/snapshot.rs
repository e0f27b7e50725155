//! Role and team hierarchy snapshots.
//!
//! Permission evaluation consults the role forest (for dominance) and
//! the team forest (for membership closure) on every check. Both are
//! loaded once into an immutable snapshot; structural changes invalidate
//! the cache, which rebuilds and swaps the snapshot atomically so
//! readers always observe a consistent view.

use atrium_core::id::{RoleId, TeamId};
use atrium_core::types::TeamMembership;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::store::DirectoryStore;

/// Hard bound on role-chain walks, protecting against malformed data.
const MAX_ROLE_WALK: usize = 32;

/// An immutable view of the role and team forests.
pub struct HierarchySnapshot {
    role_parent: HashMap<RoleId, Option<RoleId>>,
    role_by_name: HashMap<String, RoleId>,
    team_parent: HashMap<TeamId, Option<TeamId>>,
    max_team_depth: usize,
}

impl HierarchySnapshot {
    /// Build a snapshot from the directory.
    pub fn build(directory: &dyn DirectoryStore, max_team_depth: usize) -> Self {
        let mut role_parent = HashMap::new();
        let mut role_by_name = HashMap::new();
        for role in directory.roles() {
            role_parent.insert(role.id, role.parent_id);
            role_by_name.insert(role.name, role.id);
        }

        let mut team_parent = HashMap::new();
        for team in directory.teams() {
            team_parent.insert(team.id, team.parent_id);
        }

        debug!(
            roles = role_parent.len(),
            teams = team_parent.len(),
            "built hierarchy snapshot"
        );

        Self {
            role_parent,
            role_by_name,
            team_parent,
            max_team_depth,
        }
    }

    /// Look up a role id by name.
    pub fn role_named(&self, name: &str) -> Option<RoleId> {
        self.role_by_name.get(name).copied()
    }

    /// Whether role `a` dominates role `b`: `a` is `b` itself or an
    /// ancestor of `b` in the role forest.
    pub fn dominates(&self, a: RoleId, b: RoleId) -> bool {
        self.role_distance(a, b).is_some()
    }

    /// Number of parent steps from `b` up to `a`, when `a` dominates
    /// `b`. Zero means the same role.
    pub fn role_distance(&self, a: RoleId, b: RoleId) -> Option<usize> {
        let mut current = Some(b);
        let mut seen = HashSet::new();
        for distance in 0..MAX_ROLE_WALK {
            let role = current?;
            if role == a {
                return Some(distance);
            }
            if !seen.insert(role) {
                // Malformed cycle; treat as not dominated.
                return None;
            }
            current = self.role_parent.get(&role).copied().flatten();
        }
        None
    }

    /// Whether `held` satisfies the minimum role named `minimum`.
    pub fn role_satisfies(&self, held: RoleId, minimum: &str) -> bool {
        match self.role_named(minimum) {
            Some(min_id) => self.dominates(held, min_id),
            None => false,
        }
    }

    /// The team itself plus its ancestors, up to the depth bound.
    /// Depth 1 is the team itself.
    pub fn team_closure(&self, team: TeamId) -> Vec<(TeamId, usize)> {
        let mut closure = Vec::new();
        let mut current = Some(team);
        let mut seen = HashSet::new();
        let mut depth = 1;
        while let Some(id) = current {
            if depth > self.max_team_depth || !seen.insert(id) {
                break;
            }
            closure.push((id, depth));
            current = self.team_parent.get(&id).copied().flatten();
            depth += 1;
        }
        closure
    }

    /// Every team reachable from the given memberships, mapped to the
    /// role of the nearest membership reaching it.
    ///
    /// Only memberships active at `now` count. When two memberships
    /// reach the same team, the one with fewer parent steps wins.
    pub fn accessible_teams(
        &self,
        memberships: &[TeamMembership],
        now: DateTime<Utc>,
    ) -> HashMap<TeamId, (RoleId, usize)> {
        let mut accessible: HashMap<TeamId, (RoleId, usize)> = HashMap::new();
        for membership in memberships {
            if !membership.is_active(now) {
                continue;
            }
            for (team_id, depth) in self.team_closure(membership.team_id) {
                match accessible.get(&team_id) {
                    Some((_, existing)) if *existing <= depth => {}
                    _ => {
                        accessible.insert(team_id, (membership.role_id, depth));
                    }
                }
            }
        }
        accessible
    }
}

/// Process-wide cache holding the current hierarchy snapshot.
///
/// Readers clone an `Arc` and never block writers; `invalidate` rebuilds
/// from the directory and swaps the snapshot in one write.
pub struct HierarchyCache {
    directory: Arc<dyn DirectoryStore>,
    max_team_depth: usize,
    current: RwLock<Arc<HierarchySnapshot>>,
}

impl HierarchyCache {
    /// Build the cache with an initial snapshot.
    pub fn new(directory: Arc<dyn DirectoryStore>, max_team_depth: usize) -> Self {
        let snapshot = Arc::new(HierarchySnapshot::build(directory.as_ref(), max_team_depth));
        Self {
            directory,
            max_team_depth,
            current: RwLock::new(snapshot),
        }
    }

    /// Get the current snapshot.
    pub fn snapshot(&self) -> Arc<HierarchySnapshot> {
        self.current.read().clone()
    }

    /// Rebuild after a structural change to roles or teams.
    pub fn invalidate(&self) {
        let snapshot = Arc::new(HierarchySnapshot::build(
            self.directory.as_ref(),
            self.max_team_depth,
        ));
        *self.current.write() = snapshot;
        debug!("hierarchy cache invalidated");
    }
}
