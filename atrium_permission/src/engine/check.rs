//! The ordered rule chain behind `check`.

use atrium_core::id::{RecordId, UserId};
use atrium_core::types::AccessLevel;
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, trace};

use super::PermissionEngine;
use crate::model::{Decision, DenialReason};
use crate::resource::ResourceResolver;

impl PermissionEngine {
    /// Decide whether `requester` holds `level` on `(kind, id)`.
    ///
    /// Rules are evaluated in order; the first granting rule wins:
    /// root bypass, existence/tombstone, system-kind protection,
    /// creator-class rules (root/system/template owners), direct
    /// ownership, team membership with role dominance, explicit grants,
    /// and finally reference inheritance (any declared reference that
    /// grants the level grants it here, with cycle detection).
    pub fn check(
        &self,
        requester: UserId,
        kind: &str,
        id: RecordId,
        level: AccessLevel,
        resolver: &dyn ResourceResolver,
    ) -> Decision {
        let mut visited = HashSet::new();
        let decision = self.check_inner(requester, kind, id, level, resolver, &mut visited);
        if let Decision::Denied(reason) = decision {
            debug!(%requester, kind, %id, %level, %reason, "permission denied");
        }
        decision
    }

    fn check_inner(
        &self,
        requester: UserId,
        kind: &str,
        id: RecordId,
        level: AccessLevel,
        resolver: &dyn ResourceResolver,
        visited: &mut HashSet<(String, RecordId)>,
    ) -> Decision {
        // Root bypasses everything, including tombstones.
        if self.system.is_root(requester) {
            return Decision::Granted;
        }

        // Missing records and tombstones look identical to
        // everyone but root.
        let facts = match resolver.resource(kind, id) {
            Some(facts) => facts,
            None => return Decision::Denied(DenialReason::NotFound),
        };
        if facts.deleted {
            return Decision::Denied(DenialReason::NotFound);
        }

        // System kinds are global catalogs: readable by everyone,
        // mutable only by root/system (regardless of who created the
        // row).
        if let Some(descriptor) = resolver.descriptor(kind) {
            if descriptor.system {
                if self.system.may_mutate_system(requester) || level <= AccessLevel::View {
                    return Decision::Granted;
                }
                return Decision::Denied(DenialReason::SystemProtected);
            }
        }

        // Creator-class rules for the distinguished principals.
        if self.system.is_root(facts.created_by) {
            return Decision::Denied(DenialReason::RootOnly);
        }
        if self.system.is_system(facts.created_by) {
            if level <= AccessLevel::View || self.system.may_mutate_system(requester) {
                return Decision::Granted;
            }
            return Decision::Denied(DenialReason::SystemOwned);
        }
        if self.system.is_template(facts.created_by) {
            if level.template_open() || self.system.may_mutate_system(requester) {
                return Decision::Granted;
            }
            return Decision::Denied(DenialReason::TemplateOwned);
        }

        // Direct ownership, including the creator.
        if facts.user_id == Some(requester) || facts.created_by == requester {
            return Decision::Granted;
        }

        let now = Utc::now();
        let accessible = self.accessible_teams(requester, now);

        // Team ownership: the nearest membership reaching the
        // owning team must hold a role dominating the level's minimum.
        let mut insufficient_role = false;
        if let Some(team_id) = facts.team_id {
            if let Some((role_id, _)) = accessible.get(&team_id) {
                let snapshot = self.hierarchy().snapshot();
                if snapshot.role_satisfies(*role_id, level.minimum_role()) {
                    return Decision::Granted;
                }
                insufficient_role = true;
            }
        }

        // Explicit grants, earliest-expiring first.
        for grant in self.sorted_grants(kind, id) {
            if self.grant_applies(&grant, requester, &accessible, now)
                && grant.flags.allows(level)
            {
                return Decision::Granted;
            }
        }

        // Reference inheritance: any declared reference granting the
        // level grants it here. The visited set breaks cycles.
        visited.insert((kind.to_string(), id));
        for (name, target_kind, target_id) in &facts.references {
            let Some(target_id) = target_id else { continue };
            if visited.contains(&(target_kind.clone(), *target_id)) {
                trace!(kind, %id, reference = %name, "reference cycle stopped");
                continue;
            }
            let inherited =
                self.check_inner(requester, target_kind, *target_id, level, resolver, visited);
            if inherited.is_granted() {
                return Decision::Granted;
            }
        }

        // Nothing granted access.
        if insufficient_role {
            Decision::Denied(DenialReason::InsufficientRole)
        } else {
            Decision::Denied(DenialReason::NoRule)
        }
    }

    /// Convenience wrapper: does the requester hold edit access?
    pub fn can_edit(
        &self,
        requester: UserId,
        kind: &str,
        id: RecordId,
        resolver: &dyn ResourceResolver,
    ) -> bool {
        self.check(requester, kind, id, AccessLevel::Edit, resolver)
            .is_granted()
    }

    /// Convenience wrapper: does the requester hold share access?
    pub fn can_share(
        &self,
        requester: UserId,
        kind: &str,
        id: RecordId,
        resolver: &dyn ResourceResolver,
    ) -> bool {
        self.check(requester, kind, id, AccessLevel::Share, resolver)
            .is_granted()
    }
}
