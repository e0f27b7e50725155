//! Creation and delegation checks.

use atrium_core::error::{PermissionError, Result};
use atrium_core::id::{RecordId, TeamId, UserId};
use atrium_core::types::{AccessLevel, KindDescriptor};
use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

use super::PermissionEngine;
use crate::model::{Decision, DenialReason, Grant, GrantSubject, ROLE_USER};
use crate::resource::ResourceResolver;

impl PermissionEngine {
    /// Decide whether `requester` may create a record of `descriptor`'s
    /// kind with the given draft ownership and reference targets.
    ///
    /// Creation uses the ALL rule: the create-permission reference
    /// requires edit access on its target, and every other populated
    /// reference requires view access. (Read/update/delete use the ANY
    /// rule instead; see reference inheritance in `check`.)
    pub fn can_create(
        &self,
        requester: UserId,
        descriptor: &KindDescriptor,
        draft_user: Option<UserId>,
        draft_team: Option<TeamId>,
        reference_targets: &HashMap<String, RecordId>,
        resolver: &dyn ResourceResolver,
    ) -> Decision {
        if self.system_principals().is_root(requester) {
            return Decision::Granted;
        }

        if descriptor.system && !self.system_principals().may_mutate_system(requester) {
            return Decision::Denied(DenialReason::SystemProtected);
        }

        // The create reference gates creation with edit access.
        if let Some(create_ref) = descriptor.effective_create_reference() {
            let Some(target) = reference_targets.get(&create_ref.name) else {
                debug!(
                    kind = %descriptor.kind,
                    reference = %create_ref.name,
                    "create denied: missing create-permission reference"
                );
                return Decision::Denied(DenialReason::NotFound);
            };
            let decision = self.check(
                requester,
                &create_ref.target_kind,
                *target,
                AccessLevel::Edit,
                resolver,
            );
            if !decision.is_granted() {
                return decision;
            }
        }

        // Every remaining populated reference requires view access.
        let create_name = descriptor
            .effective_create_reference()
            .map(|r| r.name.clone());
        for reference in &descriptor.permission_references {
            if Some(&reference.name) == create_name.as_ref() {
                continue;
            }
            let Some(target) = reference_targets.get(&reference.name) else {
                continue;
            };
            let decision = self.check(
                requester,
                &reference.target_kind,
                *target,
                AccessLevel::View,
                resolver,
            );
            if !decision.is_granted() {
                return decision;
            }
        }

        // User-scoped kinds: principals create records they own.
        if descriptor.traits.user_owned {
            if let Some(owner) = draft_user {
                if owner != requester && !self.system_principals().may_mutate_system(requester) {
                    return Decision::Denied(DenialReason::NoRule);
                }
            }
        }

        // Team-scoped kinds: the requester needs an active membership of
        // sufficient role on the owning team. The system principal
        // creates on any team (services run as system).
        if descriptor.traits.team_owned && !self.system_principals().may_mutate_system(requester) {
            if let Some(team_id) = draft_team {
                let accessible = self.accessible_teams(requester, Utc::now());
                let snapshot = self.hierarchy().snapshot();
                match accessible.get(&team_id) {
                    Some((role_id, _)) if snapshot.role_satisfies(*role_id, ROLE_USER) => {}
                    Some(_) => return Decision::Denied(DenialReason::InsufficientRole),
                    None => return Decision::Denied(DenialReason::NoRule),
                }
            }
        }

        Decision::Granted
    }

    /// Authorize creating (or revoking) a grant.
    ///
    /// Delegation requires standing on the target record: share access,
    /// or edit access as an admin-equivalent fallback. Global grants and
    /// grants on system kinds are reserved to root/system.
    pub fn authorize_grant(
        &self,
        requester: UserId,
        grant: &Grant,
        resolver: &dyn ResourceResolver,
    ) -> Result<()> {
        if self.system_principals().may_mutate_system(requester) {
            return Ok(());
        }

        if matches!(grant.subject, GrantSubject::Global) {
            return Err(PermissionError::DelegationDenied(
                "global grants are reserved to root/system".into(),
            )
            .into());
        }

        if let Some(descriptor) = resolver.descriptor(&grant.resource_kind) {
            if descriptor.system {
                return Err(PermissionError::DelegationDenied(format!(
                    "grants on system kind {} are reserved to root/system",
                    grant.resource_kind
                ))
                .into());
            }
        }

        let facts = resolver
            .resource(&grant.resource_kind, grant.resource_id)
            .filter(|f| !f.deleted)
            .ok_or_else(|| {
                PermissionError::DelegationDenied(format!(
                    "{} {} not found",
                    grant.resource_kind, grant.resource_id
                ))
            })?;

        let shareable = self.can_share(requester, &facts.kind, facts.id, resolver)
            || self.can_edit(requester, &facts.kind, facts.id, resolver);
        if !shareable {
            return Err(PermissionError::DelegationDenied(format!(
                "requester holds neither share nor edit access on {} {}",
                grant.resource_kind, grant.resource_id
            ))
            .into());
        }

        Ok(())
    }
}
