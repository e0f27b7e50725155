//! Principals and the three distinguished system identities.
//!
//! Atrium recognizes three singleton principals resolved from
//! configuration at process start:
//!
//! - **root** bypasses every check, sees soft-deleted rows, and is the
//!   only principal allowed hard deletion.
//! - **system** reads everything and may mutate kinds flagged as system
//!   kinds; background services act as this principal.
//! - **template** is an ordinary principal whose owned records are
//!   readable by everyone but mutable only by root/system.

use crate::id::{RoleId, TeamId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three distinguished principal identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPrincipals {
    /// The root principal.
    pub root: UserId,
    /// The system principal.
    pub system: UserId,
    /// The template principal.
    pub template: UserId,
}

impl SystemPrincipals {
    /// Check if the id is the root principal.
    pub fn is_root(&self, id: UserId) -> bool {
        id == self.root
    }

    /// Check if the id is the system principal.
    pub fn is_system(&self, id: UserId) -> bool {
        id == self.system
    }

    /// Check if the id is the template principal.
    pub fn is_template(&self, id: UserId) -> bool {
        id == self.template
    }

    /// Check if the id is any of the three distinguished principals.
    pub fn is_distinguished(&self, id: UserId) -> bool {
        self.is_root(id) || self.is_system(id) || self.is_template(id)
    }

    /// Check if the id may mutate system-flagged kinds.
    pub fn may_mutate_system(&self, id: UserId) -> bool {
        self.is_root(id) || self.is_system(id)
    }
}

/// A principal known to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// When the principal was created.
    pub created_at: DateTime<Utc>,
}

impl Principal {
    /// Create a new principal with the given id and name.
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A principal's membership in one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMembership {
    /// The member.
    pub user_id: UserId,
    /// The team.
    pub team_id: TeamId,
    /// The role the member holds on this team.
    pub role_id: RoleId,
    /// Disabled memberships grant nothing.
    pub enabled: bool,
    /// Expired memberships grant nothing.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TeamMembership {
    /// Create an enabled, non-expiring membership.
    pub fn new(user_id: UserId, team_id: TeamId, role_id: RoleId) -> Self {
        Self {
            user_id,
            team_id,
            role_id,
            enabled: true,
            expires_at: None,
        }
    }

    /// Expire this membership at the given instant.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the membership counts at `now`.
    ///
    /// A disabled membership, or one whose `expires_at` is at or before
    /// `now`, is equivalent to absent.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.expires_at.map_or(true, |at| at > now)
    }
}
