//! Permission grant model.
//!
//! A grant attaches a set of access flags to one record for one subject
//! (a principal, a team, a role, or everyone). Expired grants are
//! equivalent to absent.

use atrium_core::id::{GrantId, RecordId, RoleId, TeamId, UserId};
use atrium_core::types::AccessLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSubject {
    /// A single principal.
    User(UserId),
    /// Every active member of a team (or a team in its hierarchy).
    Team(TeamId),
    /// Every principal whose role dominates the named role.
    Role(RoleId),
    /// Every principal. Only root/system may create these.
    Global,
}

/// The six per-level flags of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessFlags {
    /// Read the record.
    pub can_view: bool,
    /// Run the record.
    pub can_execute: bool,
    /// Duplicate the record.
    pub can_copy: bool,
    /// Mutate the record.
    pub can_edit: bool,
    /// Soft-delete the record.
    pub can_delete: bool,
    /// Manage grants on the record.
    pub can_share: bool,
}

impl AccessFlags {
    /// Flags granting only view access.
    pub fn view_only() -> Self {
        Self {
            can_view: true,
            ..Default::default()
        }
    }

    /// Flags granting every level.
    pub fn all() -> Self {
        Self {
            can_view: true,
            can_execute: true,
            can_copy: true,
            can_edit: true,
            can_delete: true,
            can_share: true,
        }
    }

    /// Add one level to the flags.
    pub fn with(mut self, level: AccessLevel) -> Self {
        match level {
            AccessLevel::View => self.can_view = true,
            AccessLevel::Execute => self.can_execute = true,
            AccessLevel::Copy => self.can_copy = true,
            AccessLevel::Edit => self.can_edit = true,
            AccessLevel::Delete => self.can_delete = true,
            AccessLevel::Share => self.can_share = true,
        }
        self
    }

    /// Whether the flags include the given level.
    pub fn allows(&self, level: AccessLevel) -> bool {
        match level {
            AccessLevel::View => self.can_view,
            AccessLevel::Execute => self.can_execute,
            AccessLevel::Copy => self.can_copy,
            AccessLevel::Edit => self.can_edit,
            AccessLevel::Delete => self.can_delete,
            AccessLevel::Share => self.can_share,
        }
    }
}

/// A permission grant on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    /// Unique identifier.
    pub id: GrantId,
    /// Kind of the granted record.
    pub resource_kind: String,
    /// The granted record.
    pub resource_id: RecordId,
    /// Who the grant applies to.
    pub subject: GrantSubject,
    /// Granted levels.
    pub flags: AccessFlags,
    /// When the grant stops counting; `None` means never.
    pub expires_at: Option<DateTime<Utc>>,
    /// Who created the grant.
    pub created_by: UserId,
    /// When the grant was created.
    pub created_at: DateTime<Utc>,
}

impl Grant {
    /// Create a non-expiring grant.
    pub fn new(
        resource_kind: impl Into<String>,
        resource_id: RecordId,
        subject: GrantSubject,
        flags: AccessFlags,
        created_by: UserId,
    ) -> Self {
        Self {
            id: GrantId::new(),
            resource_kind: resource_kind.into(),
            resource_id,
            subject,
            flags,
            expires_at: None,
            created_by,
            created_at: Utc::now(),
        }
    }

    /// Expire the grant at the given instant.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the grant still counts at `now`. A grant whose
    /// `expires_at` is at or before `now` is equivalent to absent.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}
