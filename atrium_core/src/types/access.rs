//! Access levels for permission evaluation.
//!
//! Every permission decision in the engine is phrased in terms of one of
//! six strictly ordered access levels. The ordering matters: holding a
//! higher level never implies the lower ones automatically (grants carry
//! one flag per level), but evaluation rules frequently branch on whether
//! the required level is above `View`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The access level required for an operation, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Read the record.
    View,
    /// Run the record (agents, workflows, and similar executables).
    Execute,
    /// Duplicate the record under a new owner.
    Copy,
    /// Mutate the record.
    Edit,
    /// Soft-delete the record.
    Delete,
    /// Manage grants on the record.
    Share,
}

impl AccessLevel {
    /// All levels, in ascending order.
    pub const ALL: [AccessLevel; 6] = [
        AccessLevel::View,
        AccessLevel::Execute,
        AccessLevel::Copy,
        AccessLevel::Edit,
        AccessLevel::Delete,
        AccessLevel::Share,
    ];

    /// The minimum role name a team member needs for this level.
    ///
    /// This is the single source of truth for the role-to-level table:
    /// view-class levels are open to every enabled member, while
    /// mutating levels require an admin (or a role dominating admin).
    pub fn minimum_role(&self) -> &'static str {
        match self {
            AccessLevel::View | AccessLevel::Execute | AccessLevel::Copy => "user",
            AccessLevel::Edit | AccessLevel::Delete | AccessLevel::Share => "admin",
        }
    }

    /// Whether the level is satisfied on records owned by the template
    /// principal without any explicit grant.
    pub fn template_open(&self) -> bool {
        matches!(
            self,
            AccessLevel::View | AccessLevel::Execute | AccessLevel::Copy | AccessLevel::Share
        )
    }

    /// Whether this level mutates the record.
    pub fn is_mutation(&self) -> bool {
        matches!(self, AccessLevel::Edit | AccessLevel::Delete)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessLevel::View => "view",
            AccessLevel::Execute => "execute",
            AccessLevel::Copy => "copy",
            AccessLevel::Edit => "edit",
            AccessLevel::Delete => "delete",
            AccessLevel::Share => "share",
        };
        write!(f, "{}", name)
    }
}
