//! Role model.
//!
//! Roles form a forest in which more powerful roles are ancestors of the
//! roles they dominate: the seeded hierarchy is
//! `superadmin -> admin -> user`. A role *dominates* another iff it is an
//! ancestor of it (or the same role).

use atrium_core::id::RoleId;
use serde::{Deserialize, Serialize};

/// Name of the baseline member role.
pub const ROLE_USER: &str = "user";
/// Name of the team administrator role.
pub const ROLE_ADMIN: &str = "admin";
/// Name of the top role.
pub const ROLE_SUPERADMIN: &str = "superadmin";

/// A role in the role forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique identifier.
    pub id: RoleId,
    /// Unique role name.
    pub name: String,
    /// The dominating parent role, if any.
    pub parent_id: Option<RoleId>,
}

impl Role {
    /// Create a root role (no dominating parent).
    pub fn root(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
        }
    }

    /// Create a role dominated by `parent_id`.
    pub fn child_of(id: RoleId, name: impl Into<String>, parent_id: RoleId) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: Some(parent_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_constructors() {
        let super_id = RoleId::seeded(0x10);
        let admin_id = RoleId::seeded(0x11);

        let superadmin = Role::root(super_id, ROLE_SUPERADMIN);
        assert_eq!(superadmin.parent_id, None);

        let admin = Role::child_of(admin_id, ROLE_ADMIN, super_id);
        assert_eq!(admin.parent_id, Some(super_id));
    }
}
