//! Team model.
//!
//! Teams form a forest. Membership in a team also reaches the team's
//! ancestors, up to the configured depth bound, so records owned by a
//! parent team are visible to members of its children.

use atrium_core::id::TeamId;
use serde::{Deserialize, Serialize};

/// A team in the team forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// The parent team, if any.
    pub parent_id: Option<TeamId>,
}

impl Team {
    /// Create a top-level team.
    pub fn root(id: TeamId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
        }
    }

    /// Create a team nested under `parent_id`.
    pub fn child_of(id: TeamId, name: impl Into<String>, parent_id: TeamId) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: Some(parent_id),
        }
    }
}
