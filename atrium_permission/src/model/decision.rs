//! Permission decisions.
//!
//! `check` returns a `Decision` rather than a bare boolean so callers can
//! log why access was refused. The manager boundary collapses most
//! denial reasons into not-found responses before anything reaches an
//! unauthorized caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a permission check refused access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The record does not exist, or is soft-deleted and the requester
    /// is not root.
    NotFound,
    /// The kind is system-flagged and the level is above view.
    SystemProtected,
    /// The record was created by root; only root may touch it.
    RootOnly,
    /// The record was created by system; mutation requires root/system.
    SystemOwned,
    /// The record was created by template; edit/delete require
    /// root/system.
    TemplateOwned,
    /// Team membership exists but the member's role does not dominate
    /// the minimum role for the level.
    InsufficientRole,
    /// No rule granted access.
    NoRule,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DenialReason::NotFound => "record not found",
            DenialReason::SystemProtected => "system kind is protected",
            DenialReason::RootOnly => "record is reserved to root",
            DenialReason::SystemOwned => "record is owned by the system principal",
            DenialReason::TemplateOwned => "template records are read-only",
            DenialReason::InsufficientRole => "team role is insufficient",
            DenialReason::NoRule => "no rule grants access",
        };
        write!(f, "{}", text)
    }
}

/// Result of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Access is allowed.
    Granted,
    /// Access is refused for the given reason.
    Denied(DenialReason),
}

impl Decision {
    /// Whether the decision allows access.
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }

    /// The denial reason, if denied.
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            Decision::Granted => None,
            Decision::Denied(reason) => Some(*reason),
        }
    }
}
