//! Strongly-typed identifiers for the Atrium engine.
//!
//! This module provides a set of identifier types used throughout the
//! system. Each identifier type is a thin wrapper around a UUID with a
//! phantom type parameter, so identifiers for different entity classes
//! cannot be mixed up even though they share the same representation.
//!
//! A slice of the UUID space is reserved for records installed by the
//! engine itself: any identifier whose leading group is `ffffffff`
//! belongs to a seeded or distinguished principal/record. See
//! [`Id::seeded`] and [`Id::is_reserved`].

use serde::{Deserialize, Serialize};
use std::cmp::{Ord, PartialOrd};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// High group marking an identifier as engine-reserved.
const RESERVED_PREFIX: u32 = 0xFFFF_FFFF;

/// A type-safe identifier based on UUID.
///
/// The phantom parameter `T` specializes the identifier for one entity
/// class. `UserId` and `TeamId` with the same underlying UUID are still
/// different types and will not compare or assign across classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Id<T> {
    uuid: Uuid,
    #[serde(skip)]
    _marker: std::marker::PhantomData<T>,
}

impl<T> Id<T> {
    /// Create a new random identifier (UUID v4).
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Wrap a known UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The nil (all zeros) identifier, usable as a sentinel.
    pub fn nil() -> Self {
        Self::from_uuid(Uuid::nil())
    }

    /// Check whether this is the nil identifier.
    pub fn is_nil(&self) -> bool {
        self.uuid == Uuid::nil()
    }

    /// Mint a deterministic identifier in the reserved seed range.
    ///
    /// Seeded identifiers have the shape `ffffffff-ffff-ffff-5eed-XXXX…`,
    /// where the trailing digits encode `index`. Reseeding with the same
    /// index always yields the same identifier, which is what makes
    /// seeding idempotent.
    pub fn seeded(index: u64) -> Self {
        // The node field holds 48 bits; higher bits would overflow it.
        let s = format!("ffffffff-ffff-ffff-5eed-{:012x}", index & 0xFFFF_FFFF_FFFF);
        Self::from_uuid(Uuid::parse_str(&s).expect("seed id pattern is a valid uuid"))
    }

    /// Check whether this identifier lives in the reserved range.
    ///
    /// Reserved identifiers cover the three distinguished principals and
    /// every seeded record.
    pub fn is_reserved(&self) -> bool {
        self.uuid.as_fields().0 == RESERVED_PREFIX
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_uuid(Uuid::parse_str(s)?))
    }
}

/// Marker type for principals (users and the distinguished identities).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserMarker;
/// Identifier for a principal.
pub type UserId = Id<UserMarker>;

/// Marker type for teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamMarker;
/// Identifier for a team.
pub type TeamId = Id<TeamMarker>;

/// Marker type for roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleMarker;
/// Identifier for a role.
pub type RoleId = Id<RoleMarker>;

/// Marker type for managed entity records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordMarker;
/// Identifier for a managed record of any kind.
pub type RecordId = Id<RecordMarker>;

/// Marker type for permission grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrantMarker;
/// Identifier for a permission grant.
pub type GrantId = Id<GrantMarker>;
