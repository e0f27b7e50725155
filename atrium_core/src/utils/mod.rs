//! Utility functions and helpers.

pub mod version;

pub use version::{Comparator, Version, VersionParseError, VersionReq};
