//! Error types for the Atrium engine.
//!
//! This module defines the error hierarchy used throughout the system.
//! Errors are organized by subsystem, with each subsystem having its own
//! error type, and a root `Error` that wraps any of them for uniform
//! handling at the top level.
//!
//! The externally visible taxonomy (validation, permission, conflict,
//! not-found, precondition, internal) lives on the subsystem enums; the
//! manager boundary additionally collapses permission denials into
//! not-found responses where disclosing existence would leak.

use crate::id::RecordId;
use thiserror::Error;

/// Root error type for the Atrium system.
#[derive(Debug, Error)]
pub enum Error {
    /// Permission evaluation and grant management errors
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    /// Entity pipeline errors
    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),

    /// Extension loading and ability errors
    #[error("Extension error: {0}")]
    Extension(#[from] ExtensionError),

    /// Service supervision errors
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Seeding errors
    #[error("Seed error: {0}")]
    Seed(#[from] SeedError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected failures wrapped at the pipeline boundary
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Errors produced by the permission engine and grant stores.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// Policy denied the requested access
    #[error("Permission denied: {0}")]
    Denied(String),

    /// The kind is system-flagged and the principal may not mutate it
    #[error("System kind is only mutable by root or system: {0}")]
    SystemProtected(String),

    /// Role lookup failed
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Team parent chain exceeded the configured bound
    #[error("Team hierarchy exceeds maximum depth {0}")]
    DepthExceeded(usize),

    /// A permission reference chain looped back on itself
    #[error("Circular permission reference via {0}")]
    CircularReference(String),

    /// A principal tried to delegate access it does not hold
    #[error("Grant delegation denied: {0}")]
    DelegationDenied(String),
}

/// Errors produced by the entity pipeline.
#[derive(Debug, Error)]
pub enum EntityError {
    /// Input failed shape or constraint validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Target record is absent, deleted, or hidden from the requester
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind name
        kind: String,
        /// Record identifier
        id: RecordId,
    },

    /// Unique-key violation or concurrent mutation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An opted-in guard (such as the `updated_at` check) did not hold
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// A projection or search named a field the kind does not declare
    #[error("Unknown field for {kind}: {field}")]
    UnknownField {
        /// Entity kind name
        kind: String,
        /// Offending field name
        field: String,
    },

    /// An include named a relation the kind does not declare
    #[error("Unknown relation for {kind}: {relation}")]
    UnknownRelation {
        /// Entity kind name
        kind: String,
        /// Offending relation name
        relation: String,
    },

    /// No manager or descriptor is registered for the kind
    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),

    /// A before/after hook aborted the operation
    #[error("Hook '{hook}' failed: {reason}")]
    Hook {
        /// Registered hook name
        hook: String,
        /// Failure reason reported by the hook
        reason: String,
    },

    /// One or more items of a batch operation failed
    #[error("Batch operation failed: {succeeded} succeeded, {} failed", .errors.len())]
    Batch {
        /// Number of items that succeeded
        succeeded: usize,
        /// Per-item failures, keyed by the item identifier
        errors: Vec<(String, String)>,
    },
}

/// Errors produced by the extension loader.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// Extension with the given name was not found
    #[error("Extension not found: {0}")]
    NotFound(String),

    /// An extension with the same name is already loaded
    #[error("Extension already loaded: {0}")]
    AlreadyLoaded(String),

    /// The dependency graph contains a cycle
    #[error("Extension dependency cycle: {}", cycle.join(" -> "))]
    Cycle {
        /// The members of the cycle in traversal order
        cycle: Vec<String>,
    },

    /// A required dependency is missing or version-incompatible
    #[error("Extension {extension} requires {dependency}: {reason}")]
    DependencyUnsatisfied {
        /// The dependent extension
        extension: String,
        /// The missing or incompatible dependency
        dependency: String,
        /// Why the dependency is not satisfied
        reason: String,
    },

    /// The manifest file could not be parsed or is inconsistent
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// The extension initializer returned an error
    #[error("Extension {0} failed to initialize: {1}")]
    InitFailed(String, String),

    /// No ability with the given name is registered for the extension
    #[error("Ability not found: {extension}/{ability}")]
    AbilityNotFound {
        /// Owning extension
        extension: String,
        /// Ability name
        ability: String,
    },

    /// The ability exists but the extension does not support the capability
    #[error("Ability denied: {extension}/{ability}: {reason}")]
    AbilityDenied {
        /// Owning extension
        extension: String,
        /// Ability name
        ability: String,
        /// Why the invocation was refused
        reason: String,
    },

    /// The ability ran and failed
    #[error("Ability {extension}/{ability} failed: {reason}")]
    AbilityFailed {
        /// Owning extension
        extension: String,
        /// Ability name
        ability: String,
        /// Failure reason
        reason: String,
    },
}

/// Errors produced by the service supervisor.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Service with the given name was not found
    #[error("Service not found: {0}")]
    NotFound(String),

    /// A service with the same name is already registered
    #[error("Service already registered: {0}")]
    AlreadyRegistered(String),

    /// The requested state transition is not legal
    #[error("Service {service}: illegal transition {from} -> {to}")]
    InvalidTransition {
        /// Service name
        service: String,
        /// State the service was in
        from: String,
        /// State that was requested
        to: String,
    },

    /// The service exceeded its failure budget and was stopped
    #[error("Service {service} stopped after {failures} consecutive failures")]
    MaxFailures {
        /// Service name
        service: String,
        /// Consecutive failures observed
        failures: u32,
    },

    /// A single tick of the service failed
    #[error("Service update failed: {0}")]
    UpdateFailed(String),
}

/// Errors produced by the seeder.
#[derive(Debug, Error)]
pub enum SeedError {
    /// A seed item references a kind with no registered manager
    #[error("Seed references unknown kind: {0}")]
    UnknownKind(String),

    /// A seed item could not be created
    #[error("Seeding {kind} failed: {reason}")]
    Failed {
        /// Entity kind being seeded
        kind: String,
        /// Failure reason
        reason: String,
    },
}

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent
    #[error("Missing configuration value: {0}")]
    Missing(String),

    /// A variable was present but could not be parsed
    #[error("Invalid configuration value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: String,
        /// Why parsing failed
        reason: String,
    },
}

/// Result type used throughout the Atrium system.
pub type Result<T> = std::result::Result<T, Error>;
