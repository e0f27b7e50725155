//! # Atrium Entity
//!
//! `atrium_entity` is the generic CRUD pipeline of the Atrium engine.
//! Each entity kind is served by a [`Manager`] that validates input,
//! consults the permission engine, dispatches before/after hooks,
//! stamps audit fields, soft-deletes, and persists through a session
//! with all-or-nothing semantics.
//!
//! ## Structure
//!
//! - **record**: records, drafts, patches
//! - **hooks**: the process-wide hook registry
//! - **search**: per-field search clauses and transformers
//! - **store**: the session abstraction and the in-memory store
//! - **manager**: the pipeline operations
//! - **registry**: kind descriptors and late-binding manager lookup

pub mod hooks;
pub mod manager;
pub mod record;
pub mod registry;
pub mod search;
pub mod store;

pub use hooks::{Hook, HookRegistry, HookSource, Op, Phase};
pub use manager::{
    BatchErrorMode, BatchOutcome, EntityView, GetOptions, ListOptions, Manager, ManagerContext,
    Validator,
};
pub use record::{Draft, EntityRecord, Patch};
pub use registry::{KindRegistry, ManagerFactory, ManagerRegistry, PipelineResolver};
pub use search::{
    BoolClause, DateClause, NumberClause, SearchClause, SearchTransformer, SearchTransformers,
    StringClause,
};
pub use store::{EntityStore, InMemoryEntityStore, SessionHandle, StoreSession};
