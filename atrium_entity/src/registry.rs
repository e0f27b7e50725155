//! Kind and manager registries.
//!
//! Two late-binding tables break the cycle between managers and hooks:
//! the kind registry maps kind names to descriptors (and doubles as the
//! permission engine's resource resolver together with the store), and
//! the manager registry maps kind names to manager factories so callers
//! and extensions look managers up by name instead of holding direct
//! references.

use atrium_core::error::{EntityError, Result};
use atrium_core::id::{RecordId, TeamId, UserId};
use atrium_core::types::KindDescriptor;
use atrium_permission::{ResourceFacts, ResourceResolver};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::manager::{Manager, ManagerContext};
use crate::store::EntityStore;

/// Process-wide table of kind descriptors.
#[derive(Default)]
pub struct KindRegistry {
    kinds: RwLock<HashMap<String, KindDescriptor>>,
}

impl KindRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Fails on inconsistent descriptors and on
    /// duplicate kind names.
    pub fn register(&self, descriptor: KindDescriptor) -> Result<()> {
        descriptor
            .validate()
            .map_err(EntityError::Validation)?;
        let mut kinds = self.kinds.write();
        if kinds.contains_key(&descriptor.kind) {
            return Err(EntityError::Conflict(format!(
                "kind '{}' is already registered",
                descriptor.kind
            ))
            .into());
        }
        debug!(kind = %descriptor.kind, "registered kind");
        kinds.insert(descriptor.kind.clone(), descriptor);
        Ok(())
    }

    /// Fetch a descriptor.
    pub fn get(&self, kind: &str) -> Option<KindDescriptor> {
        self.kinds.read().get(kind).cloned()
    }

    /// Fetch a descriptor or fail with `UnknownKind`.
    pub fn require(&self, kind: &str) -> Result<KindDescriptor> {
        self.get(kind)
            .ok_or_else(|| EntityError::UnknownKind(kind.to_string()).into())
    }

    /// All registered descriptors.
    pub fn all(&self) -> Vec<KindDescriptor> {
        self.kinds.read().values().cloned().collect()
    }
}

/// Resolver handing the permission engine record facts out of the
/// entity store.
#[derive(Clone)]
pub struct PipelineResolver {
    store: Arc<dyn EntityStore>,
    kinds: Arc<KindRegistry>,
}

impl PipelineResolver {
    /// Build a resolver over a store and kind registry.
    pub fn new(store: Arc<dyn EntityStore>, kinds: Arc<KindRegistry>) -> Self {
        Self { store, kinds }
    }
}

impl ResourceResolver for PipelineResolver {
    fn resource(&self, kind: &str, id: RecordId) -> Option<ResourceFacts> {
        let descriptor = self.kinds.get(kind)?;
        let record = self.store.fetch(kind, id)?;
        Some(record.facts(&descriptor))
    }

    fn descriptor(&self, kind: &str) -> Option<KindDescriptor> {
        self.kinds.get(kind)
    }
}

/// Factory producing a configured manager for one kind.
pub type ManagerFactory = Arc<
    dyn Fn(ManagerContext, UserId, Option<UserId>, Option<TeamId>) -> Result<Manager>
        + Send
        + Sync,
>;

/// Late-binding table of manager factories, keyed by kind name.
///
/// Extensions add entries for the kinds they own; transports look
/// managers up here per request.
#[derive(Default)]
pub struct ManagerRegistry {
    factories: RwLock<HashMap<String, ManagerFactory>>,
}

impl ManagerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a kind. Later registrations replace
    /// earlier ones, letting extensions specialize a core manager.
    pub fn register(&self, kind: impl Into<String>, factory: ManagerFactory) {
        let kind = kind.into();
        debug!(kind = %kind, "registered manager factory");
        self.factories.write().insert(kind, factory);
    }

    /// Kinds with a registered manager.
    pub fn kinds(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Construct a manager for `kind` acting as `requester`, optionally
    /// targeting another user or team.
    pub fn manager_for(
        &self,
        kind: &str,
        ctx: ManagerContext,
        requester: UserId,
        target_user: Option<UserId>,
        target_team: Option<TeamId>,
    ) -> Result<Manager> {
        let factory = self
            .factories
            .read()
            .get(kind)
            .cloned()
            .ok_or_else(|| EntityError::UnknownKind(kind.to_string()))?;
        factory(ctx, requester, target_user, target_team)
    }
}
