//! The extension trait and initialization context.

use async_trait::async_trait;
use atrium_core::error::Result;
use atrium_entity::{
    Hook, HookRegistry, HookSource, KindRegistry, ManagerFactory, ManagerRegistry, Op, Phase,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::abilities::{Ability, AbilityRegistry};
use crate::manifest::ExtensionManifest;

/// A loadable extension.
///
/// Extensions are compiled into the binary and registered with the
/// loader; the manifest (also shipped on disk next to any extension
/// assets) drives dependency resolution, and `initialize` is called in
/// resolution order with a context scoped to the extension.
#[async_trait]
pub trait Extension: Send + Sync {
    /// The extension's manifest.
    fn manifest(&self) -> ExtensionManifest;

    /// Capabilities this extension supports, gating its abilities.
    fn capabilities(&self) -> HashSet<String> {
        HashSet::new()
    }

    /// Called once, in dependency order, after every dependency has
    /// initialized. Register hooks, abilities, kinds, and managers
    /// through the context.
    async fn initialize(&self, ctx: &ExtensionContext) -> Result<()>;
}

/// Registration surface handed to an extension during initialization.
///
/// Everything registered through the context is tagged with the
/// extension's name, which keeps hook registration idempotent and makes
/// ability lookup addressable by `(extension, name)`.
pub struct ExtensionContext {
    extension: String,
    hooks: Arc<HookRegistry>,
    abilities: Arc<AbilityRegistry>,
    kinds: Arc<KindRegistry>,
    managers: Arc<ManagerRegistry>,
}

impl ExtensionContext {
    /// Build a context scoped to one extension.
    pub fn new(
        extension: impl Into<String>,
        hooks: Arc<HookRegistry>,
        abilities: Arc<AbilityRegistry>,
        kinds: Arc<KindRegistry>,
        managers: Arc<ManagerRegistry>,
    ) -> Self {
        Self {
            extension: extension.into(),
            hooks,
            abilities,
            kinds,
            managers,
        }
    }

    /// The extension this context is scoped to.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Attach a hook to a manager operation.
    pub fn register_hook(
        &self,
        kind: &str,
        op: Op,
        phase: Phase,
        hook: Arc<dyn Hook>,
    ) -> Result<()> {
        self.hooks.register(
            HookSource::Extension(self.extension.clone()),
            kind,
            op,
            phase,
            hook,
        )
    }

    /// Expose an ability under this extension's name.
    pub fn register_ability(&self, ability: Arc<dyn Ability>) {
        self.abilities.register(&self.extension, ability);
    }

    /// Register an entity kind owned by this extension.
    pub fn register_kind(&self, descriptor: atrium_core::types::KindDescriptor) -> Result<()> {
        self.kinds.register(descriptor)
    }

    /// Register (or replace) the manager factory for a kind.
    pub fn register_manager(&self, kind: &str, factory: ManagerFactory) {
        self.managers.register(kind, factory)
    }
}
