//! System bootstrap and shutdown.
//!
//! Bootstrap runs once, before any request handling, in four phases:
//! directory setup (distinguished principals and the default role
//! forest), extension loading (resolution, initialization, registry
//! freeze), seeding, and service start. Shutdown stops services and
//! runs their cleanups.

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::{info, warn};

use atrium_core::id::RoleId;
use atrium_core::types::Principal;
use atrium_entity::{
    HookRegistry, InMemoryEntityStore, KindRegistry, ManagerContext, ManagerRegistry,
};
use atrium_extension::{AbilityRegistry, ExtensionLoader, Resolution};
use atrium_permission::{
    DirectoryStore, GrantStore, InMemoryDirectory, InMemoryGrantStore, PermissionEngine, Role,
    ROLE_ADMIN, ROLE_SUPERADMIN, ROLE_USER,
};
use atrium_service::ServiceRegistry;

use crate::config::RuntimeConfig;
use crate::seed::{Seed, Seeder};

/// Stable indices for the seeded role forest.
const SEED_ROLE_SUPERADMIN: u64 = 0x10;
const SEED_ROLE_ADMIN: u64 = 0x11;
const SEED_ROLE_USER: u64 = 0x12;

/// Errors that can occur during bootstrap
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Phase '{0}' failed: {1}")]
    PhaseFailed(&'static str, String),
}

/// The assembled Atrium system.
///
/// Holds every registry and store behind `Arc`s; in-memory store
/// implementations back development and tests, and a deployment swaps
/// in driver-backed ones without touching bootstrap order.
pub struct System {
    config: RuntimeConfig,
    ctx: ManagerContext,
    directory: Arc<InMemoryDirectory>,
    grants: Arc<InMemoryGrantStore>,
    managers: Arc<ManagerRegistry>,
    abilities: Arc<AbilityRegistry>,
    loader: ExtensionLoader,
    services: Arc<ServiceRegistry>,
}

impl System {
    /// Assemble a system from configuration. Nothing runs until
    /// [`System::bootstrap`].
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let directory = Arc::new(InMemoryDirectory::new());
        let grants = Arc::new(InMemoryGrantStore::new());
        let engine = Arc::new(PermissionEngine::new(
            config.system_principals(),
            directory.clone() as Arc<dyn DirectoryStore>,
            grants.clone() as Arc<dyn GrantStore>,
            config.max_team_depth,
        ));

        let ctx = ManagerContext {
            engine,
            store: Arc::new(InMemoryEntityStore::new()),
            hooks: Arc::new(HookRegistry::new()),
            kinds: Arc::new(KindRegistry::new()),
        };

        let managers = Arc::new(ManagerRegistry::new());
        let abilities = Arc::new(AbilityRegistry::new());
        let loader = ExtensionLoader::new(
            ctx.hooks.clone(),
            abilities.clone(),
            ctx.kinds.clone(),
            managers.clone(),
        );
        let services = Arc::new(ServiceRegistry::new(config.system_id));

        Ok(Self {
            config,
            ctx,
            directory,
            grants,
            managers,
            abilities,
            loader,
            services,
        })
    }

    /// The runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The shared pipeline context.
    pub fn context(&self) -> ManagerContext {
        self.ctx.clone()
    }

    /// The directory store.
    pub fn directory(&self) -> Arc<InMemoryDirectory> {
        self.directory.clone()
    }

    /// The grant store.
    pub fn grants(&self) -> Arc<InMemoryGrantStore> {
        self.grants.clone()
    }

    /// The manager registry.
    pub fn managers(&self) -> Arc<ManagerRegistry> {
        self.managers.clone()
    }

    /// The ability registry.
    pub fn abilities(&self) -> Arc<AbilityRegistry> {
        self.abilities.clone()
    }

    /// The extension loader; register compiled-in extensions before
    /// bootstrapping.
    pub fn loader(&self) -> &ExtensionLoader {
        &self.loader
    }

    /// The service registry; register services before bootstrapping.
    pub fn services(&self) -> Arc<ServiceRegistry> {
        self.services.clone()
    }

    /// Run the bootstrap sequence.
    pub async fn bootstrap(&self, seeds: &[Seed]) -> Result<Resolution> {
        info!("starting system bootstrap");

        self.bootstrap_directory()
            .map_err(|e| BootstrapError::PhaseFailed("directory", e.to_string()))?;

        let resolution = self
            .loader
            .load(&self.config.enabled_extensions)
            .await
            .map_err(|e| BootstrapError::PhaseFailed("extensions", e.to_string()))?;
        for unloadable in &resolution.unloadable {
            warn!(
                extension = %unloadable.name,
                reasons = ?unloadable.reasons,
                "extension did not load"
            );
        }
        // The hook registry is append-only from here on.
        self.ctx.hooks.freeze();

        if self.config.seed_data {
            let seeder = Seeder::new(self.ctx.clone(), self.config.system_principals());
            seeder
                .seed(seeds)
                .await
                .map_err(|e| BootstrapError::PhaseFailed("seeding", e.to_string()))?;
        } else {
            info!("seeding disabled by configuration");
        }

        self.services.start_all();

        info!("system bootstrap complete");
        Ok(resolution)
    }

    /// Install the distinguished principals and the default role
    /// forest, then refresh the hierarchy snapshot.
    fn bootstrap_directory(&self) -> atrium_core::error::Result<()> {
        let system = self.config.system_principals();
        self.directory
            .upsert_principal(Principal::new(system.root, "root"))?;
        self.directory
            .upsert_principal(Principal::new(system.system, "system"))?;
        self.directory
            .upsert_principal(Principal::new(system.template, "template"))?;

        let superadmin = RoleId::seeded(SEED_ROLE_SUPERADMIN);
        let admin = RoleId::seeded(SEED_ROLE_ADMIN);
        let user = RoleId::seeded(SEED_ROLE_USER);
        self.directory
            .upsert_role(Role::root(superadmin, ROLE_SUPERADMIN))?;
        self.directory
            .upsert_role(Role::child_of(admin, ROLE_ADMIN, superadmin))?;
        self.directory
            .upsert_role(Role::child_of(user, ROLE_USER, admin))?;

        self.ctx.engine.hierarchy().invalidate();
        info!("directory bootstrapped");
        Ok(())
    }

    /// Stop services and run their cleanups.
    pub async fn shutdown(&self) {
        info!("shutting down system");
        self.services.stop_all().await;
        self.services.cleanup_all().await;
        info!("system shutdown complete");
    }
}
