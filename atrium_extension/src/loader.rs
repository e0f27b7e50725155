//! The extension loader.
//!
//! Extensions are compiled in and registered with the loader; manifests
//! on disk (one `<name>/manifest.json` per extension directory) can be
//! discovered for reporting and for operator-managed enablement. Loading
//! resolves dependency order, verifies advisory system packages, calls
//! each initializer with a scoped context, and records the outcome.

use atrium_core::error::{ExtensionError, Result};
use atrium_entity::{HookRegistry, KindRegistry, ManagerRegistry};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::abilities::AbilityRegistry;
use crate::extension::{Extension, ExtensionContext};
use crate::manifest::ExtensionManifest;
use crate::registry::{ExtensionRegistry, ExtensionState};
use crate::resolver::{resolve, Resolution};

/// Name of the manifest file inside each extension directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Loads extensions against the pipeline registries.
pub struct ExtensionLoader {
    extensions: RwLock<HashMap<String, Arc<dyn Extension>>>,
    registry: Arc<ExtensionRegistry>,
    hooks: Arc<HookRegistry>,
    abilities: Arc<AbilityRegistry>,
    kinds: Arc<KindRegistry>,
    managers: Arc<ManagerRegistry>,
}

impl ExtensionLoader {
    /// Create a loader bound to the pipeline registries.
    pub fn new(
        hooks: Arc<HookRegistry>,
        abilities: Arc<AbilityRegistry>,
        kinds: Arc<KindRegistry>,
        managers: Arc<ManagerRegistry>,
    ) -> Self {
        Self {
            extensions: RwLock::new(HashMap::new()),
            registry: Arc::new(ExtensionRegistry::new()),
            hooks,
            abilities,
            kinds,
            managers,
        }
    }

    /// The loaded-extension registry.
    pub fn registry(&self) -> Arc<ExtensionRegistry> {
        self.registry.clone()
    }

    /// Register a compiled-in extension.
    pub fn register(&self, extension: Arc<dyn Extension>) -> Result<()> {
        let manifest = extension.manifest();
        manifest.validate()?;
        let mut extensions = self.extensions.write();
        if extensions.contains_key(&manifest.name) {
            return Err(ExtensionError::AlreadyLoaded(manifest.name).into());
        }
        debug!(extension = %manifest.name, version = %manifest.version, "registered extension");
        extensions.insert(manifest.name.clone(), extension);
        Ok(())
    }

    /// Scan a directory for `<name>/manifest.json` files.
    ///
    /// Used for operator-facing reports; a manifest on disk for an
    /// extension that is not compiled in is reported and skipped.
    pub fn discover_manifests(&self, directory: &Path) -> Result<Vec<ExtensionManifest>> {
        let mut manifests = Vec::new();
        if !directory.is_dir() {
            warn!(directory = %directory.display(), "extension directory not found");
            return Ok(manifests);
        }
        let mut entries: Vec<_> = std::fs::read_dir(directory)?
            .filter_map(std::result::Result::ok)
            .collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let manifest_path = entry.path().join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&manifest_path)?;
            let manifest: ExtensionManifest = serde_json::from_str(&content).map_err(|e| {
                ExtensionError::InvalidManifest(format!("{}: {}", manifest_path.display(), e))
            })?;
            manifest.validate()?;
            if manifest.name != entry.file_name().to_string_lossy() {
                return Err(ExtensionError::InvalidManifest(format!(
                    "manifest name '{}' does not match directory '{}'",
                    manifest.name,
                    entry.file_name().to_string_lossy()
                ))
                .into());
            }
            manifests.push(manifest);
        }
        info!(count = manifests.len(), "discovered extension manifests");
        Ok(manifests)
    }

    /// Advisory check for declared system packages. The core only
    /// reports; provisioning is an operator concern.
    fn report_system_packages(&self, manifest: &ExtensionManifest) {
        for package in &manifest.system_packages {
            debug!(
                extension = %manifest.name,
                package = %package.name,
                "extension expects system package"
            );
        }
    }

    /// Load the enabled extensions: resolve order, initialize each in
    /// turn, and register hooks and abilities through scoped contexts.
    ///
    /// Unsatisfied dependencies make an extension unloadable (reported,
    /// not fatal); a dependency cycle aborts loading. An initializer
    /// failure marks that extension failed and loading continues.
    pub async fn load(&self, enabled: &[String]) -> Result<Resolution> {
        let extensions = self.extensions.read().clone();

        let mut manifests = Vec::new();
        for name in enabled {
            match extensions.get(name) {
                Some(extension) => manifests.push(extension.manifest()),
                None => warn!(extension = %name, "enabled extension is not registered"),
            }
        }

        let resolution = resolve(&manifests)?;

        for unloadable in &resolution.unloadable {
            if let Some(extension) = extensions.get(&unloadable.name) {
                let manifest = extension.manifest();
                self.registry.record(
                    &unloadable.name,
                    manifest.parsed_version()?,
                    ExtensionState::Unloadable,
                );
            }
        }

        for name in &resolution.order {
            let extension = extensions
                .get(name)
                .cloned()
                .ok_or_else(|| ExtensionError::NotFound(name.clone()))?;
            let manifest = extension.manifest();
            let version = manifest.parsed_version()?;
            self.registry
                .record(name, version.clone(), ExtensionState::Registered);
            self.report_system_packages(&manifest);

            let ctx = ExtensionContext::new(
                name.clone(),
                self.hooks.clone(),
                self.abilities.clone(),
                self.kinds.clone(),
                self.managers.clone(),
            );
            match extension.initialize(&ctx).await {
                Ok(()) => {
                    self.abilities
                        .declare_capabilities(name, extension.capabilities());
                    self.registry.set_state(name, ExtensionState::Initialized);
                    info!(extension = %name, version = %version, "extension initialized");
                }
                Err(e) => {
                    error!(extension = %name, error = %e, "extension failed to initialize");
                    self.registry.set_state(name, ExtensionState::Failed);
                }
            }
        }

        Ok(resolution)
    }
}
