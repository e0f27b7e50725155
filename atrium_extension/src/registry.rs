//! Registry of loaded extensions.

use atrium_core::utils::Version;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Lifecycle state of one extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionState {
    /// Known to the loader but not yet initialized.
    Registered,
    /// Initialized successfully.
    Initialized,
    /// Dependency resolution ruled it out.
    Unloadable,
    /// Its initializer failed.
    Failed,
}

/// One loaded (or rejected) extension.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedExtension {
    /// Extension name.
    pub name: String,
    /// Declared version.
    pub version: Version,
    /// Current state.
    pub state: ExtensionState,
}

/// Tracks every extension the loader has seen, with its version and
/// state. Dependency checks against "what is loaded" read this.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: RwLock<HashMap<String, LoadedExtension>>,
}

impl ExtensionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an extension with the given state.
    pub fn record(&self, name: &str, version: Version, state: ExtensionState) {
        self.extensions.write().insert(
            name.to_string(),
            LoadedExtension {
                name: name.to_string(),
                version,
                state,
            },
        );
    }

    /// Update the state of a known extension.
    pub fn set_state(&self, name: &str, state: ExtensionState) {
        if let Some(extension) = self.extensions.write().get_mut(name) {
            extension.state = state;
        }
    }

    /// Fetch one extension's entry.
    pub fn get(&self, name: &str) -> Option<LoadedExtension> {
        self.extensions.read().get(name).cloned()
    }

    /// Versions of every successfully initialized extension.
    pub fn initialized_versions(&self) -> HashMap<String, Version> {
        self.extensions
            .read()
            .values()
            .filter(|e| e.state == ExtensionState::Initialized)
            .map(|e| (e.name.clone(), e.version.clone()))
            .collect()
    }

    /// Every entry, in unspecified order.
    pub fn all(&self) -> Vec<LoadedExtension> {
        self.extensions.read().values().cloned().collect()
    }
}
