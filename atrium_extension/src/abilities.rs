//! The ability registry.
//!
//! An ability is a named async callable an extension exposes for
//! invocation by name. Abilities may gate themselves on a capability;
//! invoking a gated ability of an extension that never declared the
//! capability is refused rather than attempted.

use async_trait::async_trait;
use atrium_core::error::{ExtensionError, Result};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

/// A named async callable exposed by an extension.
#[async_trait]
pub trait Ability: Send + Sync {
    /// Stable ability name, unique within the owning extension.
    fn name(&self) -> &str;

    /// Capability the owning extension must declare for this ability to
    /// be invocable.
    fn required_capability(&self) -> Option<&str> {
        None
    }

    /// Run the ability.
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Process-wide registry of abilities, keyed by
/// `(extension, ability name)`.
#[derive(Default)]
pub struct AbilityRegistry {
    abilities: DashMap<(String, String), Arc<dyn Ability>>,
    capabilities: DashMap<String, HashSet<String>>,
}

impl AbilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the capabilities an extension supports.
    pub fn declare_capabilities(&self, extension: &str, capabilities: HashSet<String>) {
        self.capabilities.insert(extension.to_string(), capabilities);
    }

    /// Register one ability under an extension. Re-registering the same
    /// name replaces the previous callable.
    pub fn register(&self, extension: &str, ability: Arc<dyn Ability>) {
        debug!(extension, ability = ability.name(), "registered ability");
        self.abilities
            .insert((extension.to_string(), ability.name().to_string()), ability);
    }

    /// Names of the abilities one extension exposes.
    pub fn names_for(&self, extension: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .abilities
            .iter()
            .filter(|entry| entry.key().0 == extension)
            .map(|entry| entry.key().1.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Invoke `(extension, name)` with `args`.
    ///
    /// Unknown abilities are not-found; abilities gated on a capability
    /// the extension never declared are denied; runtime failures are
    /// reported with the extension and ability named, for the caller's
    /// failure accounting.
    pub async fn execute(&self, extension: &str, name: &str, args: Value) -> Result<Value> {
        let ability = self
            .abilities
            .get(&(extension.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ExtensionError::AbilityNotFound {
                extension: extension.to_string(),
                ability: name.to_string(),
            })?;

        if let Some(capability) = ability.required_capability() {
            let supported = self
                .capabilities
                .get(extension)
                .map(|set| set.contains(capability))
                .unwrap_or(false);
            if !supported {
                return Err(ExtensionError::AbilityDenied {
                    extension: extension.to_string(),
                    ability: name.to_string(),
                    reason: format!("capability '{}' is not supported", capability),
                }
                .into());
            }
        }

        ability.execute(args).await.map_err(|e| {
            error!(extension, ability = name, error = %e, "ability failed");
            ExtensionError::AbilityFailed {
                extension: extension.to_string(),
                ability: name.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}
