//! The process-wide hook registry.
//!
//! Hooks are before/after callbacks attached to one operation of one
//! entity kind. Core hooks run before extension hooks of the same
//! phase; within a source, hooks run in registration order. The
//! registry is append-only once frozen (after extension loading
//! completes) and safe for concurrent dispatch.

use async_trait::async_trait;
use atrium_core::error::{EntityError, Result};
use atrium_core::id::RecordId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::record::{Draft, EntityRecord, Patch};

/// The pipeline operation a hook attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Create => "create",
            Op::Update => "update",
            Op::Delete => "delete",
        };
        write!(f, "{}", name)
    }
}

/// Whether a hook runs before or after persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Before persistence; may mutate the payload or abort.
    Before,
    /// After persistence; errors roll the transaction back unless the
    /// hook is declared non-critical.
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => write!(f, "before"),
            Phase::After => write!(f, "after"),
        }
    }
}

/// Who registered a hook. Core hooks always run before extension hooks
/// of the same phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookSource {
    /// Registered by the engine itself.
    Core,
    /// Registered by the named extension.
    Extension(String),
}

impl HookSource {
    fn rank(&self) -> u8 {
        match self {
            HookSource::Core => 0,
            HookSource::Extension(_) => 1,
        }
    }
}

/// A before/after callback attached to one manager operation.
///
/// Implement only the methods matching the (op, phase) pairs the hook is
/// registered for; the rest default to no-ops.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Stable name; registration is idempotent per
    /// `(source, op, phase, name)`.
    fn name(&self) -> &str;

    /// Non-critical hooks log after-phase failures instead of rolling
    /// the operation back.
    fn critical(&self) -> bool {
        true
    }

    /// Runs before a create persists; may mutate the draft.
    async fn before_create(&self, _draft: &mut Draft) -> Result<()> {
        Ok(())
    }

    /// Runs after a create persists.
    async fn after_create(&self, _record: &EntityRecord) -> Result<()> {
        Ok(())
    }

    /// Runs before an update persists; may mutate the patch.
    async fn before_update(&self, _id: RecordId, _patch: &mut Patch) -> Result<()> {
        Ok(())
    }

    /// Runs after an update persists, with the pre-image.
    async fn after_update(&self, _record: &EntityRecord, _previous: &EntityRecord) -> Result<()> {
        Ok(())
    }

    /// Runs before a delete stamps the tombstone.
    async fn before_delete(&self, _record: &EntityRecord) -> Result<()> {
        Ok(())
    }

    /// Runs after a delete stamps the tombstone.
    async fn after_delete(&self, _record: &EntityRecord) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
struct HookEntry {
    source: HookSource,
    name: String,
    critical: bool,
    hook: Arc<dyn Hook>,
}

type HookKey = (String, Op, Phase);

/// Process-wide registry of hooks, keyed by `(kind, op, phase)`.
#[derive(Default)]
pub struct HookRegistry {
    entries: RwLock<HashMap<HookKey, Vec<HookEntry>>>,
    frozen: AtomicBool,
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a hook to `(kind, op, phase)`.
    ///
    /// Registration is idempotent by `(source, op, phase, hook name)`;
    /// re-registering the same hook is a no-op. Core hooks sort before
    /// extension hooks; otherwise registration order is execution order.
    pub fn register(
        &self,
        source: HookSource,
        kind: &str,
        op: Op,
        phase: Phase,
        hook: Arc<dyn Hook>,
    ) -> Result<()> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(EntityError::Validation(format!(
                "hook registry is frozen; cannot register {}.{}.{}",
                kind, op, phase
            ))
            .into());
        }

        let mut entries = self.entries.write();
        let slot = entries
            .entry((kind.to_string(), op, phase))
            .or_default();
        let name = hook.name().to_string();
        if slot
            .iter()
            .any(|e| e.source == source && e.name == name)
        {
            debug!(kind, %op, %phase, hook = %name, "hook already registered");
            return Ok(());
        }
        let critical = hook.critical();
        slot.push(HookEntry {
            source,
            name: name.clone(),
            critical,
            hook,
        });
        // Stable sort keeps registration order within each source.
        slot.sort_by_key(|e| e.source.rank());
        debug!(kind, %op, %phase, hook = %name, "registered hook");
        Ok(())
    }

    /// Stop accepting registrations; dispatch remains available.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
        debug!("hook registry frozen");
    }

    /// Whether the registry is frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    fn hooks_for(&self, kind: &str, op: Op, phase: Phase) -> Vec<HookEntry> {
        self.entries
            .read()
            .get(&(kind.to_string(), op, phase))
            .cloned()
            .unwrap_or_default()
    }

    /// Dispatch the before-create chain. An error aborts the operation.
    pub async fn run_before_create(&self, kind: &str, draft: &mut Draft) -> Result<()> {
        for entry in self.hooks_for(kind, Op::Create, Phase::Before) {
            entry.hook.before_create(draft).await.map_err(|e| {
                EntityError::Hook {
                    hook: entry.name.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// Dispatch the after-create chain. Critical errors abort (and roll
    /// back); non-critical errors are logged.
    pub async fn run_after_create(&self, kind: &str, record: &EntityRecord) -> Result<()> {
        for entry in self.hooks_for(kind, Op::Create, Phase::After) {
            if let Err(e) = entry.hook.after_create(record).await {
                if entry.critical {
                    return Err(EntityError::Hook {
                        hook: entry.name.clone(),
                        reason: e.to_string(),
                    }
                    .into());
                }
                warn!(kind, hook = %entry.name, error = %e, "non-critical after hook failed");
            }
        }
        Ok(())
    }

    /// Dispatch the before-update chain.
    pub async fn run_before_update(&self, kind: &str, id: RecordId, patch: &mut Patch) -> Result<()> {
        for entry in self.hooks_for(kind, Op::Update, Phase::Before) {
            entry.hook.before_update(id, patch).await.map_err(|e| {
                EntityError::Hook {
                    hook: entry.name.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// Dispatch the after-update chain with the pre-image.
    pub async fn run_after_update(
        &self,
        kind: &str,
        record: &EntityRecord,
        previous: &EntityRecord,
    ) -> Result<()> {
        for entry in self.hooks_for(kind, Op::Update, Phase::After) {
            if let Err(e) = entry.hook.after_update(record, previous).await {
                if entry.critical {
                    return Err(EntityError::Hook {
                        hook: entry.name.clone(),
                        reason: e.to_string(),
                    }
                    .into());
                }
                warn!(kind, hook = %entry.name, error = %e, "non-critical after hook failed");
            }
        }
        Ok(())
    }

    /// Dispatch the before-delete chain.
    pub async fn run_before_delete(&self, kind: &str, record: &EntityRecord) -> Result<()> {
        for entry in self.hooks_for(kind, Op::Delete, Phase::Before) {
            entry.hook.before_delete(record).await.map_err(|e| {
                EntityError::Hook {
                    hook: entry.name.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// Dispatch the after-delete chain.
    pub async fn run_after_delete(&self, kind: &str, record: &EntityRecord) -> Result<()> {
        for entry in self.hooks_for(kind, Op::Delete, Phase::After) {
            if let Err(e) = entry.hook.after_delete(record).await {
                if entry.critical {
                    return Err(EntityError::Hook {
                        hook: entry.name.clone(),
                        reason: e.to_string(),
                    }
                    .into());
                }
                warn!(kind, hook = %entry.name, error = %e, "non-critical after hook failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingHook {
        name: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Hook for CountingHook {
        fn name(&self) -> &str {
            &self.name
        }

        async fn before_create(&self, draft: &mut Draft) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            draft
                .attributes
                .insert("touched_by".into(), self.name.clone().into());
            Ok(())
        }
    }

    fn counting(name: &str, calls: Arc<AtomicUsize>) -> Arc<dyn Hook> {
        Arc::new(CountingHook {
            name: name.to_string(),
            calls,
        })
    }

    #[tokio::test]
    async fn test_registration_is_idempotent() {
        let registry = HookRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            registry
                .register(
                    HookSource::Extension("ext".into()),
                    "project",
                    Op::Create,
                    Phase::Before,
                    counting("stamp", calls.clone()),
                )
                .unwrap();
        }

        let mut draft = Draft::new();
        registry
            .run_before_create("project", &mut draft)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_core_hooks_run_before_extension_hooks() {
        let registry = HookRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        // Register the extension hook first; the core hook must still
        // run first and the extension hook overwrite its attribute.
        registry
            .register(
                HookSource::Extension("ext".into()),
                "project",
                Op::Create,
                Phase::Before,
                counting("ext-hook", calls.clone()),
            )
            .unwrap();
        registry
            .register(
                HookSource::Core,
                "project",
                Op::Create,
                Phase::Before,
                counting("core-hook", calls.clone()),
            )
            .unwrap();

        let mut draft = Draft::new();
        registry
            .run_before_create("project", &mut draft)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            draft.attributes.get("touched_by"),
            Some(&serde_json::Value::String("ext-hook".into()))
        );
    }

    #[tokio::test]
    async fn test_frozen_registry_rejects_registration() {
        let registry = HookRegistry::new();
        registry.freeze();
        let calls = Arc::new(AtomicUsize::new(0));
        let result = registry.register(
            HookSource::Core,
            "project",
            Op::Create,
            Phase::Before,
            counting("late", calls),
        );
        assert!(result.is_err());
    }
}
