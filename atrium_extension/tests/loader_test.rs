//! Integration tests for the extension loader: ordered initialization,
//! hook and ability registration, unloadable reporting, and on-disk
//! manifest discovery.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use atrium_core::error::Result;
use atrium_entity::{Draft, Hook, HookRegistry, KindRegistry, ManagerRegistry, Op, Phase};
use atrium_extension::{
    Ability, AbilityRegistry, ExtDependency, Extension, ExtensionContext, ExtensionLoader,
    ExtensionManifest, ExtensionState,
};

struct Echo;

#[async_trait]
impl Ability for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        Ok(args)
    }
}

struct TagHook;

#[async_trait]
impl Hook for TagHook {
    fn name(&self) -> &str {
        "tag"
    }

    async fn before_create(&self, draft: &mut Draft) -> Result<()> {
        draft.attributes.insert("tagged".into(), true.into());
        Ok(())
    }
}

/// Records initialization order into a shared log.
struct StubExtension {
    manifest: ExtensionManifest,
    log: Arc<Mutex<Vec<String>>>,
    register_components: bool,
}

#[async_trait]
impl Extension for StubExtension {
    fn manifest(&self) -> ExtensionManifest {
        self.manifest.clone()
    }

    async fn initialize(&self, ctx: &ExtensionContext) -> Result<()> {
        self.log.lock().push(self.manifest.name.clone());
        if self.register_components {
            ctx.register_ability(Arc::new(Echo));
            ctx.register_hook("project", Op::Create, Phase::Before, Arc::new(TagHook))?;
        }
        Ok(())
    }
}

struct Rig {
    loader: ExtensionLoader,
    hooks: Arc<HookRegistry>,
    abilities: Arc<AbilityRegistry>,
    log: Arc<Mutex<Vec<String>>>,
}

fn rig() -> Rig {
    let hooks = Arc::new(HookRegistry::new());
    let abilities = Arc::new(AbilityRegistry::new());
    let kinds = Arc::new(KindRegistry::new());
    let managers = Arc::new(ManagerRegistry::new());
    let loader = ExtensionLoader::new(hooks.clone(), abilities.clone(), kinds, managers);
    Rig {
        loader,
        hooks,
        abilities,
        log: Arc::new(Mutex::new(Vec::new())),
    }
}

fn stub(rig: &Rig, manifest: ExtensionManifest, register_components: bool) -> Arc<dyn Extension> {
    Arc::new(StubExtension {
        manifest,
        log: rig.log.clone(),
        register_components,
    })
}

#[tokio::test]
async fn extensions_initialize_in_dependency_order() {
    let rig = rig();
    let e1 = ExtensionManifest::new("e1", "1.0.0");
    let e2 = ExtensionManifest::new("e2", "1.0.0")
        .with_dependency(ExtDependency::optional("e1"));
    let e3 = ExtensionManifest::new("e3", "1.0.0")
        .with_dependency(ExtDependency::required("e1"));

    rig.loader.register(stub(&rig, e1, true)).unwrap();
    rig.loader.register(stub(&rig, e2, false)).unwrap();
    rig.loader.register(stub(&rig, e3, false)).unwrap();

    let resolution = rig
        .loader
        .load(&["e1".into(), "e2".into(), "e3".into()])
        .await
        .unwrap();

    assert_eq!(resolution.order, vec!["e1", "e2", "e3"]);
    assert_eq!(*rig.log.lock(), vec!["e1", "e2", "e3"]);

    // E1's components landed in the registries.
    let echoed = rig
        .abilities
        .execute("e1", "echo", json!({"ping": true}))
        .await
        .unwrap();
    assert_eq!(echoed, json!({"ping": true}));

    let mut draft = Draft::new();
    rig.hooks
        .run_before_create("project", &mut draft)
        .await
        .unwrap();
    assert_eq!(draft.attributes.get("tagged"), Some(&true.into()));
}

#[tokio::test]
async fn missing_required_dependency_is_reported_not_fatal() {
    let rig = rig();
    let e2 = ExtensionManifest::new("e2", "1.0.0")
        .with_dependency(ExtDependency::optional("e1"));
    let e3 = ExtensionManifest::new("e3", "1.0.0")
        .with_dependency(ExtDependency::required("e1"));

    rig.loader.register(stub(&rig, e2, false)).unwrap();
    rig.loader.register(stub(&rig, e3, false)).unwrap();

    let resolution = rig.loader.load(&["e2".into(), "e3".into()]).await.unwrap();

    assert_eq!(resolution.order, vec!["e2"]);
    assert_eq!(resolution.unloadable.len(), 1);
    assert_eq!(resolution.unloadable[0].name, "e3");
    assert_eq!(*rig.log.lock(), vec!["e2"]);

    let registry = rig.loader.registry();
    assert_eq!(
        registry.get("e3").map(|e| e.state),
        Some(ExtensionState::Unloadable)
    );
    assert_eq!(
        registry.get("e2").map(|e| e.state),
        Some(ExtensionState::Initialized)
    );
}

struct FailingExtension;

#[async_trait]
impl Extension for FailingExtension {
    fn manifest(&self) -> ExtensionManifest {
        ExtensionManifest::new("broken", "1.0.0")
    }

    async fn initialize(&self, _ctx: &ExtensionContext) -> Result<()> {
        Err(atrium_core::error::ExtensionError::InitFailed(
            "broken".into(),
            "refused to start".into(),
        )
        .into())
    }
}

#[tokio::test]
async fn initializer_failure_marks_the_extension_failed() {
    let rig = rig();
    rig.loader.register(Arc::new(FailingExtension)).unwrap();
    rig.loader
        .register(stub(&rig, ExtensionManifest::new("fine", "1.0.0"), false))
        .unwrap();

    rig.loader
        .load(&["broken".into(), "fine".into()])
        .await
        .unwrap();

    let registry = rig.loader.registry();
    assert_eq!(
        registry.get("broken").map(|e| e.state),
        Some(ExtensionState::Failed)
    );
    assert_eq!(
        registry.get("fine").map(|e| e.state),
        Some(ExtensionState::Initialized)
    );
    assert_eq!(registry.initialized_versions().len(), 1);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let rig = rig();
    rig.loader
        .register(stub(&rig, ExtensionManifest::new("dup", "1.0.0"), false))
        .unwrap();
    let err = rig
        .loader
        .register(stub(&rig, ExtensionManifest::new("dup", "1.1.0"), false))
        .unwrap_err();
    assert!(err.to_string().contains("already loaded"));
}

#[test]
fn manifests_are_discovered_from_disk() {
    let rig = rig();
    let dir = tempfile::TempDir::new().unwrap();

    let mailer = dir.path().join("mailer");
    std::fs::create_dir(&mailer).unwrap();
    std::fs::write(
        mailer.join("manifest.json"),
        serde_json::to_string_pretty(&ExtensionManifest::new("mailer", "0.3.0")).unwrap(),
    )
    .unwrap();

    // A directory without a manifest is skipped.
    std::fs::create_dir(dir.path().join("assets")).unwrap();

    let manifests = rig.loader.discover_manifests(dir.path()).unwrap();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].name, "mailer");

    // A manifest whose name does not match its directory is rejected.
    let liar = dir.path().join("liar");
    std::fs::create_dir(&liar).unwrap();
    std::fs::write(
        liar.join("manifest.json"),
        serde_json::to_string(&ExtensionManifest::new("impostor", "1.0.0")).unwrap(),
    )
    .unwrap();
    assert!(rig.loader.discover_manifests(dir.path()).is_err());
}
