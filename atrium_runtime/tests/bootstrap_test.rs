//! Full-stack bootstrap tests: directory setup, extension loading,
//! idempotent seeding, and service lifecycle under the assembled
//! system.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use atrium_core::error::Result;
use atrium_core::types::{FieldSpec, FieldType, KindDescriptor, KindTraits, Principal};
use atrium_entity::{Draft, GetOptions, ListOptions, Manager, Patch};
use atrium_extension::{Extension, ExtensionContext, ExtensionManifest};
use atrium_permission::DirectoryStore;
use atrium_runtime::{RuntimeConfig, Seed, SeedOwner, Seeder, System};
use atrium_service::{Service, ServiceConfig, ServiceState};

fn provider_kind() -> KindDescriptor {
    KindDescriptor::new("provider")
        .system()
        .with_traits(KindTraits {
            update_audit: true,
            soft_delete: true,
            ..Default::default()
        })
        .with_field(FieldSpec::required("name", FieldType::String))
}

fn agent_kind() -> KindDescriptor {
    KindDescriptor::new("agent")
        .with_traits(KindTraits {
            update_audit: true,
            soft_delete: true,
            user_owned: true,
            ..Default::default()
        })
        .with_field(FieldSpec::required("name", FieldType::String))
}

fn provider_seeds() -> Vec<Seed> {
    vec![
        Seed::new("provider", 0x100, Draft::new().set("name", "openai")),
        Seed::new("provider", 0x101, Draft::new().set("name", "anthropic")),
        Seed::new(
            "agent",
            0x200,
            Draft::new().set("name", "starter-agent"),
        )
        .owned_by(SeedOwner::Template),
    ]
}

struct MarkerExtension {
    initialized: Arc<AtomicUsize>,
}

#[async_trait]
impl Extension for MarkerExtension {
    fn manifest(&self) -> ExtensionManifest {
        ExtensionManifest::new("marker", "0.1.0")
    }

    async fn initialize(&self, _ctx: &ExtensionContext) -> Result<()> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Pinger {
    ticks: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
}

#[async_trait]
impl Service for Pinger {
    fn name(&self) -> &str {
        "pinger"
    }

    fn config(&self) -> ServiceConfig {
        ServiceConfig {
            interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    async fn update(&self) -> Result<()> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

fn assemble() -> System {
    let mut config = RuntimeConfig::default();
    config.enabled_extensions = vec!["marker".to_string()];
    let system = System::new(config).unwrap();
    let ctx = system.context();
    ctx.kinds.register(provider_kind()).unwrap();
    ctx.kinds.register(agent_kind()).unwrap();
    system
}

#[tokio::test]
async fn bootstrap_runs_all_phases() {
    let system = assemble();
    let initialized = Arc::new(AtomicUsize::new(0));
    system
        .loader()
        .register(Arc::new(MarkerExtension {
            initialized: initialized.clone(),
        }))
        .unwrap();

    let ticks = Arc::new(AtomicUsize::new(0));
    let cleanups = Arc::new(AtomicUsize::new(0));
    system
        .services()
        .register(Arc::new(Pinger {
            ticks: ticks.clone(),
            cleanups: cleanups.clone(),
        }))
        .unwrap();

    let resolution = system.bootstrap(&provider_seeds()).await.unwrap();
    assert_eq!(resolution.order, vec!["marker"]);
    assert_eq!(initialized.load(Ordering::SeqCst), 1);

    // The hook registry is frozen after extension load.
    assert!(system.context().hooks.is_frozen());

    // The directory carries the distinguished principals and roles.
    let principals = system.config().system_principals();
    assert!(system.directory().principal(principals.root).is_some());
    assert!(system.directory().role_by_name("admin").is_some());

    // The service is ticking.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ticks.load(Ordering::SeqCst) >= 1);
    assert_eq!(
        system.services().get("pinger").unwrap().status().state,
        ServiceState::Running
    );

    system.shutdown().await;
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert!(system.services().names().is_empty());
}

#[tokio::test]
async fn seeding_is_idempotent() {
    let system = assemble();
    system.bootstrap(&provider_seeds()).await.unwrap();

    let ctx = system.context();
    let seeder = Seeder::new(ctx.clone(), system.config().system_principals());

    // A second pass creates nothing.
    let report = seeder.seed(&provider_seeds()).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.skipped, 3);

    // Row count is unchanged: both providers, one agent.
    let principals = system.config().system_principals();
    let manager = Manager::new(provider_kind(), ctx.clone(), principals.root).unwrap();
    let providers = manager.list(ListOptions::default()).await.unwrap();
    assert_eq!(providers.len(), 2);

    // Seeded ids are recognizable.
    assert!(providers.iter().all(|view| view.record.id.is_reserved()));

    system.shutdown().await;
}

#[tokio::test]
async fn seeded_records_follow_distinguished_owner_rules() {
    let system = assemble();
    system.bootstrap(&provider_seeds()).await.unwrap();

    let ctx = system.context();
    let user = Principal::new(atrium_core::id::UserId::new(), "u");
    system.directory().upsert_principal(user.clone()).unwrap();

    // The template-owned agent is readable by an ordinary user.
    let agent_id = provider_seeds()[2].record_id();
    let manager = Manager::new(agent_kind(), ctx.clone(), user.id).unwrap();
    let fetched = manager.get(agent_id, GetOptions::default()).await.unwrap();
    assert_eq!(
        fetched.record.attribute("name"),
        Some(&serde_json::json!("starter-agent"))
    );

    // But not mutable.
    assert!(manager
        .update(agent_id, Patch::new().set("name", "mine"))
        .await
        .is_err());

    // System-kind providers are likewise read-only for the user.
    let provider_id = provider_seeds()[0].record_id();
    let providers = Manager::new(provider_kind(), ctx, user.id).unwrap();
    assert!(providers.get(provider_id, GetOptions::default()).await.is_ok());
    assert!(providers
        .update(provider_id, Patch::new().set("name", "mine"))
        .await
        .is_err());

    system.shutdown().await;
}
