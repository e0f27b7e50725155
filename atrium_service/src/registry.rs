//! The service registry.
//!
//! Holds every supervised service by name and drives bulk lifecycle
//! operations. Services invoke managers as the system principal; the
//! registry carries that identity so service constructors can borrow
//! it.

use atrium_core::error::{Result, ServiceError};
use atrium_core::id::UserId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::service::Service;
use crate::supervisor::{ServiceStatus, SupervisedService};

/// Registry of supervised services.
pub struct ServiceRegistry {
    system_principal: UserId,
    services: RwLock<HashMap<String, Arc<SupervisedService>>>,
}

impl ServiceRegistry {
    /// Create a registry whose services act as `system_principal`.
    pub fn new(system_principal: UserId) -> Self {
        Self {
            system_principal,
            services: RwLock::new(HashMap::new()),
        }
    }

    /// The principal services act as.
    pub fn system_principal(&self) -> UserId {
        self.system_principal
    }

    /// Put a service under supervision.
    pub fn register(&self, service: Arc<dyn Service>) -> Result<()> {
        let name = service.name().to_string();
        let mut services = self.services.write();
        if services.contains_key(&name) {
            return Err(ServiceError::AlreadyRegistered(name).into());
        }
        info!(service = %name, "service registered");
        services.insert(name, Arc::new(SupervisedService::new(service)));
        Ok(())
    }

    /// Remove a service from supervision, stopping it first.
    pub async fn unregister(&self, name: &str) -> Result<()> {
        let supervised = self
            .services
            .write()
            .remove(name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;
        supervised.stop().await;
        info!(service = %name, "service unregistered");
        Ok(())
    }

    /// Fetch one supervised service.
    pub fn get(&self, name: &str) -> Option<Arc<SupervisedService>> {
        self.services.read().get(name).cloned()
    }

    /// Registered service names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Current status of every service.
    pub fn statuses(&self) -> HashMap<String, ServiceStatus> {
        self.services
            .read()
            .iter()
            .map(|(name, s)| (name.clone(), s.status()))
            .collect()
    }

    fn snapshot(&self) -> Vec<Arc<SupervisedService>> {
        self.services.read().values().cloned().collect()
    }

    /// Start every registered service.
    pub fn start_all(&self) {
        for service in self.snapshot() {
            service.start();
        }
        info!("all services started");
    }

    /// Stop every registered service gracefully.
    pub async fn stop_all(&self) {
        for service in self.snapshot() {
            service.stop().await;
        }
        info!("all services stopped");
    }

    /// Stop and unregister every service, running each cleanup.
    pub async fn cleanup_all(&self) {
        let names = self.names();
        for name in names {
            let _ = self.unregister(&name).await;
        }
        info!("all services cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ServiceConfig, ServiceState};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Ticker {
        name: String,
        ticks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Service for Ticker {
        fn name(&self) -> &str {
            &self.name
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
    }

    #[tokio::test]
    async fn registry_round_trip() {
        let registry = ServiceRegistry::new(UserId::seeded(2));
        let ticks = Arc::new(AtomicUsize::new(0));
        registry
            .register(Arc::new(Ticker {
                name: "ticker".into(),
                ticks: ticks.clone(),
            }))
            .unwrap();

        // Duplicate names are rejected.
        assert!(registry
            .register(Arc::new(Ticker {
                name: "ticker".into(),
                ticks: ticks.clone(),
            }))
            .is_err());

        registry.start_all();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 1);
        assert_eq!(
            registry.get("ticker").unwrap().status().state,
            ServiceState::Running
        );

        registry.stop_all().await;
        assert_eq!(
            registry.get("ticker").unwrap().status().state,
            ServiceState::Stopped
        );

        registry.cleanup_all().await;
        assert!(registry.names().is_empty());
    }
}
