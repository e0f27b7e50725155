//! The service trait and its configuration.

use async_trait::async_trait;
use atrium_core::error::Result;
use std::fmt;
use std::time::Duration;

/// Timing and failure budget of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Time between successful `update` runs.
    pub interval: Duration,
    /// Consecutive failures tolerated before the service stops.
    pub max_failures: u32,
    /// Wait after a failed `update` before retrying.
    pub retry_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_failures: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Lifecycle state of a supervised service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Not running.
    Stopped,
    /// Ticking.
    Running,
    /// Running but skipping ticks.
    Paused,
    /// Exceeded its failure budget; about to clean up and stop.
    Failed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Running => "running",
            ServiceState::Paused => "paused",
            ServiceState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// A named, long-running background worker.
///
/// The supervisor invokes `update` on the configured interval and
/// `cleanup` exactly once at the end of each lifecycle. Services act
/// as the system principal when they call into managers.
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique service name.
    fn name(&self) -> &str;

    /// Timing and failure budget.
    fn config(&self) -> ServiceConfig {
        ServiceConfig::default()
    }

    /// One unit of the service's work.
    async fn update(&self) -> Result<()>;

    /// Release resources at the end of the lifecycle. Invoked exactly
    /// once, last.
    async fn cleanup(&self) {}
}
