//! Per-service supervision.
//!
//! Each supervised service owns one tokio task ticking on its own
//! timer. On a successful `update` the failure counter resets; on an
//! error the supervisor logs, waits `retry_delay`, and retries until
//! `max_failures` consecutive errors, at which point the service
//! transitions through `Failed` to `Stopped` and `cleanup` runs exactly
//! once. Pause, resume, and stop are honored at tick boundaries.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::service::{Service, ServiceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Pause,
    Stop,
}

/// A point-in-time view of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Current lifecycle state.
    pub state: ServiceState,
    /// Consecutive failures observed in the current run.
    pub consecutive_failures: u32,
}

/// One service under supervision.
pub struct SupervisedService {
    service: Arc<dyn Service>,
    state: Arc<Mutex<ServiceState>>,
    failures: Arc<AtomicU32>,
    control: watch::Sender<Command>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SupervisedService {
    /// Put a service under supervision, initially stopped.
    pub fn new(service: Arc<dyn Service>) -> Self {
        let (control, _) = watch::channel(Command::Stop);
        Self {
            service,
            state: Arc::new(Mutex::new(ServiceState::Stopped)),
            failures: Arc::new(AtomicU32::new(0)),
            control,
            task: Mutex::new(None),
        }
    }

    /// The service's name.
    pub fn name(&self) -> String {
        self.service.name().to_string()
    }

    /// Current state and failure count.
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            state: *self.state.lock(),
            consecutive_failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Start the service loop. A no-op (with a log line) when already
    /// running.
    pub fn start(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if *state != ServiceState::Stopped {
            info!(service = %self.name(), "service is already running");
            return;
        }
        *state = ServiceState::Running;
        drop(state);

        self.failures.store(0, Ordering::Relaxed);
        let _ = self.control.send(Command::Run);

        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_loop().await });
        *self.task.lock() = Some(handle);
        info!(service = %self.name(), "service started");
    }

    /// Pause ticking; the task stays alive.
    pub fn pause(&self) {
        let mut state = self.state.lock();
        if *state != ServiceState::Running {
            warn!(service = %self.name(), state = %*state, "cannot pause");
            return;
        }
        *state = ServiceState::Paused;
        let _ = self.control.send(Command::Pause);
        info!(service = %self.name(), "service paused");
    }

    /// Resume a paused service.
    pub fn resume(&self) {
        let mut state = self.state.lock();
        if *state != ServiceState::Paused {
            warn!(service = %self.name(), state = %*state, "cannot resume");
            return;
        }
        *state = ServiceState::Running;
        let _ = self.control.send(Command::Run);
        info!(service = %self.name(), "service resumed");
    }

    /// Request a graceful stop and wait for the loop (and its cleanup)
    /// to finish.
    pub async fn stop(&self) {
        let _ = self.control.send(Command::Stop);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!(service = %self.name(), "service stopped");
    }

    async fn run_loop(self: Arc<Self>) {
        let config = self.service.config();
        let mut control = self.control.subscribe();

        loop {
            // Copy the command out so no borrow is held across awaits.
            let command = *control.borrow();
            match command {
                Command::Stop => break,
                Command::Pause => {
                    // Wait for resume or stop; no ticking while paused.
                    if control.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
                Command::Run => {}
            }

            let delay = match self.service.update().await {
                Ok(()) => {
                    self.failures.store(0, Ordering::Relaxed);
                    config.interval
                }
                Err(e) => {
                    let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                    error!(
                        service = %self.name(),
                        failures,
                        error = %e,
                        "service update failed"
                    );
                    if failures >= config.max_failures {
                        *self.state.lock() = ServiceState::Failed;
                        warn!(
                            service = %self.name(),
                            failures,
                            "service exceeded its failure budget"
                        );
                        break;
                    }
                    config.retry_delay
                }
            };

            // Sleep until the next tick, waking early on control
            // changes so stop and pause are honored promptly.
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                result = control.changed() => {
                    if result.is_err() {
                        break;
                    }
                }
            }
        }

        // Last act of every lifecycle, exactly once.
        self.service.cleanup().await;
        *self.state.lock() = ServiceState::Stopped;
        debug!(service = %self.name(), "service loop exited");
    }
}
