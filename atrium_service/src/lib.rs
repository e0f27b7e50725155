//! # Atrium Service
//!
//! `atrium_service` supervises the engine's long-running background
//! workers: one tokio task per service, periodic `update` with a
//! consecutive-failure budget, pause/resume/stop honored at tick
//! boundaries, and `cleanup` exactly once at the end of each lifecycle.
//!
//! ## Structure
//!
//! - **service**: the `Service` trait, configuration, and states
//! - **supervisor**: the per-service loop
//! - **registry**: bulk lifecycle over every registered service

pub mod registry;
pub mod service;
pub mod supervisor;

pub use registry::ServiceRegistry;
pub use service::{Service, ServiceConfig, ServiceState};
pub use supervisor::{ServiceStatus, SupervisedService};
