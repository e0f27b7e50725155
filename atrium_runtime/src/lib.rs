//! # Atrium Runtime
//!
//! `atrium_runtime` assembles the Atrium engine: environment
//! configuration, the bootstrap sequence (directory, extensions,
//! seeding, services), and graceful shutdown.
//!
//! ## Structure
//!
//! - **config**: environment-driven `RuntimeConfig`
//! - **bootstrap**: the `System` assembly and phase sequence
//! - **seed**: idempotent seeding in reference order

pub mod bootstrap;
pub mod config;
pub mod seed;

pub use bootstrap::{BootstrapError, System};
pub use config::RuntimeConfig;
pub use seed::{Seed, SeedOwner, SeedReport, SeedSource, Seeder};
