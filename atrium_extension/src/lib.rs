//! # Atrium Extension
//!
//! `atrium_extension` loads extensions into the Atrium engine:
//! manifest parsing, dependency resolution with optional edges and
//! cycle detection, ordered initialization, and the ability registry
//! through which extension callables are invoked by name.
//!
//! ## Structure
//!
//! - **manifest**: `manifest.json` schema and validation
//! - **resolver**: topological load-order resolution
//! - **extension**: the `Extension` trait and registration context
//! - **abilities**: named async callables, gated by capability
//! - **loader**: discovery, ordered initialization, outcome tracking
//! - **registry**: loaded-extension state

pub mod abilities;
pub mod extension;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod resolver;

pub use abilities::{Ability, AbilityRegistry};
pub use extension::{Extension, ExtensionContext};
pub use loader::{ExtensionLoader, MANIFEST_FILE};
pub use manifest::{ExtDependency, ExtensionManifest, PackageDependency};
pub use registry::{ExtensionRegistry, ExtensionState, LoadedExtension};
pub use resolver::{resolve, Resolution, Unloadable};
