//! Extension manifests.
//!
//! Each extension ships a `manifest.json` in its own directory declaring
//! its name, semantic version, and dependencies. Extension dependencies
//! participate in load-order resolution; system package dependencies
//! are advisory and only reported.

use atrium_core::error::{ExtensionError, Result};
use atrium_core::utils::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A dependency on another extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtDependency {
    /// Name of the extension this depends on.
    pub name: String,
    /// Optional dependencies are edges only when the target is present
    /// and version-compatible; missing optional targets are dropped.
    #[serde(default)]
    pub optional: bool,
    /// Semantic version requirement, e.g. `>=1.0.0`.
    #[serde(default)]
    pub version: Option<String>,
    /// Why the dependency exists, for operator-facing reports.
    #[serde(default)]
    pub reason: Option<String>,
}

impl ExtDependency {
    /// A required dependency without a version constraint.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            version: None,
            reason: None,
        }
    }

    /// An optional dependency without a version constraint.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
            version: None,
            reason: None,
        }
    }

    /// Constrain the dependency to a version requirement.
    pub fn with_version(mut self, req: impl Into<String>) -> Self {
        self.version = Some(req.into());
        self
    }

    /// Parse the declared version requirement, if any.
    pub fn version_req(&self) -> Result<Option<VersionReq>> {
        match &self.version {
            None => Ok(None),
            Some(raw) => VersionReq::from_str(raw)
                .map(Some)
                .map_err(|e| ExtensionError::InvalidManifest(e.to_string()).into()),
        }
    }

    /// Whether this dependency is satisfied by the given loaded version
    /// (`None` means the target extension is absent).
    pub fn is_satisfied_by(&self, loaded: Option<&Version>) -> Result<bool> {
        let Some(version) = loaded else {
            return Ok(self.optional);
        };
        match self.version_req()? {
            Some(req) => Ok(req.matches(version)),
            None => Ok(true),
        }
    }
}

/// An advisory dependency on a system package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDependency {
    /// Package name as known to the system package manager.
    pub name: String,
    /// Why the package is needed.
    #[serde(default)]
    pub reason: Option<String>,
}

/// The manifest of one extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionManifest {
    /// Unique extension name; also its directory name on disk.
    pub name: String,
    /// Semantic version string.
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Dependencies on other extensions.
    #[serde(default)]
    pub dependencies: Vec<ExtDependency>,
    /// Advisory system package dependencies.
    #[serde(default)]
    pub system_packages: Vec<PackageDependency>,
}

impl ExtensionManifest {
    /// A minimal manifest.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            dependencies: Vec::new(),
            system_packages: Vec::new(),
        }
    }

    /// Add a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an extension dependency.
    pub fn with_dependency(mut self, dependency: ExtDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Parse the declared version.
    pub fn parsed_version(&self) -> Result<Version> {
        Version::from_str(&self.version)
            .map_err(|e| ExtensionError::InvalidManifest(e.to_string()).into())
    }

    /// Check internal consistency: parseable version and requirements,
    /// no self-dependency.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ExtensionError::InvalidManifest("empty extension name".into()).into());
        }
        self.parsed_version()?;
        for dependency in &self.dependencies {
            dependency.version_req()?;
            if dependency.name == self.name {
                return Err(ExtensionError::InvalidManifest(format!(
                    "extension {} depends on itself",
                    self.name
                ))
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_round_trip() {
        let manifest = ExtensionManifest::new("mailer", "1.2.0")
            .with_description("Outbound mail")
            .with_dependency(ExtDependency::required("templates").with_version(">=0.4.0"));

        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: ExtensionManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.parsed_version().unwrap(), Version::new(1, 2, 0));
    }

    #[test]
    fn test_dependency_satisfaction() {
        let required = ExtDependency::required("base").with_version(">=1.0.0");
        assert!(!required.is_satisfied_by(None).unwrap());
        assert!(required
            .is_satisfied_by(Some(&Version::new(1, 3, 0)))
            .unwrap());
        assert!(!required
            .is_satisfied_by(Some(&Version::new(0, 9, 0)))
            .unwrap());

        let optional = ExtDependency::optional("extra");
        assert!(optional.is_satisfied_by(None).unwrap());
    }

    #[test]
    fn test_invalid_manifests_rejected() {
        assert!(ExtensionManifest::new("x", "not-a-version")
            .validate()
            .is_err());
        assert!(ExtensionManifest::new("x", "1.0.0")
            .with_dependency(ExtDependency::required("x"))
            .validate()
            .is_err());
        assert!(ExtensionManifest::new("x", "1.0.0")
            .with_dependency(ExtDependency::required("y").with_version("wat"))
            .validate()
            .is_err());
    }
}
