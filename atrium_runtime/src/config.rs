//! Runtime configuration.
//!
//! Configuration comes from the environment, with defaults that work
//! for a development process: the three distinguished principal IDs
//! live in the reserved high range, seeding is on, and the team
//! hierarchy is bounded at five levels.

use atrium_core::error::{ConfigError, Result};
use atrium_core::id::UserId;
use atrium_core::types::SystemPrincipals;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

fn default_root_id() -> UserId {
    UserId::from_str("ffffffff-ffff-ffff-ffff-ffffffffffff").expect("valid default root id")
}

fn default_system_id() -> UserId {
    UserId::from_str("ffffffff-ffff-ffff-aaaa-ffffffffffff").expect("valid default system id")
}

fn default_template_id() -> UserId {
    UserId::from_str("ffffffff-ffff-ffff-0000-ffffffffffff").expect("valid default template id")
}

fn default_seed_data() -> bool {
    true
}

fn default_max_team_depth() -> usize {
    5
}

fn default_extensions_dir() -> String {
    "./extensions".to_string()
}

/// Runtime configuration for one Atrium process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// The root principal id (`ROOT_ID`).
    #[serde(default = "default_root_id")]
    pub root_id: UserId,

    /// The system principal id (`SYSTEM_ID`).
    #[serde(default = "default_system_id")]
    pub system_id: UserId,

    /// The template principal id (`TEMPLATE_ID`).
    #[serde(default = "default_template_id")]
    pub template_id: UserId,

    /// Names of enabled extensions (`APP_EXTENSIONS`, CSV).
    #[serde(default)]
    pub enabled_extensions: Vec<String>,

    /// Whether to seed system entities at startup (`SEED_DATA`).
    #[serde(default = "default_seed_data")]
    pub seed_data: bool,

    /// Team hierarchy depth bound (`MAX_TEAM_DEPTH`).
    #[serde(default = "default_max_team_depth")]
    pub max_team_depth: usize,

    /// Directory holding extension manifests (`EXTENSIONS_DIR`).
    #[serde(default = "default_extensions_dir")]
    pub extensions_dir: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root_id: default_root_id(),
            system_id: default_system_id(),
            template_id: default_template_id(),
            enabled_extensions: Vec::new(),
            seed_data: default_seed_data(),
            max_team_depth: default_max_team_depth(),
            extensions_dir: default_extensions_dir(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the process environment, falling back
    /// to defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        let mut config = RuntimeConfig::default();

        if let Ok(raw) = std::env::var("ROOT_ID") {
            config.root_id = parse_id("ROOT_ID", &raw)?;
        }
        if let Ok(raw) = std::env::var("SYSTEM_ID") {
            config.system_id = parse_id("SYSTEM_ID", &raw)?;
        }
        if let Ok(raw) = std::env::var("TEMPLATE_ID") {
            config.template_id = parse_id("TEMPLATE_ID", &raw)?;
        }
        if let Ok(raw) = std::env::var("APP_EXTENSIONS") {
            config.enabled_extensions = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(raw) = std::env::var("SEED_DATA") {
            config.seed_data = raw.trim().eq_ignore_ascii_case("true") || raw.trim() == "1";
        }
        if let Ok(raw) = std::env::var("MAX_TEAM_DEPTH") {
            config.max_team_depth = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "MAX_TEAM_DEPTH".into(),
                reason: format!("'{}' is not a positive integer", raw),
            })?;
        }
        if let Ok(raw) = std::env::var("EXTENSIONS_DIR") {
            config.extensions_dir = raw;
        }

        config.validate()?;
        info!(
            extensions = config.enabled_extensions.len(),
            seed_data = config.seed_data,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.root_id == self.system_id
            || self.root_id == self.template_id
            || self.system_id == self.template_id
        {
            return Err(ConfigError::Invalid {
                name: "ROOT_ID/SYSTEM_ID/TEMPLATE_ID".into(),
                reason: "the distinguished principal ids must be distinct".into(),
            }
            .into());
        }
        if self.max_team_depth == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_TEAM_DEPTH".into(),
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.extensions_dir.is_empty() {
            return Err(ConfigError::Invalid {
                name: "EXTENSIONS_DIR".into(),
                reason: "must not be empty".into(),
            }
            .into());
        }
        Ok(())
    }

    /// The three distinguished principals.
    pub fn system_principals(&self) -> SystemPrincipals {
        SystemPrincipals {
            root: self.root_id,
            system: self.system_id,
            template: self.template_id,
        }
    }
}

fn parse_id(name: &str, raw: &str) -> Result<UserId> {
    UserId::from_str(raw.trim()).map_err(|e| {
        ConfigError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_and_reserved() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.root_id.is_reserved());
        assert!(config.system_id.is_reserved());
        assert!(config.template_id.is_reserved());
        assert!(config.seed_data);
        assert_eq!(config.max_team_depth, 5);
    }

    #[test]
    fn test_duplicate_principal_ids_rejected() {
        let mut config = RuntimeConfig::default();
        config.system_id = config.root_id;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let mut config = RuntimeConfig::default();
        config.max_team_depth = 0;
        assert!(config.validate().is_err());
    }
}
