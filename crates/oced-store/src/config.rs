use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OcedError, Result};

/// What `delete_object` does when the object still owns relations or
/// attribute values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Fail with an integrity violation naming the dependents.
    #[default]
    Reject,
    /// Delete every relation touching the object and every attribute value
    /// it owns, then the object. Revert restores all of them.
    Cascade,
}

/// Policies applied by the event composer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Handling of object deletion with live dependents.
    pub delete_policy: DeletePolicy,
    /// Whether a relation may start and end at the same object.
    pub allow_self_relations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            delete_policy: DeletePolicy::Reject,
            allow_self_relations: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration with cascading object deletion.
    pub fn cascading() -> Self {
        Self {
            delete_policy: DeletePolicy::Cascade,
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| OcedError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
