//! Versioned cache generation names.

use serde::{Deserialize, Serialize};

/// Names of the cache generations owned by one deployed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationNames {
    pub version: String,
    /// Long-lived build assets.
    pub static_name: String,
    /// API and page responses.
    pub dynamic_name: String,
    /// Staging area for the install batch. Never current.
    pub working_name: String,
}

impl GenerationNames {
    pub fn derive(prefix: &str, version: &str) -> Self {
        Self {
            version: version.to_string(),
            static_name: format!("{prefix}-static-{version}"),
            dynamic_name: format!("{prefix}-dynamic-{version}"),
            working_name: format!("{prefix}-install-{version}"),
        }
    }

    /// Whether `name` survives activation of this version.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_name || name == self.dynamic_name
    }

    pub fn current(&self) -> [&str; 2] {
        [&self.static_name, &self.dynamic_name]
    }
}
