//! Controller configuration.
//!
//! Process-wide default identities, fixed at construction time and never
//! mutated afterwards. Loaded from YAML or built from [`crate::constants`].
//!
//! ```yaml
//! systemRealm: cellvisor-system
//! systemNamespace: cellvisor-system
//! defaultSpace: default
//! defaultStack: default
//! defaultCell: default
//! labels:
//!   team: platform
//! ```

use crate::constants::{
    DEFAULT_CELL, DEFAULT_SPACE, DEFAULT_STACK, MANAGED_BY_LABEL, SYSTEM_NAMESPACE, SYSTEM_REALM,
};
use crate::error::{Error, Result};
use crate::model::Labels;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum configuration file size (64 KiB).
pub const MAX_CONFIG_SIZE: usize = 64 * 1024;

/// Default identities used by bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Realm hosting the control plane's own workloads.
    pub system_realm: String,
    /// Runtime namespace of the system realm. Empty means the realm name.
    pub system_namespace: String,
    /// Space provisioned inside the system realm.
    pub default_space: String,
    /// Stack provisioned inside the default space.
    pub default_stack: String,
    /// Cell provisioned inside the default stack.
    pub default_cell: String,
    /// Extra labels stamped on every bootstrapped resource.
    pub labels: Labels,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            system_realm: SYSTEM_REALM.to_string(),
            system_namespace: SYSTEM_NAMESPACE.to_string(),
            default_space: DEFAULT_SPACE.to_string(),
            default_stack: DEFAULT_STACK.to_string(),
            default_cell: DEFAULT_CELL.to_string(),
            labels: Labels::new(),
        }
    }
}

impl ControllerConfig {
    /// Parses and validates a YAML configuration.
    pub fn from_yaml(yaml: &[u8]) -> Result<Self> {
        if yaml.len() > MAX_CONFIG_SIZE {
            return Err(Error::Config(format!(
                "configuration too large: {} bytes (max {})",
                yaml.len(),
                MAX_CONFIG_SIZE
            )));
        }

        let config: Self =
            serde_yaml::from_slice(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validated()
    }

    /// Reads a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_yaml(&bytes)
    }

    /// Trims every identity and rejects empty ones.
    pub fn validated(mut self) -> Result<Self> {
        for (field, value) in [
            ("systemRealm", &mut self.system_realm),
            ("defaultSpace", &mut self.default_space),
            ("defaultStack", &mut self.default_stack),
            ("defaultCell", &mut self.default_cell),
        ] {
            *value = value.trim().to_string();
            if value.is_empty() {
                return Err(Error::Config(format!("{field} cannot be empty")));
            }
        }

        self.system_namespace = self.system_namespace.trim().to_string();
        if self.system_namespace.is_empty() {
            self.system_namespace = self.system_realm.clone();
        }

        Ok(self)
    }

    /// Labels for bootstrapped resources, including the managed-by marker.
    #[must_use]
    pub fn bootstrap_labels(&self) -> Labels {
        let mut labels = self.labels.clone();
        labels.insert(MANAGED_BY_LABEL.to_string(), "cellvisor".to_string());
        labels
    }
}
