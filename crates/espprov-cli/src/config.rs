//! CLI configuration loading
//!
//! One optional TOML file with a `[core]` and a `[ble]` table. Missing tables
//! and keys fall back to their defaults.

use std::path::Path;

use espprov_ble::BleTransportConfig;
use espprov_core::ProvisioningConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Complete configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Provisioning adapter settings
    pub core: ProvisioningConfig,
    /// BLE transport settings
    pub ble: BleTransportConfig,
}

impl CliConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
