//! Provisioning core configuration

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// How a discovery pass that matched nothing is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptySearchPolicy {
    /// Resolve with an empty list
    #[default]
    EmptyList,
    /// Reject with `NoDeviceFound`
    NoDeviceFound,
}

/// Configuration for the provisioning adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Outcome of a search with zero matches
    pub empty_search: EmptySearchPolicy,
    /// Endpoint used for session establishment
    pub session_path: String,
    /// Unauthenticated endpoint answering with version and capabilities
    pub version_path: String,
    /// Whether connect may run a name-filtered scan to bind an endpoint
    pub fallback_scan: bool,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            empty_search: EmptySearchPolicy::EmptyList,
            session_path: "prov-session".to_string(),
            version_path: "proto-ver".to_string(),
            fallback_scan: true,
        }
    }
}

impl ProvisioningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_empty_search(mut self, policy: EmptySearchPolicy) -> Self {
        self.empty_search = policy;
        self
    }

    pub fn with_session_path(mut self, path: impl Into<String>) -> Self {
        self.session_path = path.into();
        self
    }

    pub fn with_version_path(mut self, path: impl Into<String>) -> Self {
        self.version_path = path.into();
        self
    }

    pub fn with_fallback_scan(mut self, enabled: bool) -> Self {
        self.fallback_scan = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ProvisioningConfig =
            serde_json::from_str(r#"{"empty_search": "no-device-found"}"#).unwrap();
        assert_eq!(config.empty_search, EmptySearchPolicy::NoDeviceFound);
        assert_eq!(config.session_path, "prov-session");
        assert!(config.fallback_scan);
    }
}
