//! Error types for the provisioning core
//!
//! Every failure surfaced to a caller is a [`ProvisioningError`]. Failures
//! reported by external collaborators (transport providers, security engines)
//! arrive as [`PlatformError`] and are wrapped with a stable kind, keeping the
//! collaborator's message.

use thiserror::Error;

use crate::permissions::Permission;
use crate::security::ProvisionPhase;

// ----------------------------------------------------------------------------
// Platform Errors
// ----------------------------------------------------------------------------

/// Failure description reported by a transport provider or security engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PlatformError {
    pub message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for PlatformError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for PlatformError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

// ----------------------------------------------------------------------------
// Provisioning Errors
// ----------------------------------------------------------------------------

/// Errors returned by provisioning operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("Missing one of the following permissions: {}", format_permissions(.missing))]
    Permission { missing: Vec<Permission> },

    #[error("No device named {name}. Call create or search first")]
    DeviceNotFound { name: String },

    #[error("No device found with prefix {prefix:?}")]
    NoDeviceFound { prefix: String },

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Connection to {name} failed: {reason}")]
    ConnectionFailed { name: String, reason: String },

    #[error("Data exchange with {name} failed: {reason}")]
    Transport { name: String, reason: String },

    #[error("Wi-Fi scan on {name} failed: {reason}")]
    WifiScan { name: String, reason: String },

    #[error("Provisioning {name} failed during {phase}: {reason}")]
    ProvisioningFailed {
        name: String,
        phase: ProvisionPhase,
        reason: String,
    },

    #[error("Payload is not base64 encoded: {0}")]
    InvalidPayload(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Stable classification of a [`ProvisioningError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Permission,
    DeviceNotFound,
    NoDeviceFound,
    Scan,
    ConnectionFailed,
    Transport,
    WifiScan,
    ProvisioningFailed,
    InvalidPayload,
    InvalidArgument,
}

impl ProvisioningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Permission { .. } => ErrorKind::Permission,
            Self::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Self::NoDeviceFound { .. } => ErrorKind::NoDeviceFound,
            Self::Scan(_) => ErrorKind::Scan,
            Self::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::WifiScan { .. } => ErrorKind::WifiScan,
            Self::ProvisioningFailed { .. } => ErrorKind::ProvisioningFailed,
            Self::InvalidPayload(_) => ErrorKind::InvalidPayload,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Whether repeating the same call without user action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Scan
                | ErrorKind::NoDeviceFound
                | ErrorKind::ConnectionFailed
                | ErrorKind::Transport
                | ErrorKind::WifiScan
        )
    }

    pub(crate) fn device_not_found(name: &str) -> Self {
        Self::DeviceNotFound {
            name: name.to_string(),
        }
    }

    pub(crate) fn connection_failed(name: &str, reason: impl ToString) -> Self {
        Self::ConnectionFailed {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn transport(name: &str, reason: impl ToString) -> Self {
        Self::Transport {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn wifi_scan(name: &str, reason: impl ToString) -> Self {
        Self::WifiScan {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn format_permissions(missing: &[Permission]) -> String {
    missing
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisioningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_error_lists_every_missing_permission() {
        let err = ProvisioningError::Permission {
            missing: vec![Permission::BluetoothScan, Permission::FineLocation],
        };
        assert_eq!(
            err.to_string(),
            "Missing one of the following permissions: BLUETOOTH_SCAN, ACCESS_FINE_LOCATION"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_provisioning_failure_keeps_reason() {
        let err = ProvisioningError::ProvisioningFailed {
            name: "ORBITAL_001".into(),
            phase: ProvisionPhase::Device,
            reason: "AuthenticationFailed".into(),
        };
        assert_eq!(err.kind(), ErrorKind::ProvisioningFailed);
        assert!(err.to_string().contains("AuthenticationFailed"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_connection_failure_is_retryable() {
        let err = ProvisioningError::connection_failed("X", PlatformError::new("bad pop"));
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Connection to X failed: bad pop");
    }
}
