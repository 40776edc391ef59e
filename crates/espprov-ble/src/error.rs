//! Error types for BLE transport

use espprov_core::PlatformError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the BLE transport
#[derive(Error, Debug)]
pub enum BleTransportError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Failed to initialise BLE manager: {0}")]
    ManagerInit(String),

    #[error("A scan is already running")]
    ScanInProgress,

    #[error("Failed to start BLE scan: {0}")]
    ScanFailed(String),

    #[error("Peripheral not found: {id}")]
    PeripheralNotFound { id: String },

    #[error("Failed to connect to peripheral: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Failed to discover services: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("Peripheral does not expose the provisioning service")]
    ServiceNotFound,

    #[error("No characteristic for endpoint {path}")]
    EndpointNotFound { path: String },

    #[error("Failed to write to characteristic: {0}")]
    WriteFailed(String),

    #[error("Failed to read characteristic: {0}")]
    ReadFailed(String),
}

impl From<BleTransportError> for PlatformError {
    fn from(err: BleTransportError) -> Self {
        PlatformError::new(err.to_string())
    }
}
