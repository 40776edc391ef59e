//! ESP Provisioning Core
//!
//! Device registry and provisioning session adapter for ESP-IDF style Wi-Fi
//! provisioning. Transport discovery (BLE, SoftAP) and the security
//! handshake engines are injected collaborators; this crate owns the device
//! records, their session lifecycle, and the mapping of collaborator failures
//! onto a stable error taxonomy.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod adapter;
pub mod completion;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metadata;
pub mod permissions;
pub mod registry;
pub mod security;
pub mod transport;
pub mod types;
pub mod version;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use adapter::{ProvisioningAdapter, ProvisioningAdapterBuilder};
pub use completion::{completion, Abandoned, Completer, Completion};
pub use config::{EmptySearchPolicy, ProvisioningConfig};
pub use error::{ErrorKind, PlatformError, ProvisioningError, Result};
pub use permissions::{AllowAll, GatedOperation, GrantedPermissions, Permission, PermissionGate};
pub use registry::{DeviceRecord, DeviceRef, DeviceRegistry};
pub use security::{
    HandshakeOutcome, HandshakeParams, ProvisionListener, ProvisionOutcome, ProvisionPhase,
    SecureSession, SecurityScheme, WifiScanFault, WifiScanReport,
};
pub use transport::{Channel, OpenOptions, ScanSink, TransportProvider};
pub use types::{
    DeviceSummary, EndpointRef, ScanHit, Security, SessionState, Status, StatusResponse,
    TransportKind, WifiAuthMode, WifiCredentials, WifiNetwork,
};
