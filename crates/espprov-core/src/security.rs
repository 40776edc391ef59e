//! Session/security engine abstraction
//!
//! A [`SecurityScheme`] performs one handshake variant over a [`Channel`] and
//! yields a [`SecureSession`]. Both traits are callback shaped to match the
//! native SDKs they front: each operation receives a [`Completer`] and may
//! call it any number of times; only the first result is observed.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::completion::Completer;
use crate::error::PlatformError;
use crate::transport::Channel;
use crate::types::{Security, WifiCredentials, WifiNetwork};

// ----------------------------------------------------------------------------
// Handshake
// ----------------------------------------------------------------------------

/// Inputs to a security handshake
#[derive(Clone)]
pub struct HandshakeParams {
    pub device_name: String,
    /// Endpoint carrying the session establishment exchange
    pub session_path: String,
    pub proof_of_possession: Option<String>,
    pub username: Option<String>,
}

impl fmt::Debug for HandshakeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeParams")
            .field("device_name", &self.device_name)
            .field("session_path", &self.session_path)
            .field("proof_of_possession", &self.proof_of_possession.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .finish()
    }
}

/// Result delivered by a handshake
pub type HandshakeOutcome = Result<Arc<dyn SecureSession>, PlatformError>;

/// One handshake variant (Security0/1/2)
pub trait SecurityScheme: Send + Sync {
    fn security(&self) -> Security;

    fn handshake(
        &self,
        channel: Arc<dyn Channel>,
        params: HandshakeParams,
        done: Completer<HandshakeOutcome>,
    );
}

// ----------------------------------------------------------------------------
// Authenticated Session
// ----------------------------------------------------------------------------

/// Authenticated channel produced by a successful handshake
pub trait SecureSession: Send + Sync {
    /// Exchange an opaque payload with a custom endpoint
    fn send_data(&self, path: &str, payload: Vec<u8>, done: Completer<Result<Vec<u8>, PlatformError>>);

    /// Ask the device to enumerate nearby Wi-Fi networks
    fn scan_wifi(&self, done: Completer<WifiScanReport>);

    /// Push Wi-Fi credentials and drive the device through provisioning
    fn provision(&self, credentials: WifiCredentials, listener: ProvisionListener);

    /// Tear down the session state held by the engine
    fn close(&self);
}

// ----------------------------------------------------------------------------
// Wi-Fi Scan Reporting
// ----------------------------------------------------------------------------

/// Fault raised by an engine during a Wi-Fi scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiScanFault {
    /// The device saw zero access points
    EmptyResult,
    Other(PlatformError),
}

/// Single delivery from a Wi-Fi scan: networks, a fault, or both
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiScanReport {
    pub networks: Vec<WifiNetwork>,
    pub fault: Option<WifiScanFault>,
}

impl WifiScanReport {
    pub fn networks(networks: Vec<WifiNetwork>) -> Self {
        Self {
            networks,
            fault: None,
        }
    }

    pub fn fault(fault: WifiScanFault) -> Self {
        Self {
            networks: Vec::new(),
            fault: Some(fault),
        }
    }

    /// Reduce the report to a network list or a genuine failure.
    ///
    /// An empty-result fault is an empty list. A fault delivered together
    /// with networks is a known engine defect and the networks win.
    pub fn into_networks(self) -> Result<Vec<WifiNetwork>, PlatformError> {
        match self.fault {
            None => Ok(self.networks),
            Some(WifiScanFault::EmptyResult) => Ok(self.networks),
            Some(WifiScanFault::Other(error)) if !self.networks.is_empty() => {
                warn!(
                    "Ignoring Wi-Fi scan error reported alongside {} network(s): {}",
                    self.networks.len(),
                    error
                );
                Ok(self.networks)
            }
            Some(WifiScanFault::Other(error)) => Err(error),
        }
    }
}

// ----------------------------------------------------------------------------
// Provisioning Progress
// ----------------------------------------------------------------------------

/// Phase of the provisioning exchange a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionPhase {
    /// Session confirmation before credentials are sent
    Session,
    /// Transmitting the Wi-Fi configuration
    ConfigSend,
    /// Device applying the configuration
    ConfigApply,
    /// Device reporting the provisioning result
    Device,
}

impl fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session => "session",
            Self::ConfigSend => "config send",
            Self::ConfigApply => "config apply",
            Self::Device => "device provisioning",
        })
    }
}

/// Terminal provisioning result
pub type ProvisionOutcome = Result<(), (ProvisionPhase, String)>;

/// Progress callbacks handed to [`SecureSession::provision`]
///
/// `config_sent` and `config_applied` are progress signals only; the caller
/// observes the first terminal success or failure.
#[derive(Debug, Clone)]
pub struct ProvisionListener {
    device_name: String,
    done: Completer<ProvisionOutcome>,
}

impl ProvisionListener {
    pub(crate) fn new(device_name: String, done: Completer<ProvisionOutcome>) -> Self {
        Self { device_name, done }
    }

    pub fn session_failed(&self, error: PlatformError) {
        self.fail(ProvisionPhase::Session, error.message);
    }

    pub fn config_sent(&self) {
        debug!("Wi-Fi config sent to {}", self.device_name);
    }

    pub fn config_failed(&self, error: PlatformError) {
        self.fail(ProvisionPhase::ConfigSend, error.message);
    }

    pub fn config_applied(&self) {
        debug!("Wi-Fi config applied by {}", self.device_name);
    }

    pub fn apply_failed(&self, error: PlatformError) {
        self.fail(ProvisionPhase::ConfigApply, error.message);
    }

    /// The device rejected provisioning with `reason`
    pub fn device_failed(&self, reason: impl Into<String>) {
        self.fail(ProvisionPhase::Device, reason.into());
    }

    pub fn succeeded(&self) {
        self.done.complete(Ok(()));
    }

    fn fail(&self, phase: ProvisionPhase, reason: String) {
        self.done.complete(Err((phase, reason)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::completion;
    use crate::types::WifiAuthMode;

    fn network(ssid: &str) -> WifiNetwork {
        WifiNetwork {
            ssid: ssid.to_string(),
            rssi: -50,
            auth: WifiAuthMode::Wpa2Psk,
            bssid: None,
            channel: None,
        }
    }

    #[test]
    fn test_empty_result_fault_is_empty_list() {
        let report = WifiScanReport::fault(WifiScanFault::EmptyResult);
        assert_eq!(report.into_networks(), Ok(Vec::new()));
    }

    #[test]
    fn test_fault_with_networks_keeps_networks() {
        let report = WifiScanReport {
            networks: vec![network("Home")],
            fault: Some(WifiScanFault::Other(PlatformError::new("spurious"))),
        };
        assert_eq!(report.into_networks().unwrap().len(), 1);
    }

    #[test]
    fn test_fault_alone_is_an_error() {
        let report = WifiScanReport::fault(WifiScanFault::Other(PlatformError::new("radio off")));
        assert_eq!(report.into_networks(), Err(PlatformError::new("radio off")));
    }

    #[tokio::test]
    async fn test_listener_reports_first_terminal_event() {
        let (done, outcome) = completion("provision");
        let listener = ProvisionListener::new("dev".into(), done);

        listener.config_sent();
        listener.config_applied();
        listener.device_failed("AuthenticationFailed");
        listener.succeeded();

        assert_eq!(
            outcome.await.unwrap(),
            Err((ProvisionPhase::Device, "AuthenticationFailed".to_string()))
        );
    }
}
