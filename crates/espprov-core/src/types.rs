//! Core data types shared across the provisioning crates

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProvisioningError;

// ----------------------------------------------------------------------------
// Transport and Security Selection
// ----------------------------------------------------------------------------

/// Transport used to reach a device during provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Bluetooth Low Energy GATT
    Ble,
    /// Access point hosted by the device itself
    SoftAp,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ble => "ble",
            Self::SoftAp => "softap",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ProvisioningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ble" => Ok(Self::Ble),
            "softap" => Ok(Self::SoftAp),
            other => Err(ProvisioningError::InvalidArgument(format!(
                "unknown transport {other:?}"
            ))),
        }
    }
}

/// Handshake variant protecting the provisioning channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Security {
    /// Security0: no handshake encryption
    Unsecure,
    /// Security1: Curve25519 key exchange with AES-CTR
    Secure1,
    /// Security2: SRP6a with AES-GCM
    Secure2,
}

impl Security {
    /// Whether the handshake needs a proof of possession
    pub fn requires_pop(&self) -> bool {
        !matches!(self, Self::Unsecure)
    }

    /// Whether the handshake needs a username
    pub fn requires_username(&self) -> bool {
        matches!(self, Self::Secure2)
    }
}

impl From<Security> for u8 {
    fn from(security: Security) -> Self {
        match security {
            Security::Unsecure => 0,
            Security::Secure1 => 1,
            Security::Secure2 => 2,
        }
    }
}

impl TryFrom<u8> for Security {
    type Error = ProvisioningError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unsecure),
            1 => Ok(Self::Secure1),
            2 => Ok(Self::Secure2),
            other => Err(ProvisioningError::InvalidArgument(format!(
                "unknown security level {other}"
            ))),
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "security{}", u8::from(*self))
    }
}

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Lifecycle state of a device record's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

// ----------------------------------------------------------------------------
// Endpoints and Advertisements
// ----------------------------------------------------------------------------

/// Opaque reference to a transport-specific device handle
///
/// For BLE this is the platform peripheral identifier, for SoftAP the SSID.
/// Only the transport provider that produced it interprets the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointRef {
    pub id: String,
    pub address: Option<String>,
}

impl EndpointRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// A single result reported by a transport scan
#[derive(Debug, Clone)]
pub struct ScanHit {
    /// Advertised BLE local name, or the SSID for SoftAP
    pub name: Option<String>,
    pub endpoint: EndpointRef,
    /// First advertised service identifier (BLE only)
    pub service_uuid: Option<Uuid>,
    pub rssi: Option<i16>,
}

// ----------------------------------------------------------------------------
// Wi-Fi Networks
// ----------------------------------------------------------------------------

/// Authentication mode of a Wi-Fi network seen by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WifiAuthMode {
    Open,
    Wep,
    Wpa2Enterprise,
    Wpa2Psk,
    WpaPsk,
    WpaWpa2Psk,
    Wpa3Psk,
    Wpa2Wpa3Psk,
}

impl From<WifiAuthMode> for u8 {
    fn from(mode: WifiAuthMode) -> Self {
        match mode {
            WifiAuthMode::Open => 0,
            WifiAuthMode::Wep => 1,
            WifiAuthMode::Wpa2Enterprise => 2,
            WifiAuthMode::Wpa2Psk => 3,
            WifiAuthMode::WpaPsk => 4,
            WifiAuthMode::WpaWpa2Psk => 5,
            WifiAuthMode::Wpa3Psk => 6,
            WifiAuthMode::Wpa2Wpa3Psk => 7,
        }
    }
}

impl TryFrom<u8> for WifiAuthMode {
    type Error = ProvisioningError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Open,
            1 => Self::Wep,
            2 => Self::Wpa2Enterprise,
            3 => Self::Wpa2Psk,
            4 => Self::WpaPsk,
            5 => Self::WpaWpa2Psk,
            6 => Self::Wpa3Psk,
            7 => Self::Wpa2Wpa3Psk,
            other => {
                return Err(ProvisioningError::InvalidArgument(format!(
                    "unknown wifi auth mode {other}"
                )))
            }
        })
    }
}

/// A Wi-Fi network enumerated by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: String,
    pub rssi: i32,
    pub auth: WifiAuthMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
}

/// Credentials pushed to the device during provisioning
#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub passphrase: String,
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Responses
// ----------------------------------------------------------------------------

/// Public description of a registry entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub name: String,
    pub transport: TransportKind,
    pub security: Security,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_info: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_service_uuid: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i16>,
}

/// Terminal status reported by connect and provision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Connected,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: Status,
}

impl StatusResponse {
    pub fn connected() -> Self {
        Self {
            status: Status::Connected,
        }
    }

    pub fn success() -> Self {
        Self {
            status: Status::Success,
        }
    }
}
