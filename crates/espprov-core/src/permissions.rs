//! Platform permission preconditions
//!
//! Every operation that reaches a transport provider first checks that the
//! host granted the permissions the chosen transport needs. The check happens
//! before any collaborator is called.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisioningError, Result};
use crate::types::TransportKind;

/// Platform permission relevant to provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    BluetoothScan,
    BluetoothConnect,
    FineLocation,
    WifiState,
    ChangeWifiState,
    NetworkState,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BluetoothScan => "BLUETOOTH_SCAN",
            Self::BluetoothConnect => "BLUETOOTH_CONNECT",
            Self::FineLocation => "ACCESS_FINE_LOCATION",
            Self::WifiState => "ACCESS_WIFI_STATE",
            Self::ChangeWifiState => "CHANGE_WIFI_STATE",
            Self::NetworkState => "ACCESS_NETWORK_STATE",
        }
    }
}

/// Operation class used to look up required permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedOperation {
    /// `search` and `stop_search`
    Search,
    /// `create_device`
    Create,
    /// `connect` and `initialise_session`
    Connect,
    /// `send_data`, `scan_wifi_list` and `provision`
    Session,
}

/// Permissions an operation needs on a given transport
pub fn required_permissions(operation: GatedOperation, transport: TransportKind) -> &'static [Permission] {
    use Permission::*;

    match (operation, transport) {
        (GatedOperation::Search, TransportKind::Ble) => &[BluetoothScan, BluetoothConnect, FineLocation],
        (GatedOperation::Search, TransportKind::SoftAp) => {
            &[WifiState, ChangeWifiState, NetworkState, FineLocation]
        }
        (GatedOperation::Create, TransportKind::Ble) => &[BluetoothConnect],
        (GatedOperation::Create, TransportKind::SoftAp) => &[NetworkState],
        (GatedOperation::Connect, TransportKind::Ble) => &[BluetoothConnect],
        (GatedOperation::Connect, TransportKind::SoftAp) => {
            &[WifiState, ChangeWifiState, NetworkState, FineLocation]
        }
        (GatedOperation::Session, TransportKind::Ble) => &[BluetoothConnect],
        (GatedOperation::Session, TransportKind::SoftAp) => &[NetworkState],
    }
}

// ----------------------------------------------------------------------------
// Permission Gate
// ----------------------------------------------------------------------------

/// Host-supplied view of granted permissions
pub trait PermissionGate: Send + Sync {
    fn granted(&self, permission: Permission) -> bool;

    /// Fail with [`ProvisioningError::Permission`] listing what is missing
    fn check(&self, operation: GatedOperation, transport: TransportKind) -> Result<()> {
        let missing: Vec<Permission> = required_permissions(operation, transport)
            .iter()
            .copied()
            .filter(|p| !self.granted(*p))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProvisioningError::Permission { missing })
        }
    }
}

/// Gate for hosts without a runtime permission model (desktop, tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn granted(&self, _permission: Permission) -> bool {
        true
    }
}

/// Gate backed by an explicit set of granted permissions
#[derive(Debug, Clone, Default)]
pub struct GrantedPermissions {
    granted: HashSet<Permission>,
}

impl GrantedPermissions {
    pub fn new(granted: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            granted: granted.into_iter().collect(),
        }
    }

    pub fn grant(&mut self, permission: Permission) {
        self.granted.insert(permission);
    }

    pub fn revoke(&mut self, permission: Permission) {
        self.granted.remove(&permission);
    }
}

impl PermissionGate for GrantedPermissions {
    fn granted(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ble_search_requires_location() {
        let gate = GrantedPermissions::new([Permission::BluetoothScan, Permission::BluetoothConnect]);
        let err = gate
            .check(GatedOperation::Search, TransportKind::Ble)
            .unwrap_err();
        assert_eq!(
            err,
            ProvisioningError::Permission {
                missing: vec![Permission::FineLocation]
            }
        );
        assert!(gate.check(GatedOperation::Connect, TransportKind::Ble).is_ok());
    }

    #[test]
    fn test_softap_connect_needs_wifi_permissions() {
        let mut gate = GrantedPermissions::new([Permission::NetworkState, Permission::FineLocation]);
        assert!(gate.check(GatedOperation::Connect, TransportKind::SoftAp).is_err());

        gate.grant(Permission::WifiState);
        gate.grant(Permission::ChangeWifiState);
        assert!(gate.check(GatedOperation::Connect, TransportKind::SoftAp).is_ok());

        gate.revoke(Permission::NetworkState);
        assert!(gate.check(GatedOperation::Session, TransportKind::SoftAp).is_err());
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.check(GatedOperation::Search, TransportKind::SoftAp).is_ok());
    }
}
