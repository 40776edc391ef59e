//! Device registry and per-device records
//!
//! The registry maps a device name to exactly one [`DeviceRef`]. Records are
//! shared handles: clearing the registry makes a record unreachable by name
//! but holders of a [`DeviceRef`] keep a valid record.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ProvisioningError, Result};
use crate::security::SecureSession;
use crate::transport::Channel;
use crate::types::{DeviceSummary, EndpointRef, Security, SessionState, TransportKind};

/// Shared handle to a device record
pub type DeviceRef = Arc<RwLock<DeviceRecord>>;

// ----------------------------------------------------------------------------
// Live Session
// ----------------------------------------------------------------------------

/// Transport channel and authenticated session owned by a connected record
#[derive(Clone)]
pub(crate) struct LiveSession {
    pub(crate) channel: Arc<dyn Channel>,
    pub(crate) session: Arc<dyn SecureSession>,
}

impl LiveSession {
    /// Release the engine session and the transport link
    pub(crate) async fn release(self) {
        self.session.close();
        self.channel.close().await;
    }
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LiveSession")
    }
}

// ----------------------------------------------------------------------------
// Device Record
// ----------------------------------------------------------------------------

/// One discovered or manually created device
#[derive(Debug)]
pub struct DeviceRecord {
    name: String,
    transport: TransportKind,
    security: Security,
    endpoint: Option<EndpointRef>,
    primary_service_uuid: Option<Uuid>,
    rssi: Option<i16>,
    proof_of_possession: Option<String>,
    username: Option<String>,
    softap_password: Option<String>,
    state: SessionState,
    capabilities: Vec<String>,
    version_info: Option<serde_json::Value>,
    live: Option<LiveSession>,
    /// Incremented on every connect attempt
    attempt: u64,
}

impl DeviceRecord {
    pub fn new(name: impl Into<String>, transport: TransportKind, security: Security) -> Self {
        Self {
            name: name.into(),
            transport,
            security,
            endpoint: None,
            primary_service_uuid: None,
            rssi: None,
            proof_of_possession: None,
            username: None,
            softap_password: None,
            state: SessionState::Uninitialized,
            capabilities: Vec::new(),
            version_info: None,
            live: None,
            attempt: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn security(&self) -> Security {
        self.security
    }

    pub fn endpoint(&self) -> Option<&EndpointRef> {
        self.endpoint.as_ref()
    }

    pub fn primary_service_uuid(&self) -> Option<Uuid> {
        self.primary_service_uuid
    }

    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    pub fn proof_of_possession(&self) -> Option<&str> {
        self.proof_of_possession.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn softap_password(&self) -> Option<&str> {
        self.softap_password.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn version_info(&self) -> Option<&serde_json::Value> {
        self.version_info.as_ref()
    }

    /// Whether the record owns a live authenticated session
    pub fn has_session(&self) -> bool {
        self.live.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.live.is_some()
    }

    pub fn is_connecting(&self) -> bool {
        self.state == SessionState::Connecting
    }

    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            name: self.name.clone(),
            transport: self.transport,
            security: self.security,
            capabilities: self.capabilities.clone(),
            username: self.username.clone(),
            version_info: self.version_info.clone(),
            address: self.endpoint.as_ref().and_then(|e| e.address.clone()),
            primary_service_uuid: self.primary_service_uuid,
            rssi: self.rssi,
        }
    }

    // ------------------------------------------------------------------------
    // Field updates (take effect on the next connect)
    // ------------------------------------------------------------------------

    pub(crate) fn set_security(&mut self, security: Security) {
        self.security = security;
    }

    pub(crate) fn set_proof_of_possession(&mut self, pop: Option<String>) {
        self.proof_of_possession = pop;
    }

    pub(crate) fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    pub(crate) fn set_softap_password(&mut self, password: Option<String>) {
        self.softap_password = password;
    }

    pub(crate) fn set_primary_service_uuid(&mut self, uuid: Option<Uuid>) {
        self.primary_service_uuid = uuid;
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Bind advertisement data from a scan hit
    pub(crate) fn bind_endpoint(
        &mut self,
        endpoint: EndpointRef,
        service_uuid: Option<Uuid>,
        rssi: Option<i16>,
    ) {
        self.endpoint = Some(endpoint);
        if service_uuid.is_some() {
            self.primary_service_uuid = service_uuid;
        }
        if rssi.is_some() {
            self.rssi = rssi;
        }
    }

    pub(crate) fn set_metadata(&mut self, capabilities: Vec<String>, version_info: serde_json::Value) {
        self.capabilities = capabilities;
        self.version_info = Some(version_info);
    }

    // ------------------------------------------------------------------------
    // Session state transitions (adapter only)
    // ------------------------------------------------------------------------

    /// Enter CONNECTING and return the attempt number
    pub(crate) fn start_connection_attempt(&mut self) -> u64 {
        self.state = SessionState::Connecting;
        self.attempt += 1;
        self.attempt
    }

    /// Whether `attempt` is still the connect in progress
    pub(crate) fn is_current_attempt(&self, attempt: u64) -> bool {
        self.state == SessionState::Connecting && self.attempt == attempt
    }

    pub(crate) fn mark_connected(&mut self, live: LiveSession) {
        self.state = SessionState::Connected;
        self.live = Some(live);
    }

    pub(crate) fn mark_failed(&mut self) {
        self.state = SessionState::Failed;
    }

    /// Enter DISCONNECTED, handing back any session for release
    pub(crate) fn mark_disconnected(&mut self) -> Option<LiveSession> {
        self.state = SessionState::Disconnected;
        self.capabilities.clear();
        self.version_info = None;
        self.live.take()
    }

    /// Drop a session without changing state
    pub(crate) fn take_session(&mut self) -> Option<LiveSession> {
        self.live.take()
    }

    pub(crate) fn live_session(&self) -> Option<LiveSession> {
        self.live.clone()
    }
}

// ----------------------------------------------------------------------------
// Device Registry
// ----------------------------------------------------------------------------

/// Name-keyed store of device records
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, DeviceRef>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record for `name`, or return the existing one.
    ///
    /// An existing record keeps its transport; its security is updated and
    /// takes effect on the next connect.
    pub async fn upsert(&self, name: &str, transport: TransportKind, security: Security) -> DeviceRef {
        let mut devices = self.devices.write().await;
        if let Some(existing) = devices.get(name) {
            let existing = Arc::clone(existing);
            drop(devices);
            existing.write().await.set_security(security);
            return existing;
        }

        debug!("Registered device {} ({}, {})", name, transport, security);
        let record = Arc::new(RwLock::new(DeviceRecord::new(name, transport, security)));
        devices.insert(name.to_string(), Arc::clone(&record));
        record
    }

    pub async fn get(&self, name: &str) -> Result<DeviceRef> {
        self.devices
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ProvisioningError::device_not_found(name))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.devices.read().await.contains_key(name)
    }

    /// Drop every record. Outstanding [`DeviceRef`]s stay usable.
    pub async fn clear(&self) {
        self.devices.write().await.clear();
    }

    /// Move the record stored under `old` to `new`
    pub async fn rename(&self, old: &str, new: &str) -> Result<DeviceRef> {
        let mut devices = self.devices.write().await;
        if old == new {
            return devices
                .get(old)
                .cloned()
                .ok_or_else(|| ProvisioningError::device_not_found(old));
        }
        if devices.contains_key(new) {
            return Err(ProvisioningError::InvalidArgument(format!(
                "device name {new} is already registered"
            )));
        }
        let record = devices
            .remove(old)
            .ok_or_else(|| ProvisioningError::device_not_found(old))?;
        record.write().await.set_name(new.to_string());
        devices.insert(new.to_string(), Arc::clone(&record));
        Ok(record)
    }

    pub async fn names(&self) -> Vec<String> {
        self.devices.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_reuses_existing_record() {
        let registry = DeviceRegistry::new();
        let first = registry.upsert("ORBITAL_001", TransportKind::Ble, Security::Secure1).await;
        let second = registry.upsert("ORBITAL_001", TransportKind::Ble, Security::Secure2).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
        assert_eq!(first.read().await.security(), Security::Secure2);
    }

    #[tokio::test]
    async fn test_get_unknown_name() {
        let registry = DeviceRegistry::new();
        let err = registry.get("missing").await.unwrap_err();
        assert!(matches!(err, ProvisioningError::DeviceNotFound { name } if name == "missing"));
    }

    #[tokio::test]
    async fn test_clear_keeps_outstanding_handles_valid() {
        let registry = DeviceRegistry::new();
        let record = registry.upsert("A", TransportKind::SoftAp, Security::Unsecure).await;
        registry.clear().await;

        assert!(registry.is_empty().await);
        assert_eq!(record.read().await.name(), "A");
        assert!(registry.get("A").await.is_err());
    }

    #[tokio::test]
    async fn test_rename_rejects_taken_name() {
        let registry = DeviceRegistry::new();
        registry.upsert("A", TransportKind::Ble, Security::Unsecure).await;
        registry.upsert("B", TransportKind::Ble, Security::Unsecure).await;

        assert!(registry.rename("A", "B").await.is_err());
        let moved = registry.rename("A", "C").await.unwrap();
        assert_eq!(moved.read().await.name(), "C");
        assert!(!registry.contains("A").await);
        assert_eq!(registry.len().await, 2);
    }

    #[test]
    fn test_connection_attempts_are_numbered() {
        let mut record = DeviceRecord::new("A", TransportKind::Ble, Security::Unsecure);
        assert_eq!(record.state(), SessionState::Uninitialized);

        let first = record.start_connection_attempt();
        let second = record.start_connection_attempt();
        assert!(!record.is_current_attempt(first));
        assert!(record.is_current_attempt(second));

        record.mark_failed();
        assert!(!record.is_current_attempt(second));
        assert!(record.mark_disconnected().is_none());
        assert_eq!(record.state(), SessionState::Disconnected);
    }
}
