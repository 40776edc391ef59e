//! Provisioning session adapter
//!
//! [`ProvisioningAdapter`] is the public operation surface. It owns the
//! device registry, selects the injected transport provider and security
//! scheme for each record, drives the per-device lifecycle
//! (create, connect, data exchange, Wi-Fi scan, provision, disconnect) and
//! maps every collaborator failure to a [`ProvisioningError`].
//!
//! Callers must serialise operations per device name. The adapter rejects a
//! second `connect` while one is in flight but does not queue other calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, error, info, warn};

use crate::completion::{completion, Abandoned};
use crate::config::ProvisioningConfig;
use crate::discovery::DiscoveryOrchestrator;
use crate::error::{PlatformError, ProvisioningError, Result};
use crate::permissions::{AllowAll, GatedOperation, PermissionGate};
use crate::registry::{DeviceRef, DeviceRegistry, LiveSession};
use crate::security::{
    HandshakeParams, ProvisionListener, ProvisionPhase, SecureSession, SecurityScheme,
};
use crate::transport::{Channel, OpenOptions, TransportProvider};
use crate::types::{
    DeviceSummary, EndpointRef, ScanHit, Security, StatusResponse, TransportKind, WifiCredentials,
    WifiNetwork,
};
use crate::version::{parse_version_reply, VERSION_REQUEST};

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Assembles a [`ProvisioningAdapter`] from its collaborators
pub struct ProvisioningAdapterBuilder {
    config: ProvisioningConfig,
    registry: Option<Arc<DeviceRegistry>>,
    transports: HashMap<TransportKind, Arc<dyn TransportProvider>>,
    schemes: HashMap<Security, Arc<dyn SecurityScheme>>,
    permissions: Arc<dyn PermissionGate>,
}

impl Default for ProvisioningAdapterBuilder {
    fn default() -> Self {
        Self {
            config: ProvisioningConfig::default(),
            registry: None,
            transports: HashMap::new(),
            schemes: HashMap::new(),
            permissions: Arc::new(AllowAll),
        }
    }
}

impl ProvisioningAdapterBuilder {
    pub fn with_config(mut self, config: ProvisioningConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing registry instead of creating a fresh one
    pub fn with_registry(mut self, registry: Arc<DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register the provider for its transport kind, replacing any previous one
    pub fn with_transport(mut self, provider: Arc<dyn TransportProvider>) -> Self {
        self.transports.insert(provider.kind(), provider);
        self
    }

    /// Register the scheme for its security level, replacing any previous one
    pub fn with_scheme(mut self, scheme: Arc<dyn SecurityScheme>) -> Self {
        self.schemes.insert(scheme.security(), scheme);
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionGate>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn build(self) -> ProvisioningAdapter {
        let registry = self.registry.unwrap_or_default();
        let discovery = DiscoveryOrchestrator::new(Arc::clone(&registry), self.config.empty_search);
        ProvisioningAdapter {
            registry,
            discovery,
            transports: self.transports,
            schemes: self.schemes,
            permissions: self.permissions,
            config: self.config,
            search_transport: Mutex::new(None),
        }
    }
}

// ----------------------------------------------------------------------------
// Provisioning Adapter
// ----------------------------------------------------------------------------

/// Request/response surface over the device registry and collaborators
pub struct ProvisioningAdapter {
    registry: Arc<DeviceRegistry>,
    discovery: DiscoveryOrchestrator,
    transports: HashMap<TransportKind, Arc<dyn TransportProvider>>,
    schemes: HashMap<Security, Arc<dyn SecurityScheme>>,
    permissions: Arc<dyn PermissionGate>,
    config: ProvisioningConfig,
    /// Transport of the most recent search, targeted by `stop_search`
    search_transport: Mutex<Option<TransportKind>>,
}

impl ProvisioningAdapter {
    pub fn builder() -> ProvisioningAdapterBuilder {
        ProvisioningAdapterBuilder::default()
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub(crate) async fn record(&self, name: &str) -> Result<DeviceRef> {
        self.registry.get(name).await
    }

    fn provider(&self, kind: TransportKind) -> Option<&Arc<dyn TransportProvider>> {
        self.transports.get(&kind)
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    /// Clear the registry and register every device whose name starts with `prefix`
    pub async fn search(
        &self,
        prefix: &str,
        transport: TransportKind,
        security: Security,
    ) -> Result<Vec<DeviceSummary>> {
        self.permissions.check(GatedOperation::Search, transport)?;
        let provider = self.provider(transport).ok_or_else(|| {
            ProvisioningError::Scan(format!("no {} transport available", transport))
        })?;

        if let Ok(mut active) = self.search_transport.lock() {
            *active = Some(transport);
        }

        let records = self.discovery.search(provider.as_ref(), prefix, security).await?;
        let mut summaries = Vec::with_capacity(records.len());
        for record in records {
            summaries.push(record.read().await.summary());
        }
        Ok(summaries)
    }

    /// Abort the scan started by the most recent search
    pub async fn stop_search(&self) -> Result<()> {
        let transport = self
            .search_transport
            .lock()
            .ok()
            .and_then(|active| *active)
            .unwrap_or(TransportKind::Ble);
        self.permissions.check(GatedOperation::Search, transport)?;

        if let Some(provider) = self.provider(transport) {
            provider.stop_scan().await;
        }
        Ok(())
    }

    /// Register a device by name without scanning
    ///
    /// The proof of possession is always replaced, so passing `None` clears a
    /// stored one. Username and SoftAP password are only replaced when given.
    pub async fn create_device(
        &self,
        name: &str,
        transport: TransportKind,
        security: Security,
        proof_of_possession: Option<String>,
        softap_password: Option<String>,
        username: Option<String>,
    ) -> Result<DeviceSummary> {
        self.permissions.check(GatedOperation::Create, transport)?;

        let record = self.registry.upsert(name, transport, security).await;
        let mut record = record.write().await;
        record.set_proof_of_possession(proof_of_possession);
        if softap_password.is_some() {
            record.set_softap_password(softap_password);
        }
        if username.is_some() {
            record.set_username(username);
        }
        Ok(record.summary())
    }

    // ------------------------------------------------------------------------
    // Connect
    // ------------------------------------------------------------------------

    /// Establish an authenticated session with a registered device
    pub async fn connect(&self, name: &str) -> Result<StatusResponse> {
        let record = self.record(name).await?;
        let transport = record.read().await.transport();
        self.permissions.check(GatedOperation::Connect, transport)?;
        let provider = self
            .provider(transport)
            .ok_or_else(|| {
                ProvisioningError::connection_failed(name, format!("no {} transport available", transport))
            })?
            .clone();

        if self.reuse_live_session(&record, provider.as_ref()).await {
            return Ok(StatusResponse::connected());
        }

        let (attempt, security, endpoint, mut options, params) = {
            let mut r = record.write().await;
            if r.is_connecting() {
                return Err(ProvisioningError::connection_failed(
                    name,
                    "connection already in progress",
                ));
            }
            if r.is_connected() {
                return Ok(StatusResponse::connected());
            }
            check_credentials(name, r.security(), r.proof_of_possession(), r.username())?;

            let attempt = r.start_connection_attempt();
            let params = HandshakeParams {
                device_name: name.to_string(),
                session_path: self.config.session_path.clone(),
                proof_of_possession: r.proof_of_possession().map(str::to_string),
                username: r.username().map(str::to_string),
            };
            let options = OpenOptions {
                softap_password: r.softap_password().map(str::to_string),
                service_uuid: r.primary_service_uuid(),
            };
            (attempt, r.security(), r.endpoint().cloned(), options, params)
        };
        info!("Connecting to {} over {} ({})", name, transport, security);

        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => match self.resolve_endpoint(name, provider.as_ref()).await {
                Err(e) => {
                    self.fail_attempt(&record, attempt).await;
                    return Err(e);
                }
                Ok(Some(hit)) => {
                    record
                        .write()
                        .await
                        .bind_endpoint(hit.endpoint.clone(), hit.service_uuid, hit.rssi);
                    options.service_uuid = options.service_uuid.or(hit.service_uuid);
                    hit.endpoint
                }
                Ok(None) => {
                    self.fail_attempt(&record, attempt).await;
                    return Err(ProvisioningError::device_not_found(name));
                }
            },
        };

        let Some(scheme) = self.schemes.get(&security).cloned() else {
            self.fail_attempt(&record, attempt).await;
            return Err(ProvisioningError::connection_failed(
                name,
                format!("no handshake available for {}", security),
            ));
        };

        let channel = match provider.open(&endpoint, &options).await {
            Ok(channel) => channel,
            Err(e) => {
                error!("Failed to open {} channel to {}: {}", transport, name, e);
                self.fail_attempt(&record, attempt).await;
                return Err(ProvisioningError::connection_failed(name, e));
            }
        };

        let session = match handshake(scheme.as_ref(), Arc::clone(&channel), params).await {
            Ok(session) => session,
            Err(e) => {
                error!("Handshake with {} failed: {}", name, e);
                channel.close().await;
                self.fail_attempt(&record, attempt).await;
                return Err(ProvisioningError::connection_failed(name, e));
            }
        };

        let live = LiveSession {
            channel: Arc::clone(&channel),
            session,
        };
        {
            let mut r = record.write().await;
            if !r.is_current_attempt(attempt) {
                drop(r);
                live.release().await;
                return Err(ProvisioningError::connection_failed(
                    name,
                    "disconnected while connecting",
                ));
            }
            r.mark_connected(live);
        }
        info!("Connected to {}", name);

        self.enrich_metadata(&record, name, channel.as_ref()).await;
        Ok(StatusResponse::connected())
    }

    /// Whether a connected record's session can be handed back as is.
    ///
    /// A BLE record whose link the platform reports as down loses its stale
    /// session so the caller reconnects from scratch.
    async fn reuse_live_session(&self, record: &DeviceRef, provider: &dyn TransportProvider) -> bool {
        let (connected, endpoint) = {
            let r = record.read().await;
            (r.is_connected(), r.endpoint().cloned())
        };
        if !connected {
            return false;
        }
        if provider.kind() != TransportKind::Ble {
            return true;
        }
        if let Some(endpoint) = &endpoint {
            if provider.is_connected(endpoint).await {
                return true;
            }
        }

        let stale = {
            let mut r = record.write().await;
            if r.is_connected() {
                r.mark_disconnected()
            } else {
                None
            }
        };
        if let Some(stale) = stale {
            debug!("Dropping stale session for {}", record.read().await.name());
            stale.release().await;
        }
        false
    }

    /// Bind an endpoint for a record created without a scan hit
    ///
    /// The fallback scan is a native scan, so it needs the search permissions
    /// on top of the connect ones already checked.
    async fn resolve_endpoint(
        &self,
        name: &str,
        provider: &dyn TransportProvider,
    ) -> Result<Option<ScanHit>> {
        if provider.kind() == TransportKind::SoftAp {
            return Ok(Some(ScanHit {
                name: Some(name.to_string()),
                endpoint: EndpointRef::new(name),
                service_uuid: None,
                rssi: None,
            }));
        }

        if let Some(endpoint) = provider.find_known(name).await {
            debug!("Resolved {} from known peripherals", name);
            return Ok(Some(ScanHit {
                name: Some(name.to_string()),
                endpoint,
                service_uuid: None,
                rssi: None,
            }));
        }

        if !self.config.fallback_scan {
            return Ok(None);
        }
        self.permissions.check(GatedOperation::Search, provider.kind())?;
        match self.discovery.scan_matches(provider, name).await {
            Ok(hits) => Ok(hits.into_iter().find(|hit| hit.name.as_deref() == Some(name))),
            Err(e) => {
                warn!("Fallback scan for {} failed: {}", name, e);
                Ok(None)
            }
        }
    }

    async fn fail_attempt(&self, record: &DeviceRef, attempt: u64) {
        let mut r = record.write().await;
        if r.is_current_attempt(attempt) {
            r.mark_failed();
        }
    }

    /// Fetch version info and capabilities; failures are not fatal
    async fn enrich_metadata(&self, record: &DeviceRef, name: &str, channel: &dyn Channel) {
        let reply = match channel.request(&self.config.version_path, VERSION_REQUEST).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Could not read version info from {}: {}", name, e);
                return;
            }
        };
        match parse_version_reply(&reply) {
            Ok((capabilities, version_info)) => {
                let mut r = record.write().await;
                if r.is_connected() {
                    r.set_metadata(capabilities, version_info);
                }
            }
            Err(e) => warn!("Ignoring version info from {}: {}", name, e),
        }
    }

    /// Re-run the handshake over the record's live channel
    pub async fn initialise_session(&self, name: &str, session_path: &str) -> Result<StatusResponse> {
        let record = self.record(name).await?;
        let transport = record.read().await.transport();
        self.permissions.check(GatedOperation::Connect, transport)?;

        let (attempt, security, previous, params) = {
            let mut r = record.write().await;
            if r.is_connecting() {
                return Err(ProvisioningError::connection_failed(
                    name,
                    "connection already in progress",
                ));
            }
            if !r.is_connected() {
                return Err(ProvisioningError::connection_failed(name, "device is not connected"));
            }
            let params = HandshakeParams {
                device_name: name.to_string(),
                session_path: session_path.to_string(),
                proof_of_possession: r.proof_of_possession().map(str::to_string),
                username: r.username().map(str::to_string),
            };
            let security = r.security();
            let attempt = r.start_connection_attempt();
            let previous = r.take_session();
            (attempt, security, previous, params)
        };
        let Some(previous) = previous else {
            self.fail_attempt(&record, attempt).await;
            return Err(ProvisioningError::connection_failed(name, "device is not connected"));
        };
        previous.session.close();
        let channel = previous.channel;

        let outcome = match self.schemes.get(&security) {
            Some(scheme) => handshake(scheme.as_ref(), Arc::clone(&channel), params).await,
            None => Err(PlatformError::new(format!("no handshake available for {}", security))),
        };
        let session = match outcome {
            Ok(session) => session,
            Err(e) => {
                channel.close().await;
                self.fail_attempt(&record, attempt).await;
                return Err(ProvisioningError::connection_failed(name, e));
            }
        };

        let live = LiveSession { channel, session };
        let mut r = record.write().await;
        if !r.is_current_attempt(attempt) {
            drop(r);
            live.release().await;
            return Err(ProvisioningError::connection_failed(
                name,
                "disconnected while connecting",
            ));
        }
        r.mark_connected(live);
        info!("Session with {} re-established on {}", name, session_path);
        Ok(StatusResponse::connected())
    }

    /// Whether `name` is connected with a live session
    pub async fn is_session_established(&self, name: &str) -> Result<bool> {
        Ok(self.record(name).await?.read().await.is_connected())
    }

    // ------------------------------------------------------------------------
    // Session Operations
    // ------------------------------------------------------------------------

    async fn live_session(&self, name: &str) -> Result<LiveSession> {
        let record = self.record(name).await?;
        let r = record.read().await;
        self.permissions.check(GatedOperation::Session, r.transport())?;
        match r.live_session() {
            Some(live) if r.is_connected() => Ok(live),
            _ => Err(ProvisioningError::transport(name, "device is not connected")),
        }
    }

    /// Exchange a base64 payload with a custom endpoint on the device
    pub async fn send_data(&self, name: &str, path: &str, payload: &str) -> Result<String> {
        let live = self.live_session(name).await?;
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| ProvisioningError::InvalidPayload(e.to_string()))?;

        let (done, reply) = completion("send_data");
        live.session.send_data(path, bytes, done);
        match reply.await {
            Ok(Ok(response)) => {
                debug!("Received {} bytes from {}/{}", response.len(), name, path);
                Ok(BASE64.encode(response))
            }
            Ok(Err(e)) => Err(ProvisioningError::transport(name, e)),
            Err(Abandoned) => Err(ProvisioningError::transport(name, Abandoned)),
        }
    }

    /// Ask the device for the Wi-Fi networks it can see
    pub async fn scan_wifi_list(&self, name: &str) -> Result<Vec<WifiNetwork>> {
        let live = self.live_session(name).await?;

        let (done, report) = completion("wifi_scan");
        live.session.scan_wifi(done);
        match report.await {
            Ok(report) => report
                .into_networks()
                .map_err(|e| ProvisioningError::wifi_scan(name, e)),
            Err(Abandoned) => Err(ProvisioningError::wifi_scan(name, Abandoned)),
        }
    }

    /// Send Wi-Fi credentials and wait for the device's verdict
    pub async fn provision(&self, name: &str, ssid: &str, passphrase: &str) -> Result<StatusResponse> {
        let live = self.live_session(name).await?;

        let (done, outcome) = completion("provision");
        let credentials = WifiCredentials {
            ssid: ssid.to_string(),
            passphrase: passphrase.to_string(),
        };
        info!("Provisioning {} onto {}", name, ssid);
        live.session
            .provision(credentials, ProvisionListener::new(name.to_string(), done));

        let (phase, reason) = match outcome.await {
            Ok(Ok(())) => {
                info!("Provisioned {}", name);
                return Ok(StatusResponse::success());
            }
            Ok(Err(failure)) => failure,
            Err(Abandoned) => (ProvisionPhase::Device, Abandoned.to_string()),
        };
        error!("Provisioning {} failed during {}: {}", name, phase, reason);
        Err(ProvisioningError::ProvisioningFailed {
            name: name.to_string(),
            phase,
            reason,
        })
    }

    /// Release the session for `name`. Unknown names are ignored.
    pub async fn disconnect(&self, name: &str) {
        let Ok(record) = self.record(name).await else {
            debug!("Disconnect for unknown device {}", name);
            return;
        };
        let released = record.write().await.mark_disconnected();
        if let Some(live) = released {
            live.release().await;
            info!("Disconnected from {}", name);
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

async fn handshake(
    scheme: &dyn SecurityScheme,
    channel: Arc<dyn Channel>,
    params: HandshakeParams,
) -> std::result::Result<Arc<dyn SecureSession>, PlatformError> {
    let (done, outcome) = completion("handshake");
    scheme.handshake(channel, params, done);
    match outcome.await {
        Ok(result) => result,
        Err(Abandoned) => Err(PlatformError::new(Abandoned.to_string())),
    }
}

fn check_credentials(
    name: &str,
    security: Security,
    proof_of_possession: Option<&str>,
    username: Option<&str>,
) -> Result<()> {
    if security.requires_pop() && proof_of_possession.is_none() {
        return Err(ProvisioningError::connection_failed(
            name,
            format!("{} requires a proof of possession", security),
        ));
    }
    if security.requires_username() && username.is_none() {
        return Err(ProvisioningError::connection_failed(
            name,
            format!("{} requires a username", security),
        ));
    }
    Ok(())
}
