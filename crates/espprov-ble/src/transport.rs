//! BLE transport provider backed by btleplug

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use espprov_core::{
    Channel, EndpointRef, OpenOptions, PlatformError, ScanSink, TransportKind, TransportProvider,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BleTransportConfig;
use crate::connection::open_channel;
use crate::error::BleTransportError;
use crate::protocol::{Advertisement, ESP_PROV_SERVICE_UUID};

// ----------------------------------------------------------------------------
// Adapter State
// ----------------------------------------------------------------------------

#[derive(Default)]
struct AdapterState {
    // Kept alive for as long as the adapter is in use
    manager: Option<Manager>,
    adapter: Option<Adapter>,
}

// ----------------------------------------------------------------------------
// Scan Ownership
// ----------------------------------------------------------------------------

/// Tracks which scan currently owns the adapter
///
/// Each scan gets a fresh generation. A poll task keeps running only while its
/// generation is current and stops the adapter only if it still owns it, so a
/// stopped scan can never end a newer one.
#[derive(Debug, Default)]
struct ScanSlot {
    active: AtomicU64,
    next: AtomicU64,
}

impl ScanSlot {
    /// Claim the adapter, or `None` when a scan is already running
    fn begin(&self) -> Option<u64> {
        let generation = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.active
            .compare_exchange(0, generation, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) == generation
    }

    /// Give up ownership; true if this generation still held the adapter
    fn release(&self, generation: u64) -> bool {
        self.active
            .compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Cancel whichever scan is running; true if there was one
    fn stop(&self) -> bool {
        self.active.swap(0, Ordering::SeqCst) != 0
    }
}

// ----------------------------------------------------------------------------
// BLE Transport
// ----------------------------------------------------------------------------

/// [`TransportProvider`] for BLE GATT provisioning
pub struct BleTransport {
    config: BleTransportConfig,
    state: Mutex<AdapterState>,
    scan: Arc<ScanSlot>,
}

impl Default for BleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BleTransport {
    pub fn new() -> Self {
        Self::with_config(BleTransportConfig::default())
    }

    pub fn with_config(config: BleTransportConfig) -> Self {
        Self {
            config,
            state: Mutex::new(AdapterState::default()),
            scan: Arc::new(ScanSlot::default()),
        }
    }

    pub fn config(&self) -> &BleTransportConfig {
        &self.config
    }

    /// Initialise the first BLE adapter on first use
    async fn adapter(&self) -> Result<Adapter, BleTransportError> {
        let mut state = self.state.lock().await;
        if let Some(adapter) = &state.adapter {
            return Ok(adapter.clone());
        }

        let manager = Manager::new()
            .await
            .map_err(|e| BleTransportError::ManagerInit(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| BleTransportError::ManagerInit(e.to_string()))?
            .into_iter()
            .next()
            .ok_or(BleTransportError::AdapterNotAvailable)?;

        info!("BLE adapter initialized");
        state.adapter = Some(adapter.clone());
        state.manager = Some(manager);
        Ok(adapter)
    }

    async fn peripheral(&self, id: &str) -> Result<Peripheral, BleTransportError> {
        let adapter = self.adapter().await?;
        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| BleTransportError::ConnectionFailed(e.to_string()))?;
        peripherals
            .into_iter()
            .find(|p| p.id().to_string() == id)
            .ok_or_else(|| BleTransportError::PeripheralNotFound { id: id.to_string() })
    }
}

#[async_trait]
impl TransportProvider for BleTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ble
    }

    async fn start_scan(&self, prefix: &str, sink: ScanSink) -> Result<(), PlatformError> {
        let Some(generation) = self.scan.begin() else {
            return Err(BleTransportError::ScanInProgress.into());
        };
        let adapter = match self.adapter().await {
            Ok(adapter) => adapter,
            Err(e) => {
                self.scan.release(generation);
                return Err(e.into());
            }
        };

        // Service UUIDs often sit in the scan response, so filter after discovery
        if let Err(e) = adapter.start_scan(ScanFilter::default()).await {
            self.scan.release(generation);
            return Err(BleTransportError::ScanFailed(e.to_string()).into());
        }
        info!("Started BLE scan for {:?}", prefix);

        let scan = Arc::clone(&self.scan);
        let rounds = self.config.poll_rounds();
        let interval = self.config.poll_interval;
        let filter = self.config.service_uuid;
        tokio::spawn(async move {
            let mut seen = HashSet::new();

            for _ in 0..rounds {
                tokio::time::sleep(interval).await;
                if !scan.is_current(generation) {
                    break;
                }

                let peripherals = match adapter.peripherals().await {
                    Ok(peripherals) => peripherals,
                    Err(e) => {
                        warn!("BLE scan aborted: {}", e);
                        if scan.release(generation) {
                            let _ = adapter.stop_scan().await;
                        }
                        sink.finish(Err(PlatformError::new(format!(
                            "Failed to list peripherals: {e}"
                        ))));
                        return;
                    }
                };

                for peripheral in peripherals {
                    if !scan.is_current(generation) {
                        break;
                    }
                    let id = peripheral.id().to_string();
                    if seen.contains(&id) {
                        continue;
                    }
                    let Some(props) = peripheral.properties().await.ok().flatten() else {
                        continue;
                    };
                    // Names can arrive in a later advertisement
                    if props.local_name.is_none() {
                        continue;
                    }

                    let advertisement = Advertisement {
                        id: id.clone(),
                        address: Some(props.address.to_string()),
                        local_name: props.local_name,
                        services: props.services,
                        rssi: props.rssi,
                    };
                    if let Some(hit) = advertisement.into_hit(filter) {
                        debug!("Saw {:?} ({})", hit.name, id);
                        seen.insert(id);
                        sink.found(hit);
                    }
                }
            }

            if scan.release(generation) {
                let _ = adapter.stop_scan().await;
            }
            info!("BLE scan finished with {} peripheral(s)", seen.len());
            sink.finish(Ok(()));
        });

        Ok(())
    }

    async fn stop_scan(&self) {
        if !self.scan.stop() {
            return;
        }
        if let Ok(adapter) = self.adapter().await {
            if let Err(e) = adapter.stop_scan().await {
                warn!("Failed to stop BLE scan: {}", e);
            }
        }
    }

    async fn find_known(&self, name: &str) -> Option<EndpointRef> {
        let adapter = self.adapter().await.ok()?;
        let peripherals = adapter.peripherals().await.ok()?;
        for peripheral in peripherals {
            let Some(props) = peripheral.properties().await.ok().flatten() else {
                continue;
            };
            if props.local_name.as_deref() == Some(name) {
                return Some(
                    EndpointRef::new(peripheral.id().to_string())
                        .with_address(props.address.to_string()),
                );
            }
        }
        None
    }

    async fn is_connected(&self, endpoint: &EndpointRef) -> bool {
        match self.peripheral(&endpoint.id).await {
            Ok(peripheral) => peripheral.is_connected().await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn open(
        &self,
        endpoint: &EndpointRef,
        options: &OpenOptions,
    ) -> Result<Arc<dyn Channel>, PlatformError> {
        let peripheral = self.peripheral(&endpoint.id).await?;
        let service_uuid = options
            .service_uuid
            .or(self.config.service_uuid)
            .unwrap_or(ESP_PROV_SERVICE_UUID);

        let channel = open_channel(peripheral, service_uuid, &self.config).await?;
        Ok(Arc::new(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_scan_rejected_while_first_runs() {
        let slot = ScanSlot::default();
        let first = slot.begin().unwrap();

        assert!(slot.begin().is_none());
        assert!(slot.is_current(first));
    }

    #[test]
    fn test_stopped_scan_cannot_end_its_successor() {
        let slot = ScanSlot::default();
        let old = slot.begin().unwrap();
        assert!(slot.stop());

        let new = slot.begin().unwrap();
        assert_ne!(old, new);

        // The old poll task wakes up after the restart
        assert!(!slot.is_current(old));
        assert!(!slot.release(old));
        assert!(slot.is_current(new));

        assert!(slot.release(new));
        assert!(!slot.stop());
    }

    #[test]
    fn test_finished_scan_frees_the_slot() {
        let slot = ScanSlot::default();
        let generation = slot.begin().unwrap();

        assert!(slot.release(generation));
        assert!(!slot.is_current(generation));
        assert!(slot.begin().is_some());
    }
}
