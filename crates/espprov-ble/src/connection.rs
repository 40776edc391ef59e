//! GATT channel to a connected provisioning peripheral

use std::collections::HashMap;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use espprov_core::{Channel, PlatformError};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::BleTransportConfig;
use crate::error::BleTransportError;
use crate::protocol::{endpoint_name, normalize_path, USER_DESCRIPTION_UUID};

// ----------------------------------------------------------------------------
// Connection Setup
// ----------------------------------------------------------------------------

/// Connect to `peripheral`, discover the provisioning service and map its endpoints
pub(crate) async fn open_channel(
    peripheral: Peripheral,
    service_uuid: Uuid,
    config: &BleTransportConfig,
) -> Result<GattChannel, BleTransportError> {
    match timeout(config.connection_timeout, peripheral.connect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(BleTransportError::ConnectionFailed(e.to_string())),
        Err(_) => {
            // Best effort; the stack may still complete the connect later
            let _ = peripheral.disconnect().await;
            return Err(BleTransportError::ConnectionTimeout);
        }
    }

    if let Err(e) = peripheral.discover_services().await {
        let _ = peripheral.disconnect().await;
        return Err(BleTransportError::ServiceDiscoveryFailed(e.to_string()));
    }

    let has_service = peripheral.services().iter().any(|s| s.uuid == service_uuid);
    if !has_service {
        let _ = peripheral.disconnect().await;
        return Err(BleTransportError::ServiceNotFound);
    }

    let endpoints = map_endpoints(&peripheral, service_uuid).await;
    info!(
        "Connected to {:?} with {} endpoint(s)",
        peripheral.id(),
        endpoints.len()
    );
    Ok(GattChannel {
        peripheral,
        endpoints,
    })
}

/// Read the user description of every characteristic in the service
async fn map_endpoints(peripheral: &Peripheral, service_uuid: Uuid) -> HashMap<String, Characteristic> {
    let mut endpoints = HashMap::new();
    for characteristic in peripheral.characteristics() {
        if characteristic.service_uuid != service_uuid {
            continue;
        }
        let Some(descriptor) = characteristic
            .descriptors
            .iter()
            .find(|d| d.uuid == USER_DESCRIPTION_UUID)
            .cloned()
        else {
            continue;
        };
        match peripheral.read_descriptor(&descriptor).await {
            Ok(raw) => {
                if let Some(name) = endpoint_name(&raw) {
                    debug!("Endpoint {} -> {}", name, characteristic.uuid);
                    endpoints.insert(name, characteristic);
                }
            }
            Err(e) => warn!(
                "Could not read description of characteristic {}: {}",
                characteristic.uuid, e
            ),
        }
    }
    endpoints
}

// ----------------------------------------------------------------------------
// GATT Channel
// ----------------------------------------------------------------------------

/// Request/response channel over named GATT characteristics
///
/// A request is a write with response followed by a read of the same
/// characteristic.
pub struct GattChannel {
    peripheral: Peripheral,
    endpoints: HashMap<String, Characteristic>,
}

impl GattChannel {
    fn endpoint(&self, path: &str) -> Result<&Characteristic, BleTransportError> {
        self.endpoints
            .get(normalize_path(path))
            .ok_or_else(|| BleTransportError::EndpointNotFound {
                path: path.to_string(),
            })
    }
}

#[async_trait]
impl Channel for GattChannel {
    async fn request(&self, path: &str, payload: &[u8]) -> Result<Vec<u8>, PlatformError> {
        let characteristic = self.endpoint(path)?;

        self.peripheral
            .write(characteristic, payload, WriteType::WithResponse)
            .await
            .map_err(|e| BleTransportError::WriteFailed(e.to_string()))?;

        let response = self
            .peripheral
            .read(characteristic)
            .await
            .map_err(|e| BleTransportError::ReadFailed(e.to_string()))?;

        debug!("{}: sent {} bytes, received {}", path, payload.len(), response.len());
        Ok(response)
    }

    async fn close(&self) {
        if let Err(e) = self.peripheral.disconnect().await {
            error!("Failed to disconnect from {:?}: {}", self.peripheral.id(), e);
        }
    }
}
