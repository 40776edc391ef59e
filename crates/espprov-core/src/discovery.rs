//! Discovery orchestration
//!
//! Runs a transport scan to completion, filters hits by name prefix,
//! de-duplicates them by name and materialises registry records.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::completion::{completion, Abandoned};
use crate::config::EmptySearchPolicy;
use crate::error::{ProvisioningError, Result};
use crate::registry::{DeviceRef, DeviceRegistry};
use crate::transport::{ScanSink, TransportProvider};
use crate::types::{ScanHit, Security, TransportKind};

// ----------------------------------------------------------------------------
// Hit Filtering
// ----------------------------------------------------------------------------

/// Name of a hit if it qualifies as a provisioning candidate
///
/// BLE hits need a non-empty advertised name and a service identifier;
/// anything else is advertisement noise. SoftAP hits only need a matching SSID.
pub fn candidate_name<'a>(kind: TransportKind, prefix: &str, hit: &'a ScanHit) -> Option<&'a str> {
    let name = hit.name.as_deref().filter(|n| !n.is_empty())?;
    if !name.starts_with(prefix) {
        return None;
    }
    match kind {
        TransportKind::Ble if hit.service_uuid.is_none() => None,
        _ => Some(name),
    }
}

// ----------------------------------------------------------------------------
// Discovery Orchestrator
// ----------------------------------------------------------------------------

/// Drives scans and populates the device registry
#[derive(Debug)]
pub struct DiscoveryOrchestrator {
    registry: Arc<DeviceRegistry>,
    empty_search: EmptySearchPolicy,
}

impl DiscoveryOrchestrator {
    pub fn new(registry: Arc<DeviceRegistry>, empty_search: EmptySearchPolicy) -> Self {
        Self {
            registry,
            empty_search,
        }
    }

    /// Clear the registry, scan, and register every matching device
    pub async fn search(
        &self,
        provider: &dyn TransportProvider,
        prefix: &str,
        security: Security,
    ) -> Result<Vec<DeviceRef>> {
        self.registry.clear().await;

        let hits = self.scan_matches(provider, prefix).await?;
        if hits.is_empty() && self.empty_search == EmptySearchPolicy::NoDeviceFound {
            return Err(ProvisioningError::NoDeviceFound {
                prefix: prefix.to_string(),
            });
        }

        let kind = provider.kind();
        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(name) = candidate_name(kind, prefix, &hit) else {
                continue;
            };
            let record = self.registry.upsert(name, kind, security).await;
            record
                .write()
                .await
                .bind_endpoint(hit.endpoint, hit.service_uuid, hit.rssi);
            records.push(record);
        }

        info!("Search for {:?} over {} found {} device(s)", prefix, kind, records.len());
        Ok(records)
    }

    /// Scan to completion and return matching hits, first hit per name.
    ///
    /// Does not touch the registry.
    pub async fn scan_matches(&self, provider: &dyn TransportProvider, prefix: &str) -> Result<Vec<ScanHit>> {
        let kind = provider.kind();
        let (hit_tx, mut hit_rx) = mpsc::unbounded_channel();
        let (done, finished) = completion("scan");

        provider
            .start_scan(prefix, ScanSink::new(hit_tx, done))
            .await
            .map_err(|e| ProvisioningError::Scan(format!("Scan could not be started: {}", e)))?;
        debug!("Started {} scan with prefix {:?}", kind, prefix);

        match finished.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ProvisioningError::Scan(e.message)),
            Err(Abandoned) => {
                return Err(ProvisioningError::Scan(
                    "scan ended without reporting completion".to_string(),
                ))
            }
        }

        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        while let Ok(hit) = hit_rx.try_recv() {
            let Some(name) = candidate_name(kind, prefix, &hit) else {
                debug!("Skipping scan hit {:?}", hit.name);
                continue;
            };
            if seen.insert(name.to_string()) {
                matches.push(hit);
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EndpointRef;
    use uuid::Uuid;

    fn hit(name: Option<&str>, service: bool) -> ScanHit {
        ScanHit {
            name: name.map(str::to_string),
            endpoint: EndpointRef::new("id"),
            service_uuid: service.then(Uuid::nil),
            rssi: None,
        }
    }

    #[test]
    fn test_ble_requires_name_and_service() {
        assert_eq!(candidate_name(TransportKind::Ble, "P", &hit(Some("P1"), true)), Some("P1"));
        assert_eq!(candidate_name(TransportKind::Ble, "P", &hit(Some("P1"), false)), None);
        assert_eq!(candidate_name(TransportKind::Ble, "P", &hit(Some(""), true)), None);
        assert_eq!(candidate_name(TransportKind::Ble, "P", &hit(None, true)), None);
        assert_eq!(candidate_name(TransportKind::Ble, "P", &hit(Some("Q1"), true)), None);
    }

    #[test]
    fn test_softap_matches_on_ssid_only() {
        assert_eq!(candidate_name(TransportKind::SoftAp, "PROV_", &hit(Some("PROV_1"), false)), Some("PROV_1"));
        assert_eq!(candidate_name(TransportKind::SoftAp, "", &hit(Some("Home"), false)), Some("Home"));
    }
}
