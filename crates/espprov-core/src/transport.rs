//! Transport provider abstraction
//!
//! A [`TransportProvider`] supplies raw discovery for one transport kind and
//! opens byte-oriented request/response [`Channel`]s to a device endpoint.
//! BLE and SoftAP differ only in the provider injected for them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::completion::Completer;
use crate::error::PlatformError;
use crate::types::{EndpointRef, ScanHit, TransportKind};

// ----------------------------------------------------------------------------
// Transport Provider Trait
// ----------------------------------------------------------------------------

/// Raw discovery and channel establishment for one transport kind
#[async_trait]
pub trait TransportProvider: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Begin a scan. Returns once the scan is running or failed to start.
    ///
    /// Hits are reported through [`ScanSink::found`] and the scan ends with a
    /// single [`ScanSink::finish`]. `prefix` is a hint; callers filter again.
    async fn start_scan(&self, prefix: &str, sink: ScanSink) -> Result<(), PlatformError>;

    /// Abort an in-flight scan. No-op when nothing is scanning.
    async fn stop_scan(&self);

    /// Look up an endpoint the platform already knows by name (bonded or
    /// previously seen peripherals).
    async fn find_known(&self, name: &str) -> Option<EndpointRef>;

    /// Whether the platform reports a live link to `endpoint`
    async fn is_connected(&self, endpoint: &EndpointRef) -> bool;

    /// Open a request/response channel to `endpoint`
    async fn open(
        &self,
        endpoint: &EndpointRef,
        options: &OpenOptions,
    ) -> Result<Arc<dyn Channel>, PlatformError>;
}

/// Transport-level inputs used when opening a channel
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Passphrase of the device-hosted access point (SoftAP only)
    pub softap_password: Option<String>,
    /// GATT service carrying the provisioning endpoints (BLE only)
    pub service_uuid: Option<Uuid>,
}

// ----------------------------------------------------------------------------
// Channel Trait
// ----------------------------------------------------------------------------

/// Request/response channel to a named endpoint on the device
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send `payload` to endpoint `path` and return the device's response
    async fn request(&self, path: &str, payload: &[u8]) -> Result<Vec<u8>, PlatformError>;

    /// Release the underlying transport link
    async fn close(&self);
}

// ----------------------------------------------------------------------------
// Scan Sink
// ----------------------------------------------------------------------------

/// Receiving side of a running scan, handed to the provider
#[derive(Debug, Clone)]
pub struct ScanSink {
    hits: mpsc::UnboundedSender<ScanHit>,
    done: Completer<Result<(), PlatformError>>,
}

impl ScanSink {
    pub(crate) fn new(
        hits: mpsc::UnboundedSender<ScanHit>,
        done: Completer<Result<(), PlatformError>>,
    ) -> Self {
        Self { hits, done }
    }

    /// Report a scan result. Ignored once the scan has finished.
    pub fn found(&self, hit: ScanHit) {
        if self.done.is_resolved() {
            return;
        }
        // Receiver is gone once the orchestrator stopped listening
        let _ = self.hits.send(hit);
    }

    /// Report the terminal scan outcome. Only the first call counts.
    pub fn finish(&self, outcome: Result<(), PlatformError>) -> bool {
        self.done.complete(outcome)
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_resolved()
    }
}
