//! BLE transport configuration

use std::time::Duration;

use uuid::Uuid;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the BLE transport provider
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BleTransportConfig {
    /// How long a scan runs before it finishes on its own
    pub scan_timeout: Duration,
    /// Interval between peripheral list polls while scanning
    pub poll_interval: Duration,
    /// Maximum time to wait for a GATT connection
    pub connection_timeout: Duration,
    /// Only report peripherals advertising this service
    pub service_uuid: Option<Uuid>,
}

impl Default for BleTransportConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            connection_timeout: Duration::from_secs(10),
            service_uuid: None,
        }
    }
}

impl BleTransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Restrict discovery to peripherals advertising `uuid`
    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuid = Some(uuid);
        self
    }

    /// Number of polls that fit into one scan
    pub(crate) fn poll_rounds(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        (self.scan_timeout.as_millis() / interval).max(1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_rounds() {
        assert_eq!(BleTransportConfig::default().poll_rounds(), 20);
        let short = BleTransportConfig::new()
            .with_scan_timeout(Duration::from_millis(100))
            .with_poll_interval(Duration::from_secs(1));
        assert_eq!(short.poll_rounds(), 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BleTransportConfig = toml::from_str(
            r#"
            service_uuid = "021a9004-0382-4aea-bff4-6b3f1c5adfb4"
            "#,
        )
        .unwrap();
        assert_eq!(config.scan_timeout, Duration::from_secs(10));
        assert!(config.service_uuid.is_some());
    }
}
