//! GATT layout of the ESP provisioning service
//!
//! Provisioning firmware exposes one primary service. Each endpoint is a
//! characteristic whose User Characteristic Description descriptor (0x2901)
//! holds the endpoint name, e.g. `prov-session` or `proto-ver`.

use espprov_core::{EndpointRef, ScanHit};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// UUIDs
// ----------------------------------------------------------------------------

/// Default primary service UUID advertised by ESP-IDF provisioning firmware
pub const ESP_PROV_SERVICE_UUID: Uuid = Uuid::from_u128(0x021a9004_0382_4aea_bff4_6b3f1c5adfb4);

/// User Characteristic Description descriptor
pub const USER_DESCRIPTION_UUID: Uuid = Uuid::from_u128(0x00002901_0000_1000_8000_00805f9b34fb);

// ----------------------------------------------------------------------------
// Endpoint Names
// ----------------------------------------------------------------------------

/// Decode a user description descriptor value into an endpoint name
pub fn endpoint_name(raw: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(raw).ok()?;
    let name = name.trim_end_matches('\0').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Endpoint names are registered without a leading slash
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

// ----------------------------------------------------------------------------
// Advertisements
// ----------------------------------------------------------------------------

/// Advertisement fields read from a peripheral during a scan
#[derive(Debug, Clone, Default)]
pub struct Advertisement {
    pub id: String,
    pub address: Option<String>,
    pub local_name: Option<String>,
    pub services: Vec<Uuid>,
    pub rssi: Option<i16>,
}

impl Advertisement {
    /// Turn the advertisement into a scan hit if it carries a usable service.
    ///
    /// With a `service_filter` only that service qualifies; otherwise the
    /// first advertised service is reported.
    pub fn into_hit(self, service_filter: Option<Uuid>) -> Option<ScanHit> {
        let service_uuid = match service_filter {
            Some(wanted) => self.services.iter().copied().find(|s| *s == wanted)?,
            None => *self.services.first()?,
        };
        let mut endpoint = EndpointRef::new(self.id);
        if let Some(address) = self.address {
            endpoint = endpoint.with_address(address);
        }
        Some(ScanHit {
            name: self.local_name,
            endpoint,
            service_uuid: Some(service_uuid),
            rssi: self.rssi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advertisement(services: Vec<Uuid>) -> Advertisement {
        Advertisement {
            id: "hci0/dev_24_0A_C4_00_00_01".to_string(),
            address: Some("24:0A:C4:00:00:01".to_string()),
            local_name: Some("PROV_8A2F".to_string()),
            services,
            rssi: Some(-60),
        }
    }

    #[test]
    fn test_endpoint_name_strips_padding() {
        assert_eq!(endpoint_name(b"prov-session\0"), Some("prov-session".to_string()));
        assert_eq!(endpoint_name(b"\0"), None);
        assert_eq!(endpoint_name(&[0xff, 0xfe]), None);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/custom-data"), "custom-data");
        assert_eq!(normalize_path("proto-ver"), "proto-ver");
    }

    #[test]
    fn test_filtered_advertisement() {
        let other = Uuid::from_u128(0x180d);
        let hit = advertisement(vec![other, ESP_PROV_SERVICE_UUID])
            .into_hit(Some(ESP_PROV_SERVICE_UUID))
            .unwrap();
        assert_eq!(hit.service_uuid, Some(ESP_PROV_SERVICE_UUID));
        assert_eq!(hit.endpoint.address.as_deref(), Some("24:0A:C4:00:00:01"));

        assert!(advertisement(vec![other]).into_hit(Some(ESP_PROV_SERVICE_UUID)).is_none());
    }

    #[test]
    fn test_advertisement_without_services_is_dropped() {
        assert!(advertisement(Vec::new()).into_hit(None).is_none());
    }
}
