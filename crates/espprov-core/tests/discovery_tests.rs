//! Discovery tests
//!
//! Searching over a scripted transport and registering matching devices.


use espprov_core::{
    EmptySearchPolicy, EndpointRef, ErrorKind, ProvisioningConfig, ProvisioningError, ScanHit,
    Security, TransportKind,
};
use test_utils::{ble_hit, Harness, MockScheme, MockTransport};

#[tokio::test]
async fn test_search_returns_single_matching_device() {
    let noise = ScanHit {
        service_uuid: None,
        ..ble_hit("ORBITAL_002")
    };
    let unnamed = ScanHit {
        name: None,
        ..ble_hit("ORBITAL_003")
    };
    let transport = MockTransport::ble()
        .with_hit(ble_hit("ORBITAL_001"))
        .with_hit(ble_hit("LAMP_7"))
        .with_hit(noise)
        .with_hit(unnamed);
    let h = Harness::new(transport, MockScheme::new(Security::Secure2));

    let found = h
        .adapter
        .search("ORBITAL_", TransportKind::Ble, Security::Secure2)
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    let summary = serde_json::to_value(&found[0]).unwrap();
    assert_eq!(summary["name"], "ORBITAL_001");
    assert_eq!(summary["transport"], "ble");
    assert_eq!(summary["security"], 2);
    assert_eq!(summary["rssi"], -58);
    assert_eq!(h.adapter.registry().len().await, 1);
}

#[tokio::test]
async fn test_search_keeps_first_hit_per_name() {
    let repeat = ScanHit {
        rssi: Some(-90),
        endpoint: EndpointRef::new("peripheral-duplicate"),
        ..ble_hit("ORBITAL_001")
    };
    let transport = MockTransport::ble()
        .with_hit(ble_hit("ORBITAL_001"))
        .with_hit(repeat);
    let h = Harness::new(transport, MockScheme::new(Security::Secure2));

    let found = h
        .adapter
        .search("ORBITAL_", TransportKind::Ble, Security::Secure2)
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].rssi, Some(-58));
}

#[tokio::test]
async fn test_search_replaces_previous_records() {
    let transport = MockTransport::ble().with_hit(ble_hit("ORBITAL_001"));
    let h = Harness::new(transport, MockScheme::new(Security::Secure1));

    h.adapter
        .create_device("MANUAL_1", TransportKind::Ble, Security::Secure1, None, None, None)
        .await
        .unwrap();
    h.adapter
        .search("ORBITAL_", TransportKind::Ble, Security::Secure1)
        .await
        .unwrap();

    assert!(!h.adapter.registry().contains("MANUAL_1").await);
    assert!(h.adapter.registry().contains("ORBITAL_001").await);
}

#[tokio::test]
async fn test_search_updates_security_of_rediscovered_device() {
    let transport = MockTransport::ble().with_hit(ble_hit("ORBITAL_001"));
    let h = Harness::new(transport, MockScheme::new(Security::Secure1));

    for security in [Security::Secure1, Security::Secure2] {
        h.adapter
            .search("ORBITAL_", TransportKind::Ble, security)
            .await
            .unwrap();
    }

    assert_eq!(
        h.adapter.get_security_type("ORBITAL_001").await.unwrap(),
        Security::Secure2
    );
}

#[tokio::test]
async fn test_empty_search_resolves_empty_by_default() {
    let h = Harness::new(MockTransport::ble(), MockScheme::new(Security::Unsecure));

    let found = h
        .adapter
        .search("ORBITAL_", TransportKind::Ble, Security::Unsecure)
        .await
        .unwrap();

    assert!(found.is_empty());
}

#[tokio::test]
async fn test_empty_search_can_reject() {
    let config = ProvisioningConfig::default().with_empty_search(EmptySearchPolicy::NoDeviceFound);
    let h = Harness::with_config(MockTransport::ble(), MockScheme::new(Security::Unsecure), config);

    let err = h
        .adapter
        .search("ORBITAL_", TransportKind::Ble, Security::Unsecure)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProvisioningError::NoDeviceFound {
            prefix: "ORBITAL_".to_string()
        }
    );
}

#[tokio::test]
async fn test_scan_start_failure_is_scan_error() {
    let transport = MockTransport::ble().failing_scan("Bluetooth adapter is off");
    let h = Harness::new(transport, MockScheme::new(Security::Unsecure));

    let err = h
        .adapter
        .search("ORBITAL_", TransportKind::Ble, Security::Unsecure)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Scan);
    assert!(err.to_string().contains("Bluetooth adapter is off"));
}

#[tokio::test]
async fn test_search_without_provider_fails() {
    let h = Harness::new(MockTransport::ble(), MockScheme::new(Security::Unsecure));

    let err = h
        .adapter
        .search("PROV_", TransportKind::SoftAp, Security::Unsecure)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Scan);
}

#[tokio::test]
async fn test_softap_search_matches_ssid() {
    let ssid = ScanHit {
        name: Some("PROV_8A2F".to_string()),
        endpoint: EndpointRef::new("PROV_8A2F"),
        service_uuid: None,
        rssi: Some(-40),
    };
    let h = Harness::new(
        MockTransport::softap().with_hit(ssid),
        MockScheme::new(Security::Secure1),
    );

    let found = h
        .adapter
        .search("PROV_", TransportKind::SoftAp, Security::Secure1)
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].transport, TransportKind::SoftAp);
}

#[tokio::test]
async fn test_stop_search_reaches_provider() {
    let h = Harness::new(MockTransport::ble(), MockScheme::new(Security::Unsecure));

    h.adapter.stop_search().await.unwrap();
    h.adapter.stop_search().await.unwrap();

    assert_eq!(h.transport.calls.stops.load(std::sync::atomic::Ordering::SeqCst), 2);
}
