//! Permission gate tests
//!
//! With permissions withheld, every transport-touching operation rejects
//! before any collaborator is reached.


use std::sync::Arc;

use espprov_core::{
    EndpointRef, ErrorKind, GrantedPermissions, Permission, ProvisioningError, Security,
    SessionState, TransportKind,
};
use test_utils::{ble_hit, DenyAll, Harness, MockScheme, MockTransport};

const DEVICE: &str = "ORBITAL_001";

#[tokio::test]
async fn test_missing_permissions_block_every_transport_operation() {
    let h = Harness::with_permissions(
        MockTransport::ble(),
        MockScheme::new(Security::Unsecure),
        Arc::new(DenyAll),
    );
    h.adapter
        .registry()
        .upsert(DEVICE, TransportKind::Ble, Security::Unsecure)
        .await;

    let errors = vec![
        h.adapter
            .search("ORBITAL_", TransportKind::Ble, Security::Unsecure)
            .await
            .unwrap_err(),
        h.adapter.stop_search().await.unwrap_err(),
        h.adapter
            .create_device("OTHER", TransportKind::Ble, Security::Unsecure, None, None, None)
            .await
            .unwrap_err(),
        h.adapter.connect(DEVICE).await.unwrap_err(),
        h.adapter
            .initialise_session(DEVICE, "prov-session")
            .await
            .unwrap_err(),
        h.adapter.send_data(DEVICE, "/ping", "aGVsbG8=").await.unwrap_err(),
        h.adapter.scan_wifi_list(DEVICE).await.unwrap_err(),
        h.adapter.provision(DEVICE, "MySSID", "MyPass").await.unwrap_err(),
    ];
    h.adapter.disconnect(DEVICE).await;

    for err in errors {
        assert_eq!(err.kind(), ErrorKind::Permission, "{err}");
    }
    assert_eq!(h.transport.calls.total(), 0);
    assert_eq!(h.scheme.stats.handshakes(), 0);
    assert!(!h.adapter.registry().contains("OTHER").await);
}

#[tokio::test]
async fn test_permission_error_names_missing_permissions() {
    let granted = GrantedPermissions::new([Permission::BluetoothScan, Permission::BluetoothConnect]);
    let h = Harness::with_permissions(
        MockTransport::ble(),
        MockScheme::new(Security::Unsecure),
        Arc::new(granted),
    );

    let err = h
        .adapter
        .search("ORBITAL_", TransportKind::Ble, Security::Unsecure)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProvisioningError::Permission {
            missing: vec![Permission::FineLocation]
        }
    );
    assert_eq!(h.transport.calls.scans(), 0);
}

#[tokio::test]
async fn test_connect_permission_depends_on_transport() {
    let granted = GrantedPermissions::new([Permission::BluetoothConnect]);
    let h = Harness::with_permissions(
        MockTransport::softap(),
        MockScheme::new(Security::Unsecure),
        Arc::new(granted),
    );
    h.adapter
        .registry()
        .upsert("PROV_8A2F", TransportKind::SoftAp, Security::Unsecure)
        .await;

    let err = h.adapter.connect("PROV_8A2F").await.unwrap_err();

    match err {
        ProvisioningError::Permission { missing } => {
            assert!(missing.contains(&Permission::ChangeWifiState));
            assert!(!missing.contains(&Permission::BluetoothConnect));
        }
        other => panic!("expected permission error, got {other:?}"),
    }
    assert_eq!(h.transport.calls.opens(), 0);
}

#[tokio::test]
async fn test_connect_fallback_scan_requires_scan_permissions() {
    let granted = GrantedPermissions::new([Permission::BluetoothConnect]);
    let h = Harness::with_permissions(
        MockTransport::ble().with_hit(ble_hit(DEVICE)),
        MockScheme::new(Security::Unsecure),
        Arc::new(granted),
    );
    h.adapter
        .create_device(DEVICE, TransportKind::Ble, Security::Unsecure, None, None, None)
        .await
        .unwrap();

    let err = h.adapter.connect(DEVICE).await.unwrap_err();

    match err {
        ProvisioningError::Permission { missing } => {
            assert!(missing.contains(&Permission::BluetoothScan));
            assert!(missing.contains(&Permission::FineLocation));
        }
        other => panic!("expected permission error, got {other:?}"),
    }
    assert_eq!(h.transport.calls.scans(), 0);
    assert_eq!(h.transport.calls.opens(), 0);
    let record = h.adapter.registry().get(DEVICE).await.unwrap();
    assert_eq!(record.read().await.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_connect_known_peripheral_needs_only_connect_permission() {
    let granted = GrantedPermissions::new([Permission::BluetoothConnect]);
    let h = Harness::with_permissions(
        MockTransport::ble().with_known(DEVICE, EndpointRef::new("AA:BB:CC:DD:EE:01")),
        MockScheme::new(Security::Unsecure),
        Arc::new(granted),
    );
    h.adapter
        .create_device(DEVICE, TransportKind::Ble, Security::Unsecure, None, None, None)
        .await
        .unwrap();

    h.adapter.connect(DEVICE).await.unwrap();

    assert_eq!(h.transport.calls.scans(), 0);
    assert_eq!(h.transport.calls.opens(), 1);
}
