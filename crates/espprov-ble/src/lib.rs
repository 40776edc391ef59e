//! Bluetooth Low Energy transport for ESP Wi-Fi provisioning
//!
//! Implements the [`TransportProvider`] trait from `espprov-core` on top of
//! btleplug:
//!
//! - [`config`] - scan and connection timing
//! - [`error`] - BLE specific errors
//! - [`protocol`] - provisioning service UUIDs and endpoint naming
//! - [`connection`] - GATT request/response channel
//! - [`transport`] - the provider itself
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use espprov_ble::{BleTransport, BleTransportConfig};
//! use espprov_core::{ProvisioningAdapter, Security, TransportKind};
//!
//! # async fn example() -> espprov_core::Result<()> {
//! let transport = BleTransport::with_config(BleTransportConfig::new());
//! let adapter = ProvisioningAdapter::builder()
//!     .with_transport(Arc::new(transport))
//!     .build();
//!
//! let devices = adapter.search("PROV_", TransportKind::Ble, Security::Secure1).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod transport;

pub use config::BleTransportConfig;
pub use connection::GattChannel;
pub use error::BleTransportError;
pub use protocol::{ESP_PROV_SERVICE_UUID, USER_DESCRIPTION_UUID};
pub use transport::BleTransport;

pub use espprov_core::TransportProvider;
