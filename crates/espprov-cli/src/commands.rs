//! Command execution

use std::sync::Arc;

use espprov_ble::BleTransport;
use espprov_core::version::{parse_version_reply, VERSION_REQUEST};
use espprov_core::{
    Channel, OpenOptions, ProvisioningAdapter, ProvisioningError, Security, TransportKind,
    TransportProvider,
};
use serde_json::json;
use tracing::info;

use crate::cli::Commands;
use crate::config::CliConfig;
use crate::error::Result;

/// Runs one CLI command against a BLE-backed adapter
pub struct CommandDispatcher {
    adapter: ProvisioningAdapter,
    transport: Arc<BleTransport>,
}

impl CommandDispatcher {
    pub fn new(config: CliConfig) -> Self {
        let transport = Arc::new(BleTransport::with_config(config.ble));
        let adapter = ProvisioningAdapter::builder()
            .with_config(config.core)
            .with_transport(transport.clone())
            .build();
        Self { adapter, transport }
    }

    pub async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Search { prefix, security } => self.search(&prefix, security).await,
            Commands::Version { name } => self.version(&name).await,
        }
    }

    async fn search(&self, prefix: &str, security: u8) -> Result<()> {
        let security = Security::try_from(security)?;
        let devices = self
            .adapter
            .search(prefix, TransportKind::Ble, security)
            .await?;

        info!("Found {} device(s)", devices.len());
        println!("{}", serde_json::to_string_pretty(&devices)?);
        Ok(())
    }

    async fn version(&self, name: &str) -> Result<()> {
        self.adapter
            .search(name, TransportKind::Ble, Security::Unsecure)
            .await?;
        let record = self.adapter.registry().get(name).await?;
        let (endpoint, service_uuid) = {
            let r = record.read().await;
            let endpoint = r
                .endpoint()
                .cloned()
                .ok_or_else(|| ProvisioningError::DeviceNotFound {
                    name: name.to_string(),
                })?;
            (endpoint, r.primary_service_uuid())
        };

        let options = OpenOptions {
            service_uuid,
            ..OpenOptions::default()
        };
        let channel = self.transport.open(&endpoint, &options).await?;
        let reply = channel
            .request(&self.adapter.config().version_path, VERSION_REQUEST)
            .await;
        channel.close().await;

        let (capabilities, version_info) = parse_version_reply(&reply?)?;
        let report = json!({
            "name": name,
            "capabilities": capabilities,
            "versionInfo": version_info,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
