//! Per-device field accessors
//!
//! Reads and writes of individual record fields. Writes take effect on the
//! next `connect`; a live session keeps the values it was established with.

use tracing::debug;
use uuid::Uuid;

use crate::adapter::ProvisioningAdapter;
use crate::error::{ProvisioningError, Result};
use crate::types::{Security, TransportKind};

impl ProvisioningAdapter {
    pub async fn get_device_name(&self, name: &str) -> Result<String> {
        Ok(self.record(name).await?.read().await.name().to_string())
    }

    /// Re-key the record stored under `name`
    pub async fn set_device_name(&self, name: &str, new_name: &str) -> Result<()> {
        if new_name.is_empty() {
            return Err(ProvisioningError::InvalidArgument(
                "device name must not be empty".to_string(),
            ));
        }
        self.registry().rename(name, new_name).await?;
        debug!("Renamed device {} to {}", name, new_name);
        Ok(())
    }

    pub async fn get_transport_type(&self, name: &str) -> Result<TransportKind> {
        Ok(self.record(name).await?.read().await.transport())
    }

    pub async fn get_security_type(&self, name: &str) -> Result<Security> {
        Ok(self.record(name).await?.read().await.security())
    }

    pub async fn set_security_type(&self, name: &str, security: Security) -> Result<()> {
        self.record(name).await?.write().await.set_security(security);
        Ok(())
    }

    pub async fn get_proof_of_possession(&self, name: &str) -> Result<Option<String>> {
        let record = self.record(name).await?;
        let pop = record.read().await.proof_of_possession().map(str::to_string);
        Ok(pop)
    }

    pub async fn set_proof_of_possession(&self, name: &str, pop: Option<String>) -> Result<()> {
        self.record(name).await?.write().await.set_proof_of_possession(pop);
        Ok(())
    }

    pub async fn get_username(&self, name: &str) -> Result<Option<String>> {
        let record = self.record(name).await?;
        let username = record.read().await.username().map(str::to_string);
        Ok(username)
    }

    pub async fn set_username(&self, name: &str, username: Option<String>) -> Result<()> {
        self.record(name).await?.write().await.set_username(username);
        Ok(())
    }

    pub async fn get_softap_password(&self, name: &str) -> Result<Option<String>> {
        let record = self.record(name).await?;
        let password = record.read().await.softap_password().map(str::to_string);
        Ok(password)
    }

    pub async fn set_softap_password(&self, name: &str, password: Option<String>) -> Result<()> {
        self.record(name).await?.write().await.set_softap_password(password);
        Ok(())
    }

    pub async fn get_primary_service_uuid(&self, name: &str) -> Result<Option<Uuid>> {
        Ok(self.record(name).await?.read().await.primary_service_uuid())
    }

    /// Set the GATT service to connect to. `uuid` must be a hyphenated UUID.
    pub async fn set_primary_service_uuid(&self, name: &str, uuid: &str) -> Result<()> {
        let uuid = Uuid::parse_str(uuid)
            .map_err(|e| ProvisioningError::InvalidArgument(format!("invalid service uuid {uuid:?}: {e}")))?;
        self.record(name)
            .await?
            .write()
            .await
            .set_primary_service_uuid(Some(uuid));
        Ok(())
    }

    /// Raw version reply captured at connect, if any
    pub async fn get_version_info(&self, name: &str) -> Result<Option<serde_json::Value>> {
        let record = self.record(name).await?;
        let info = record.read().await.version_info().cloned();
        Ok(info)
    }

    pub async fn get_device_capabilities(&self, name: &str) -> Result<Vec<String>> {
        let record = self.record(name).await?;
        let capabilities = record.read().await.capabilities().to_vec();
        Ok(capabilities)
    }
}
