//! The household as seen by automations

use std::sync::Arc;

use ha_client::{HassApi, HubConnection};
use tracing::{info, warn};

use crate::api::HubApi;
use crate::device::{build_devices, Device};
use crate::error::DeviceResult;
use crate::registry::RegistrySnapshot;
use crate::set::DeviceSet;

/// Device table plus the hub API used to act on it
#[derive(Clone)]
pub struct Home {
    devices: Vec<Device>,
    api: Arc<dyn HubApi>,
}

impl Home {
    /// Fetch the registries and build the device table
    ///
    /// Opens a short-lived WebSocket for the registry listings; commands go
    /// through the REST API afterwards.
    pub async fn connect(host: &str, token: &str) -> DeviceResult<Self> {
        let mut hub = HubConnection::connect(host, token).await?;
        let snapshot = RegistrySnapshot::fetch(&mut hub).await?;
        if let Err(e) = hub.close().await {
            warn!(error = %e, "Failed to close registry connection");
        }

        let api = HassApi::new(host, token)?;
        Ok(Self::from_snapshot(&snapshot, Arc::new(api)))
    }

    /// Build from registry listings already in hand
    pub fn from_snapshot(snapshot: &RegistrySnapshot, api: Arc<dyn HubApi>) -> Self {
        let devices = build_devices(snapshot);
        info!(devices = devices.len(), "Built device table");
        Self { devices, api }
    }

    pub fn from_devices(devices: Vec<Device>, api: Arc<dyn HubApi>) -> Self {
        Self { devices, api }
    }

    /// Every device in the home
    pub fn devices(&self) -> DeviceSet {
        DeviceSet::new(self.devices.clone(), self.api.clone())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl std::fmt::Debug for Home {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Home")
            .field("devices", &self.devices.len())
            .finish_non_exhaustive()
    }
}
