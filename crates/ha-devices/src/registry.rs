//! Registry listings fetched from the hub
//!
//! Only the fields needed to build the device table are decoded; the hub
//! sends many more, which are ignored.

use ha_client::HubConnection;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{DeviceError, DeviceResult};

/// Entity category hidden from the device table
pub const CATEGORY_CONFIG: &str = "config";

/// Device model used by hubs for room aggregates, which would duplicate devices
pub const MODEL_ROOM: &str = "Room";

/// Entry of `config/area_registry/list`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AreaEntry {
    pub area_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of `config/device_registry/list`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of `config/entity_registry/list`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntityEntry {
    pub entity_id: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    /// User-set name
    #[serde(default)]
    pub name: Option<String>,
    /// Integration-provided name
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub entity_category: Option<String>,
    #[serde(default)]
    pub hidden_by: Option<String>,
    #[serde(default)]
    pub disabled_by: Option<String>,
}

impl EntityEntry {
    /// Config entities, and entities hidden or disabled in the hub, are skipped
    pub fn is_listed(&self) -> bool {
        self.entity_category.as_deref() != Some(CATEGORY_CONFIG)
            && self.hidden_by.is_none()
            && self.disabled_by.is_none()
    }
}

/// The three registries, as fetched together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub areas: Vec<AreaEntry>,
    pub devices: Vec<DeviceEntry>,
    pub entities: Vec<EntityEntry>,
}

impl RegistrySnapshot {
    /// Fetch area, device and entity registries over one connection
    pub async fn fetch(hub: &mut HubConnection) -> DeviceResult<Self> {
        let areas = hub.call("config/area_registry/list").await?;
        let devices = hub.call("config/device_registry/list").await?;
        let entities = hub.call("config/entity_registry/list").await?;

        let snapshot = Self::from_values(areas, devices, entities)?;
        info!(
            areas = snapshot.areas.len(),
            devices = snapshot.devices.len(),
            entities = snapshot.entities.len(),
            "Fetched hub registries"
        );
        Ok(snapshot)
    }

    /// Decode raw registry listings
    pub fn from_values(areas: Value, devices: Value, entities: Value) -> DeviceResult<Self> {
        Ok(Self {
            areas: decode("area", areas)?,
            devices: decode("device", devices)?,
            entities: decode("entity", entities)?,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(registry: &'static str, value: Value) -> DeviceResult<Vec<T>> {
    serde_json::from_value(value).map_err(|source| DeviceError::Registry { registry, source })
}
