//! Device table
//!
//! One row per listed entity, carrying the human-facing name and area that
//! automations filter on.

use std::collections::HashMap;
use std::fmt;

use ha_core::EntityId;
use serde::Serialize;
use tracing::debug;

use crate::registry::{RegistrySnapshot, MODEL_ROOM};

/// Marker some integrations leave in `name` instead of clearing it
const DEPRECATED_MARKER: &str = "DEPRECATED";

/// A controllable or observable entity, with its area resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub entity_id: String,
    /// Display name with any leading area name stripped
    pub name: Option<String>,
    pub area_id: Option<String>,
    /// Area display name
    pub area: Option<String>,
    /// Entity domain (`light`, `fan`, ...), used for service calls
    pub kind: Option<String>,
}

/// Device fields available to filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    EntityId,
    Name,
    AreaId,
    Area,
    Kind,
}

impl Device {
    pub fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::EntityId => Some(self.entity_id.as_str()),
            Field::Name => self.name.as_deref(),
            Field::AreaId => self.area_id.as_deref(),
            Field::Area => self.area.as_deref(),
            Field::Kind => self.kind.as_deref(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::EntityId => "entity_id",
            Field::Name => "name",
            Field::AreaId => "area_id",
            Field::Area => "area",
            Field::Kind => "kind",
        };
        f.write_str(name)
    }
}

/// Build the device table from registry listings
///
/// Entities that are config-only, hidden, disabled, or attached to a room
/// aggregate device are skipped. The area comes from the device when the
/// entity has one, else from the entity itself.
pub fn build_devices(snapshot: &RegistrySnapshot) -> Vec<Device> {
    let area_names: HashMap<&str, &str> = snapshot
        .areas
        .iter()
        .map(|area| (area.area_id.as_str(), area.name.as_deref().unwrap_or("Unknown")))
        .collect();
    let devices: HashMap<&str, _> = snapshot
        .devices
        .iter()
        .map(|device| (device.id.as_str(), device))
        .collect();

    let mut table = Vec::new();

    for entity in &snapshot.entities {
        if !entity.is_listed() {
            continue;
        }

        let device = entity
            .device_id
            .as_deref()
            .and_then(|id| devices.get(id).copied());

        if device.is_some_and(|d| d.model.as_deref() == Some(MODEL_ROOM)) {
            debug!(entity_id = %entity.entity_id, "Skipping room aggregate entity");
            continue;
        }

        let area_id = match device {
            Some(device) => device.area_id.clone(),
            None => entity.area_id.clone(),
        };
        let area = area_id
            .as_deref()
            .and_then(|id| area_names.get(id))
            .map(|name| name.to_string());

        let mut name = entity.name.clone().or_else(|| entity.original_name.clone());
        if name.as_deref().is_some_and(|n| n.contains(DEPRECATED_MARKER)) {
            name = entity.original_name.clone();
        }
        if let (Some(display), Some(area)) = (name.as_deref(), area.as_deref()) {
            name = Some(strip_area_prefix(display, area).to_string());
        }

        let kind = match entity.entity_id.parse::<EntityId>() {
            Ok(id) => Some(id.domain().to_string()),
            Err(e) => {
                debug!(error = %e, "Entity has no usable domain");
                None
            }
        };

        table.push(Device {
            entity_id: entity.entity_id.clone(),
            name,
            area_id,
            area,
            kind,
        });
    }

    table
}

/// Remove a leading area name: `Kitchen Ceiling Light` in `Kitchen` is `Ceiling Light`
pub fn strip_area_prefix<'a>(name: &'a str, area: &str) -> &'a str {
    match name.strip_prefix(area) {
        Some(rest) => rest.trim(),
        None => name,
    }
}
