//! Device sets: filtered views of the device table with bulk commands

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ha_core::{Notification, STATE_ON};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::api::HubApi;
use crate::device::{Device, Field};
use crate::error::{DeviceError, DeviceResult};
use crate::pattern::Pattern;

/// Service used to relay free-text commands to a voice assistant
pub const ASSISTANT_DOMAIN: &str = "google_assistant_sdk";
pub const ASSISTANT_SERVICE: &str = "send_text_command";

/// An ordered selection of devices bound to a hub
///
/// Filtering is cheap and never touches the hub. Reads and commands go to
/// every device in the set, in order, and stop at the first failure.
#[derive(Clone)]
pub struct DeviceSet {
    devices: Vec<Device>,
    api: Arc<dyn HubApi>,
}

impl DeviceSet {
    pub fn new(devices: Vec<Device>, api: Arc<dyn HubApi>) -> Self {
        Self { devices, api }
    }

    // --- Filtering ---

    /// Keep devices whose `field` matches a wildcard pattern
    pub fn filter(&self, field: Field, pattern: impl Into<Pattern>) -> Self {
        let pattern = pattern.into();
        let devices: Vec<Device> = self
            .devices
            .iter()
            .filter(|device| pattern.matches(device.field(field)))
            .cloned()
            .collect();

        debug!(%field, %pattern, before = self.devices.len(), after = devices.len(), "Filtered devices");

        Self {
            devices,
            api: self.api.clone(),
        }
    }

    pub fn area(&self, pattern: &str) -> Self {
        self.filter(Field::Area, pattern)
    }

    pub fn name(&self, pattern: &str) -> Self {
        self.filter(Field::Name, pattern)
    }

    pub fn kind(&self, pattern: &str) -> Self {
        self.filter(Field::Kind, pattern)
    }

    pub fn entity_id(&self, pattern: &str) -> Self {
        self.filter(Field::EntityId, pattern)
    }

    /// Require exactly one device
    pub fn single(self) -> DeviceResult<Self> {
        match self.devices.len() {
            1 => Ok(self),
            n => Err(DeviceError::NotSingle(n)),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn entity_ids(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.entity_id.as_str()).collect()
    }

    /// Whether a notification is about this set's device
    ///
    /// True only for a non-empty set whose every device is the notification's
    /// subject, which in practice means a single-device set.
    pub fn matches(&self, notification: Option<&Notification>) -> bool {
        let Some(notification) = notification else {
            return false;
        };

        !self.devices.is_empty()
            && self
                .devices
                .iter()
                .all(|device| notification.is_about(&device.entity_id))
    }

    // --- Reads ---

    /// Current state value of each device
    pub async fn states(&self) -> DeviceResult<Vec<String>> {
        let mut states = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            states.push(self.api.state(&device.entity_id).await?.state);
        }
        Ok(states)
    }

    /// State value of the only device in the set
    pub async fn state(&self) -> DeviceResult<String> {
        let device = self.only()?;
        Ok(self.api.state(&device.entity_id).await?.state)
    }

    /// Current attributes of each device
    pub async fn attributes(&self) -> DeviceResult<Vec<HashMap<String, Value>>> {
        let mut attributes = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            attributes.push(self.api.state(&device.entity_id).await?.attributes);
        }
        Ok(attributes)
    }

    // --- Commands ---

    /// Turn every device on with the given attributes
    pub async fn turn_on(&self, attributes: &Map<String, Value>) -> DeviceResult<Vec<Value>> {
        info!(entities = ?self.entity_ids(), "Turning on");
        let mut responses = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            let domain = domain_of(device)?;
            responses.push(self.api.turn_on(&device.entity_id, domain, attributes).await?);
        }
        Ok(responses)
    }

    /// Apply attributes to devices that are currently on, leaving the rest off
    pub async fn set_attributes(&self, attributes: &Map<String, Value>) -> DeviceResult<Vec<Value>> {
        let states = self.states().await?;
        let mut responses = Vec::with_capacity(self.devices.len());
        for (device, state) in self.devices.iter().zip(states) {
            if state == STATE_ON {
                let domain = domain_of(device)?;
                responses.push(self.api.turn_on(&device.entity_id, domain, attributes).await?);
            } else {
                responses.push(json!({"state": state}));
            }
        }
        Ok(responses)
    }

    pub async fn turn_off(&self) -> DeviceResult<Vec<Value>> {
        info!(entities = ?self.entity_ids(), "Turning off");
        let mut responses = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            let domain = domain_of(device)?;
            responses.push(self.api.turn_off(&device.entity_id, domain).await?);
        }
        Ok(responses)
    }

    pub async fn toggle(&self, attributes: &Map<String, Value>) -> DeviceResult<Vec<Value>> {
        info!(entities = ?self.entity_ids(), "Toggling");
        let mut responses = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            let domain = domain_of(device)?;
            responses.push(self.api.toggle(&device.entity_id, domain, attributes).await?);
        }
        Ok(responses)
    }

    /// Relay a free-text command to the voice assistant integration
    pub async fn send_assistant_command(&self, command: &str) -> DeviceResult<Value> {
        info!(command, "Sending assistant command");
        self.api
            .call_service(ASSISTANT_DOMAIN, ASSISTANT_SERVICE, &json!({"command": command}))
            .await
    }

    fn only(&self) -> DeviceResult<&Device> {
        match self.devices.as_slice() {
            [device] => Ok(device),
            other => Err(DeviceError::NotSingle(other.len())),
        }
    }
}

fn domain_of(device: &Device) -> DeviceResult<&str> {
    device
        .kind
        .as_deref()
        .ok_or_else(|| DeviceError::NoDomain(device.entity_id.clone()))
}

impl fmt::Debug for DeviceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSet")
            .field("devices", &self.entity_ids())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryHub;

    fn device(entity_id: &str, name: &str, area: &str) -> Device {
        Device {
            entity_id: entity_id.to_string(),
            name: Some(name.to_string()),
            area_id: Some(area.to_lowercase()),
            area: Some(area.to_string()),
            kind: entity_id.split_once('.').map(|(d, _)| d.to_string()),
        }
    }

    fn bedroom(hub: Arc<MemoryHub>) -> DeviceSet {
        DeviceSet::new(
            vec![
                device("light.bedroom_lamp", "Lamp", "Bedroom"),
                device("light.bedroom_ceiling", "Ceiling", "Bedroom"),
                device("fan.bedroom", "Ceiling Fan", "Bedroom"),
                device("binary_sensor.bedroom_motion", "Hallway Sensor Motion", "Bedroom"),
                device("light.closet", "Light", "Closet"),
            ],
            hub,
        )
    }

    fn brightness(value: u64) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("brightness".to_string(), json!(value));
        attributes
    }

    #[test]
    fn test_filters_chain() {
        let set = bedroom(Arc::new(MemoryHub::new()));
        assert_eq!(set.area("Bedroom").kind("light").len(), 2);
        assert_eq!(set.area("Closet").kind("light").entity_ids(), vec!["light.closet"]);
        assert_eq!(set.name("*Sensor Motion*").len(), 1);
        assert_eq!(set.entity_id("light.*").len(), 3);
        assert!(set.area("Garage").is_empty());
    }

    #[test]
    fn test_single() {
        let set = bedroom(Arc::new(MemoryHub::new()));
        assert!(set.kind("fan").single().is_ok());
        assert!(matches!(set.kind("light").single(), Err(DeviceError::NotSingle(3))));
        assert!(matches!(set.kind("switch").single(), Err(DeviceError::NotSingle(0))));
    }

    #[test]
    fn test_matches() {
        let set = bedroom(Arc::new(MemoryHub::new()));
        let fan = set.kind("fan");
        let about_fan = Notification::synthetic("fan.bedroom");
        let about_lamp = Notification::synthetic("light.bedroom_lamp");

        assert!(fan.matches(Some(&about_fan)));
        assert!(!fan.matches(Some(&about_lamp)));
        assert!(!fan.matches(None));
        assert!(!set.kind("light").matches(Some(&about_lamp)));
        assert!(!set.kind("switch").matches(Some(&about_fan)));
    }

    #[tokio::test]
    async fn test_reads() {
        let hub = Arc::new(MemoryHub::new());
        hub.set_state("light.bedroom_lamp", "on");
        hub.set_attribute("light.bedroom_lamp", "brightness", json!(255));
        hub.set_state("light.bedroom_ceiling", "unavailable");
        hub.set_state("light.closet", "off");

        let lights = bedroom(hub).kind("light");
        assert_eq!(
            lights.states().await.unwrap(),
            vec!["on", "unavailable", "off"]
        );
        let attributes = lights.attributes().await.unwrap();
        assert_eq!(attributes[0].get("brightness"), Some(&json!(255)));
        assert!(lights.state().await.is_err());
    }

    #[test]
    fn test_missing_entity_is_an_error() {
        let set = bedroom(Arc::new(MemoryHub::new()));
        let err = tokio_test::block_on(set.kind("fan").state()).unwrap_err();
        assert!(matches!(err, DeviceError::Rest(_)));
    }

    #[tokio::test]
    async fn test_commands_use_entity_domain() {
        let hub = Arc::new(MemoryHub::new());
        let set = bedroom(hub.clone());

        set.area("Bedroom").kind("light").turn_on(&brightness(255)).await.unwrap();
        set.kind("fan").toggle(&Map::new()).await.unwrap();
        set.area("Closet").turn_off().await.unwrap();

        let calls = hub.take_calls();
        let summary: Vec<(&str, &str, Value)> = calls
            .iter()
            .map(|c| (c.domain.as_str(), c.service.as_str(), c.data.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("light", "turn_on", json!({"entity_id": "light.bedroom_lamp", "brightness": 255})),
                ("light", "turn_on", json!({"entity_id": "light.bedroom_ceiling", "brightness": 255})),
                ("fan", "toggle", json!({"entity_id": "fan.bedroom"})),
                ("light", "turn_off", json!({"entity_id": "light.closet"})),
            ]
        );
        assert_eq!(hub.state_of("fan.bedroom").as_deref(), Some("on"));
    }

    #[tokio::test]
    async fn test_set_attributes_only_touches_devices_that_are_on() {
        let hub = Arc::new(MemoryHub::new());
        hub.set_state("light.bedroom_lamp", "on");
        hub.set_state("light.bedroom_ceiling", "off");

        let lights = bedroom(hub.clone()).area("Bedroom").kind("light");
        let responses = lights.set_attributes(&brightness(10)).await.unwrap();
        assert_eq!(responses[1], json!({"state": "off"}));

        let calls = hub.take_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].data["entity_id"], "light.bedroom_lamp");
        assert_eq!(hub.state_of("light.bedroom_ceiling").as_deref(), Some("off"));
    }

    #[tokio::test]
    async fn test_device_without_domain() {
        let hub = Arc::new(MemoryHub::new());
        let set = DeviceSet::new(
            vec![Device {
                entity_id: "weird".into(),
                name: None,
                area_id: None,
                area: None,
                kind: None,
            }],
            hub,
        );
        assert!(matches!(set.turn_off().await, Err(DeviceError::NoDomain(id)) if id == "weird"));
    }

    #[tokio::test]
    async fn test_assistant_command() {
        let hub = Arc::new(MemoryHub::new());
        let set = bedroom(hub.clone());
        set.send_assistant_command("Set the thermostat to 80 degrees")
            .await
            .unwrap();

        let calls = hub.calls();
        assert_eq!(calls[0].domain, ASSISTANT_DOMAIN);
        assert_eq!(calls[0].service, ASSISTANT_SERVICE);
        assert_eq!(calls[0].data, json!({"command": "Set the thermostat to 80 degrees"}));
    }

    #[test]
    fn test_debug_lists_entities() {
        let set = bedroom(Arc::new(MemoryHub::new())).kind("fan");
        assert_eq!(format!("{:?}", set), "DeviceSet { devices: [\"fan.bedroom\"], .. }");
    }
}
