//! Presence rules driven by the residents' trackers

use std::sync::Arc;

use ha_core::Notification;
use ha_devices::{DeviceResult, DeviceSet, Home};
use ha_trigger_engine::{BoxError, Payload, TriggerEngine, TriggerHandle};
use tracing::{info, warn};

use super::{default_light_settings, register_rule};

const HOME: &str = "home";
const AWAY: &str = "not_home";

pub struct Outside {
    trackers: Vec<DeviceSet>,
    living_room_lights: DeviceSet,
    kitchen_lights: DeviceSet,
    /// Everything switched off once nobody is home, in order
    power_down: Vec<DeviceSet>,
}

impl Outside {
    /// `residents` are entity id patterns selecting presence trackers
    pub fn new(home: &Home, residents: &[String]) -> DeviceResult<Self> {
        let devices = home.devices();
        let trackers: Vec<DeviceSet> = residents
            .iter()
            .map(|pattern| {
                let set = devices.entity_id(pattern);
                if set.is_empty() {
                    warn!(pattern = %pattern, "Resident pattern matches no tracker");
                }
                set
            })
            .collect();

        let living_room = devices.area("Living Room");
        let kitchen = devices.area("Kitchen");
        let bedroom = devices.area("Bedroom");

        Ok(Self {
            trackers,
            living_room_lights: living_room.kind("light"),
            kitchen_lights: kitchen.kind("light"),
            power_down: vec![
                living_room.kind("light"),
                living_room.kind("fan"),
                kitchen.kind("light"),
                living_room.name("Android TV"),
                bedroom.kind("light"),
                bedroom.kind("fan"),
                devices.area("Bathroom").kind("light"),
            ],
        })
    }

    pub fn register(self: Arc<Self>, engine: &TriggerEngine) -> Vec<TriggerHandle> {
        vec![
            register_rule(engine, &self, "outside.everyone_left", Self::everyone_left, Self::power_off_home, None),
            register_rule(
                engine,
                &self,
                "outside.coming_home",
                Self::someone_arrived,
                Self::power_on_main_room,
                None,
            ),
        ]
    }

    fn tracker_event<'a>(&self, payload: &'a Payload) -> Option<&'a Notification> {
        payload.as_deref().filter(|n| {
            self.trackers
                .iter()
                .flat_map(|set| set.devices())
                .any(|device| n.is_about(&device.entity_id))
        })
    }

    async fn anyone_home(&self) -> DeviceResult<bool> {
        for set in &self.trackers {
            if set.states().await?.iter().any(|state| state == HOME) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn everyone_left(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        let Some(n) = self.tracker_event(&payload) else {
            return Ok(None);
        };
        if self.anyone_home().await? {
            return Ok(Some(false));
        }
        Ok(Some(n.transitioned(HOME, AWAY)))
    }

    async fn power_off_home(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Turning off all home devices, everyone is gone");
        for set in &self.power_down {
            set.turn_off().await?;
        }
        Ok(())
    }

    async fn someone_arrived(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        Ok(self
            .tracker_event(&payload)
            .map(|n| n.transitioned(AWAY, HOME)))
    }

    async fn power_on_main_room(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Turning on main room lights, someone is home");
        let settings = default_light_settings();
        self.living_room_lights.turn_on(&settings).await?;
        self.kitchen_lights.turn_on(&settings).await?;
        Ok(())
    }
}
