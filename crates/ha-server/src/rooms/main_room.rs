//! Kitchen and living room rules

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ha_core::{STATE_OFF, STATE_ON};
use ha_devices::{DeviceResult, DeviceSet, Home};
use ha_trigger_engine::{BoxError, Payload, TriggerEngine, TriggerHandle};
use tracing::info;

use super::{
    all_dark, button_pressed, default_light_settings, lights_are_bright, register_rule,
    SAVE_POWER_DELAY,
};

pub struct MainRoom {
    motion: DeviceSet,
    power_button: DeviceSet,
    fan_button: DeviceSet,
    kitchen_lights: DeviceSet,
    living_room_lights: DeviceSet,
    fan: DeviceSet,
    projector: DeviceSet,
    /// Set while the projector is on
    suppress_motion: AtomicBool,
}

impl MainRoom {
    pub fn new(home: &Home) -> DeviceResult<Self> {
        let kitchen = home.devices().area("Kitchen");
        let living_room = home.devices().area("Living Room");

        Ok(Self {
            motion: kitchen.name("*Sensor Motion*").single()?,
            power_button: living_room.name("*Button 1*").single()?,
            fan_button: living_room.name("*Button 4*").single()?,
            kitchen_lights: kitchen.kind("light"),
            living_room_lights: living_room.kind("light"),
            fan: living_room.kind("fan").single()?,
            projector: living_room.name("Android TV").single()?,
            suppress_motion: AtomicBool::new(false),
        })
    }

    pub fn register(self: Arc<Self>, engine: &TriggerEngine) -> Vec<TriggerHandle> {
        vec![
            register_rule(
                engine,
                &self,
                "main_room.save_power",
                Self::no_motion,
                Self::power_off_lights,
                Some(SAVE_POWER_DELAY),
            ),
            register_rule(engine, &self, "main_room.motion", Self::motion_started, Self::power_on_lights, None),
            register_rule(
                engine,
                &self,
                "main_room.light_switch",
                Self::power_button_pressed,
                Self::toggle_lights,
                None,
            ),
            register_rule(engine, &self, "main_room.fan_switch", Self::fan_button_pressed, Self::toggle_fan, None),
            register_rule(
                engine,
                &self,
                "main_room.projector_mode",
                Self::projector_changed,
                Self::apply_projector_mode,
                None,
            ),
        ]
    }

    async fn lights_off(&self) -> DeviceResult<()> {
        self.kitchen_lights.turn_off().await?;
        self.living_room_lights.turn_off().await?;
        Ok(())
    }

    async fn lights_on(&self) -> DeviceResult<()> {
        let settings = default_light_settings();
        self.kitchen_lights.turn_on(&settings).await?;
        self.living_room_lights.turn_on(&settings).await?;
        Ok(())
    }

    async fn no_motion(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        if payload.is_some() {
            return Ok(None);
        }
        if self.suppress_motion.load(Ordering::SeqCst) {
            return Ok(Some(false));
        }
        Ok(Some(self.motion.state().await? == STATE_OFF))
    }

    async fn power_off_lights(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Saving power in the living room");
        self.lights_off().await?;
        Ok(())
    }

    async fn motion_started(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        let Some(n) = payload.as_deref().filter(|n| self.motion.matches(Some(*n))) else {
            return Ok(None);
        };
        if self.suppress_motion.load(Ordering::SeqCst) {
            return Ok(Some(false));
        }
        if !n.transitioned(STATE_OFF, STATE_ON) {
            return Ok(Some(false));
        }
        Ok(Some(
            all_dark(&self.kitchen_lights).await? && all_dark(&self.living_room_lights).await?,
        ))
    }

    async fn power_on_lights(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Turning on living room lights due to motion");
        self.lights_on().await?;
        Ok(())
    }

    async fn power_button_pressed(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        Ok(payload
            .as_deref()
            .filter(|n| self.power_button.matches(Some(*n)))
            .map(button_pressed))
    }

    async fn toggle_lights(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        let bright = lights_are_bright(&self.kitchen_lights.attributes().await?)
            && lights_are_bright(&self.living_room_lights.attributes().await?);
        if bright {
            info!("Turning off lights from the light switch");
            self.lights_off().await?;
        } else {
            info!("Turning on lights from the light switch");
            self.lights_on().await?;
        }
        Ok(())
    }

    async fn fan_button_pressed(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        Ok(payload
            .as_deref()
            .filter(|n| self.fan_button.matches(Some(*n)))
            .map(button_pressed))
    }

    async fn toggle_fan(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Toggling the living room fan from the light switch");
        self.fan.toggle(&Default::default()).await?;
        Ok(())
    }

    async fn projector_changed(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        Ok(payload
            .as_deref()
            .filter(|n| self.projector.matches(Some(*n)))
            .map(|n| n.old_value() != n.new_value()))
    }

    async fn apply_projector_mode(self: Arc<Self>, payload: Payload) -> Result<(), BoxError> {
        let on = payload.as_deref().and_then(|n| n.new_value()) == Some(STATE_ON);
        self.suppress_motion.store(on, Ordering::SeqCst);
        if on {
            info!("Enabling projector mode");
            self.lights_off().await?;
        } else {
            info!("Disabling projector mode");
            self.lights_on().await?;
        }
        Ok(())
    }
}
