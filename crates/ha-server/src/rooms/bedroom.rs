//! Bedroom rules

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use ha_core::{STATE_OFF, STATE_ON};
use ha_devices::{DeviceResult, DeviceSet, Home};
use ha_trigger_engine::{BoxError, Payload, TriggerEngine, TriggerHandle};
use tracing::{debug, info};

use super::{
    all_dark, button_pressed, default_light_settings, lights_are_bright, register_rule, Clock,
    SAVE_POWER_DELAY,
};

/// Entity the gesture classifier reports hands under
pub const HAND_ENTITY: &str = "hand.bedroom";

const TEMPERATURE_HOLD: Duration = Duration::from_secs(60);
const DAY_RESET_HOLD: Duration = Duration::from_secs(30);

const NIGHT_LOW: f64 = 72.0;
const NIGHT_HIGH: f64 = 74.0;

pub struct Bedroom {
    motion: DeviceSet,
    power_button: DeviceSet,
    fan_button: DeviceSet,
    closet_button: DeviceSet,
    closet_light: DeviceSet,
    lights: DeviceSet,
    fan: DeviceSet,
    temperature: DeviceSet,
    assistant: DeviceSet,
    /// Set when the lights were switched off by hand, so motion leaves them off
    suppress_motion: AtomicBool,
    clock: Clock,
}

/// 20:30 through 08:30, exclusive at both ends
fn is_night(time: NaiveTime) -> bool {
    time > hm(20, 30) || time < hm(8, 30)
}

/// 08:45 through 09:00, exclusive at both ends
fn is_day_reset_window(time: NaiveTime) -> bool {
    time > hm(8, 45) && time < hm(9, 0)
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Bedroom {
    pub fn new(home: &Home, clock: Clock) -> DeviceResult<Self> {
        let bedroom = home.devices().area("Bedroom");
        let closet = home.devices().area("Closet");

        Ok(Self {
            motion: bedroom.name("*Sensor Motion*").single()?,
            power_button: bedroom.name("*Button 1*").single()?,
            fan_button: bedroom.name("*Button 4*").single()?,
            closet_button: closet.name("*Button 1*").single()?,
            closet_light: closet.kind("light").single()?,
            lights: bedroom.kind("light"),
            fan: bedroom.kind("fan").single()?,
            temperature: bedroom.name("*Sensor Temperature*").single()?,
            assistant: home.devices(),
            suppress_motion: AtomicBool::new(false),
            clock,
        })
    }

    pub fn register(self: Arc<Self>, engine: &TriggerEngine) -> Vec<TriggerHandle> {
        vec![
            register_rule(engine, &self, "bedroom.show_hands", Self::hand_seen, Self::log_hand, None),
            register_rule(
                engine,
                &self,
                "bedroom.save_power",
                Self::no_motion,
                Self::power_off_lights,
                Some(SAVE_POWER_DELAY),
            ),
            register_rule(engine, &self, "bedroom.motion", Self::motion_started, Self::power_on_lights, None),
            register_rule(
                engine,
                &self,
                "bedroom.light_switch",
                Self::power_button_pressed,
                Self::toggle_lights,
                None,
            ),
            register_rule(engine, &self, "bedroom.fan_switch", Self::fan_button_pressed, Self::toggle_fan, None),
            register_rule(
                engine,
                &self,
                "bedroom.closet_switch",
                Self::closet_button_pressed,
                Self::toggle_closet_light,
                None,
            ),
            register_rule(
                engine,
                &self,
                "bedroom.night_too_cold",
                Self::too_cold_at_night,
                Self::raise_temperature,
                Some(TEMPERATURE_HOLD),
            ),
            register_rule(
                engine,
                &self,
                "bedroom.night_too_warm",
                Self::too_warm_at_night,
                Self::lower_temperature,
                Some(TEMPERATURE_HOLD),
            ),
            register_rule(
                engine,
                &self,
                "bedroom.day_temperature",
                Self::morning_reset_due,
                Self::reset_temperature,
                Some(DAY_RESET_HOLD),
            ),
        ]
    }

    fn motion_suppressed(&self) -> bool {
        self.suppress_motion.load(Ordering::SeqCst)
    }

    async fn temperature(&self) -> Result<f64, BoxError> {
        let raw = self.temperature.state().await?;
        debug!(temperature = %raw, "Bedroom temperature");
        raw.trim()
            .parse::<f64>()
            .map_err(|_| format!("bedroom temperature {:?} is not a number", raw).into())
    }

    // --- Hand gestures ---

    async fn hand_seen(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        Ok(match payload {
            Some(n) if n.is_about(HAND_ENTITY) => Some(true),
            _ => None,
        })
    }

    async fn log_hand(self: Arc<Self>, payload: Payload) -> Result<(), BoxError> {
        let gesture = payload.as_deref().and_then(|n| n.message()).unwrap_or_default();
        info!(gesture, "Found a hand");
        Ok(())
    }

    // --- Save power ---

    async fn no_motion(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        if payload.is_some() {
            return Ok(None);
        }
        if self.motion_suppressed() {
            return Ok(Some(false));
        }
        Ok(Some(self.motion.state().await? == STATE_OFF))
    }

    async fn power_off_lights(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Saving bedroom power");
        self.lights.turn_off().await?;
        Ok(())
    }

    // --- Motion lights ---

    async fn motion_started(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        let Some(n) = payload.as_deref().filter(|n| self.motion.matches(Some(*n))) else {
            return Ok(None);
        };
        if self.motion_suppressed() {
            return Ok(Some(false));
        }
        Ok(Some(n.transitioned(STATE_OFF, STATE_ON) && all_dark(&self.lights).await?))
    }

    async fn power_on_lights(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Powering on bedroom lights due to motion");
        self.lights.turn_on(&default_light_settings()).await?;
        Ok(())
    }

    // --- Switches ---

    async fn power_button_pressed(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        Ok(payload
            .as_deref()
            .filter(|n| self.power_button.matches(Some(*n)))
            .map(button_pressed))
    }

    async fn toggle_lights(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        let attributes = self.lights.attributes().await?;
        if lights_are_bright(&attributes) {
            info!("Turning off bedroom lights from light switch");
            self.lights.turn_off().await?;
            self.suppress_motion.store(true, Ordering::SeqCst);
        } else {
            info!("Turning on bedroom lights from light switch");
            self.lights.turn_on(&default_light_settings()).await?;
            self.suppress_motion.store(false, Ordering::SeqCst);
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
        info!("Toggling bedroom fan from light switch");
        self.fan.toggle(&Default::default()).await?;
        Ok(())
    }

    async fn closet_button_pressed(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        Ok(payload
            .as_deref()
            .filter(|n| self.closet_button.matches(Some(*n)))
            .map(button_pressed))
    }

    async fn toggle_closet_light(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Toggling closet light from light switch");
        self.closet_light.toggle(&Default::default()).await?;
        Ok(())
    }

    // --- Temperature ---

    async fn too_cold_at_night(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        if payload.is_some() {
            return Ok(None);
        }
        if !is_night((self.clock)()) {
            return Ok(Some(false));
        }
        Ok(Some(self.temperature().await? < NIGHT_LOW))
    }

    async fn raise_temperature(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Raising the bedroom temperature to 80");
        self.assistant
            .send_assistant_command("Set the thermostat to 80 degrees")
            .await?;
        Ok(())
    }

    async fn too_warm_at_night(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        if payload.is_some() {
            return Ok(None);
        }
        if !is_night((self.clock)()) {
            return Ok(Some(false));
        }
        Ok(Some(self.temperature().await? > NIGHT_HIGH))
    }

    async fn lower_temperature(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Lowering the bedroom temperature to 65");
        self.assistant
            .send_assistant_command("Set the thermostat to 65 degrees")
            .await?;
        Ok(())
    }

    async fn morning_reset_due(self: Arc<Self>, payload: Payload) -> Result<Option<bool>, BoxError> {
        if payload.is_some() {
            return Ok(None);
        }
        Ok(Some(is_day_reset_window((self.clock)())))
    }

    async fn reset_temperature(self: Arc<Self>, _payload: Payload) -> Result<(), BoxError> {
        info!("Resetting the temperature to 76");
        self.assistant
            .send_assistant_command("Set the thermostat to 76 degrees")
            .await?;
        Ok(())
    }
}
