//! Room automations
//!
//! Each room resolves its devices from the [`Home`] once at startup and
//! registers its rules with the trigger engine. Conditions and actions are
//! methods on the shared room, so rules in the same room can coordinate
//! through its flags.

mod bedroom;
mod main_room;
mod outside;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use ha_config::HouseConfig;
use ha_core::{Notification, STATE_OFF, STATE_UNAVAILABLE};
use ha_devices::{DeviceResult, DeviceSet, Home};
use ha_trigger_engine::{BoxError, ConditionOutcome, Payload, TriggerEngine, TriggerHandle};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use bedroom::Bedroom;
use main_room::MainRoom;
use outside::Outside;

/// Lights off for this long with no motion and the room powers down
pub const SAVE_POWER_DELAY: Duration = Duration::from_secs(15 * 60);

/// Button entities report this in `event_type` when pressed
const INITIAL_PRESS: &str = "initial_press";

const DEFAULT_COLOR_TEMP_KELVIN: u64 = 2500;
const DEFAULT_BRIGHTNESS: u64 = 255;

/// Reads the local wall-clock time; replaced in tests
pub type Clock = Arc<dyn Fn() -> NaiveTime + Send + Sync>;

pub fn local_clock() -> Clock {
    Arc::new(|| Local::now().time())
}

/// Warm, full-brightness light settings
pub fn default_light_settings() -> Map<String, Value> {
    let mut settings = Map::new();
    settings.insert("color_temp_kelvin".to_string(), json!(DEFAULT_COLOR_TEMP_KELVIN));
    settings.insert("brightness".to_string(), json!(DEFAULT_BRIGHTNESS));
    settings
}

/// Whether a button entity reported a fresh press
pub fn button_pressed(notification: &Notification) -> bool {
    notification.new_attribute_str("event_type") == Some(INITIAL_PRESS)
}

/// Whether lights are at the default settings
///
/// One light in a group may not report color temperature or brightness at
/// all, so a single mismatch is tolerated.
pub fn lights_are_bright(attributes: &[HashMap<String, Value>]) -> bool {
    let mismatches = |key: &str, expected: u64| {
        attributes
            .iter()
            .filter(|attrs| attrs.get(key).and_then(Value::as_u64) != Some(expected))
            .count()
    };

    mismatches("color_temp_kelvin", DEFAULT_COLOR_TEMP_KELVIN) <= 1
        && mismatches("brightness", DEFAULT_BRIGHTNESS) <= 1
}

/// Whether every light in the set is off or unavailable
async fn all_dark(lights: &DeviceSet) -> DeviceResult<bool> {
    Ok(lights
        .states()
        .await?
        .iter()
        .all(|state| state == STATE_OFF || state == STATE_UNAVAILABLE))
}

/// Register a rule whose condition and action are methods on a shared room
fn register_rule<R, C, CFut, O, A, AFut>(
    engine: &TriggerEngine,
    room: &Arc<R>,
    name: &str,
    condition: C,
    action: A,
    min_duration: Option<Duration>,
) -> TriggerHandle
where
    R: Send + Sync + 'static,
    C: Fn(Arc<R>, Payload) -> CFut + Send + Sync + 'static,
    CFut: Future<Output = Result<O, BoxError>> + Send + 'static,
    O: Into<ConditionOutcome> + Send + 'static,
    A: Fn(Arc<R>, Payload) -> AFut + Send + Sync + 'static,
    AFut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    let condition_room = Arc::clone(room);
    let action_room = Arc::clone(room);
    engine.register_named(
        name,
        move |payload| condition(Arc::clone(&condition_room), payload),
        move |payload| action(Arc::clone(&action_room), payload),
        min_duration,
    )
}

/// Resolve every room and register its rules
///
/// A room whose devices cannot be resolved is skipped so the others still run.
pub fn register_all(engine: &TriggerEngine, home: &Home, config: &HouseConfig) -> Vec<TriggerHandle> {
    let mut handles = Vec::new();

    match MainRoom::new(home) {
        Ok(room) => handles.extend(Arc::new(room).register(engine)),
        Err(e) => error!(room = "main room", error = %e, "Skipping room"),
    }

    match Bedroom::new(home, local_clock()) {
        Ok(room) => handles.extend(Arc::new(room).register(engine)),
        Err(e) => error!(room = "bedroom", error = %e, "Skipping room"),
    }

    if config.residents.is_empty() {
        warn!("No residents configured, presence rules disabled");
    } else {
        match Outside::new(home, &config.residents) {
            Ok(room) => handles.extend(Arc::new(room).register(engine)),
            Err(e) => error!(room = "outside", error = %e, "Skipping room"),
        }
    }

    info!(triggers = handles.len(), "Registered room automations");
    handles
}


#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(kelvin: Option<u64>, brightness: Option<u64>) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        if let Some(k) = kelvin {
            map.insert("color_temp_kelvin".to_string(), json!(k));
        }
        if let Some(b) = brightness {
            map.insert("brightness".to_string(), json!(b));
        }
        map
    }

    #[test]
    fn test_lights_are_bright_tolerates_one_mismatch() {
        let all = vec![attrs(Some(2500), Some(255)), attrs(Some(2500), Some(255))];
        assert!(lights_are_bright(&all));

        let one_plain = vec![attrs(Some(2500), Some(255)), attrs(None, None)];
        assert!(lights_are_bright(&one_plain));

        let two_dim = vec![attrs(Some(2500), Some(100)), attrs(Some(2500), Some(80))];
        assert!(!lights_are_bright(&two_dim));

        let two_cold = vec![attrs(Some(4000), Some(255)), attrs(None, Some(255))];
        assert!(!lights_are_bright(&two_cold));
    }

    #[test]
    fn test_no_lights_are_bright() {
        assert!(lights_are_bright(&[]));
    }

    #[test]
    fn test_button_pressed() {
        let pressed = test_support::press("event.bedroom_button_1");
        assert!(button_pressed(&pressed));

        let plain = test_support::change("event.bedroom_button_1", "a", "b");
        assert!(!button_pressed(&plain));
    }

    #[test]
    fn test_default_light_settings() {
        let settings = default_light_settings();
        assert_eq!(settings["color_temp_kelvin"], json!(2500));
        assert_eq!(settings["brightness"], json!(255));
    }
}
