//! In-memory hub for tests
//!
//! Keeps entity states in a map and applies `turn_on` / `turn_off` /
//! `toggle` to them, recording every service call.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use ha_client::RestError;
use ha_core::{State, STATE_OFF, STATE_ON};
use serde_json::{json, Map, Value};

use crate::api::HubApi;
use crate::error::DeviceResult;

/// A service call seen by [`MemoryHub`]
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: Value,
}

/// In-memory stand-in for the hub REST API
#[derive(Debug, Default)]
pub struct MemoryHub {
    states: Mutex<HashMap<String, State>>,
    calls: Mutex<Vec<ServiceCall>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an entity's state, keeping its attributes
    pub fn set_state(&self, entity_id: &str, value: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states
            .entry(entity_id.to_string())
            .or_insert_with(|| State::new(entity_id, value))
            .state = value.to_string();
    }

    pub fn set_attribute(&self, entity_id: &str, key: &str, value: Value) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states
            .entry(entity_id.to_string())
            .or_insert_with(|| State::new(entity_id, STATE_OFF))
            .attributes
            .insert(key.to_string(), value);
    }

    pub fn state_of(&self, entity_id: &str) -> Option<String> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .map(|s| s.state.clone())
    }

    /// Service calls recorded so far
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drain the recorded service calls
    pub fn take_calls(&self) -> Vec<ServiceCall> {
        std::mem::take(&mut *self.calls.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, domain: &str, service: &str, data: Value) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ServiceCall {
                domain: domain.to_string(),
                service: service.to_string(),
                data,
            });
    }

    fn apply(&self, entity_id: &str, value: Option<&str>, attributes: &Map<String, Value>) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(entity_id.to_string())
            .or_insert_with(|| State::new(entity_id, STATE_OFF));
        state.state = match value {
            Some(value) => value.to_string(),
            None if state.state == STATE_ON => STATE_OFF.to_string(),
            None => STATE_ON.to_string(),
        };
        for (key, value) in attributes {
            state.attributes.insert(key.clone(), value.clone());
        }
    }
}

fn entity_body(entity_id: &str, attributes: &Map<String, Value>) -> Value {
    let mut body = attributes.clone();
    body.insert("entity_id".to_string(), Value::from(entity_id));
    Value::Object(body)
}

#[async_trait]
impl HubApi for MemoryHub {
    async fn state(&self, entity_id: &str) -> DeviceResult<State> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .cloned()
            .ok_or_else(|| {
                RestError::Status {
                    endpoint: format!("states/{}", entity_id),
                    status: 404,
                    body: json!({"message": "Entity not found."}).to_string(),
                }
                .into()
            })
    }

    async fn turn_on(&self, entity_id: &str, domain: &str, attributes: &Map<String, Value>) -> DeviceResult<Value> {
        self.record(domain, "turn_on", entity_body(entity_id, attributes));
        self.apply(entity_id, Some(STATE_ON), attributes);
        Ok(json!([]))
    }

    async fn turn_off(&self, entity_id: &str, domain: &str) -> DeviceResult<Value> {
        self.record(domain, "turn_off", entity_body(entity_id, &Map::new()));
        self.apply(entity_id, Some(STATE_OFF), &Map::new());
        Ok(json!([]))
    }

    async fn toggle(&self, entity_id: &str, domain: &str, attributes: &Map<String, Value>) -> DeviceResult<Value> {
        self.record(domain, "toggle", entity_body(entity_id, attributes));
        self.apply(entity_id, None, attributes);
        Ok(json!([]))
    }

    async fn call_service(&self, domain: &str, service: &str, data: &Value) -> DeviceResult<Value> {
        self.record(domain, service, data.clone());
        Ok(json!([]))
    }
}
