//! Hub operations used by device sets

use async_trait::async_trait;
use ha_client::HassApi;
use ha_core::State;
use serde_json::{Map, Value};

use crate::error::DeviceResult;

/// State reads and service calls against the hub
///
/// Implemented by the REST client; tests substitute an in-memory hub.
#[async_trait]
pub trait HubApi: Send + Sync {
    async fn state(&self, entity_id: &str) -> DeviceResult<State>;

    async fn turn_on(&self, entity_id: &str, domain: &str, attributes: &Map<String, Value>) -> DeviceResult<Value>;

    async fn turn_off(&self, entity_id: &str, domain: &str) -> DeviceResult<Value>;

    async fn toggle(&self, entity_id: &str, domain: &str, attributes: &Map<String, Value>) -> DeviceResult<Value>;

    async fn call_service(&self, domain: &str, service: &str, data: &Value) -> DeviceResult<Value>;
}

#[async_trait]
impl HubApi for HassApi {
    async fn state(&self, entity_id: &str) -> DeviceResult<State> {
        Ok(self.states(entity_id).await?)
    }

    async fn turn_on(&self, entity_id: &str, domain: &str, attributes: &Map<String, Value>) -> DeviceResult<Value> {
        Ok(HassApi::turn_on(self, entity_id, domain, attributes).await?)
    }

    async fn turn_off(&self, entity_id: &str, domain: &str) -> DeviceResult<Value> {
        Ok(HassApi::turn_off(self, entity_id, domain).await?)
    }

    async fn toggle(&self, entity_id: &str, domain: &str, attributes: &Map<String, Value>) -> DeviceResult<Value> {
        Ok(HassApi::toggle(self, entity_id, domain, attributes).await?)
    }

    async fn call_service(&self, domain: &str, service: &str, data: &Value) -> DeviceResult<Value> {
        Ok(HassApi::call_service(self, domain, service, data).await?)
    }
}
