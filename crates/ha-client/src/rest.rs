//! REST client for hub state reads and service calls

use std::time::Duration;

use ha_core::State;
use reqwest::{header, Client, StatusCode};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{RestError, RestResult};

/// Timeout applied to every REST request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for `http://<host>/api/`
#[derive(Clone)]
pub struct HassApi {
    client: Client,
    api_url: String,
    token: String,
}

impl HassApi {
    /// Create a client for a hub host such as `homeassistant.local:8123`
    pub fn new(host: &str, token: &str) -> RestResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_url: Self::api_url_for(host),
            token: token.to_string(),
        })
    }

    /// Base API URL for a host, with a trailing slash
    pub fn api_url_for(host: &str) -> String {
        let host = host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/api/", host)
        } else {
            format!("http://{}/api/", host)
        }
    }

    /// Base API URL of this client
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn get(&self, endpoint: &str) -> RestResult<Value> {
        let url = format!("{}{}", self.api_url, endpoint);
        debug!(endpoint, "GET");

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        Self::parse_response(endpoint, response).await
    }

    async fn post(&self, endpoint: &str, body: &Value) -> RestResult<Value> {
        let url = format!("{}{}", self.api_url, endpoint);
        debug!(endpoint, body = %body, "POST");

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(body)
            .send()
            .await?;

        Self::parse_response(endpoint, response).await
    }

    async fn parse_response(endpoint: &str, response: reqwest::Response) -> RestResult<Value> {
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Current state of one entity
    pub async fn states(&self, entity_id: &str) -> RestResult<State> {
        let value = self.get(&format!("states/{}", entity_id)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Call `<domain>.<service>` with arbitrary service data
    pub async fn call_service(&self, domain: &str, service: &str, data: &Value) -> RestResult<Value> {
        self.post(&format!("services/{}/{}", domain, service), data)
            .await
    }

    /// Call an entity service: `entity_id` plus any extra attributes
    async fn entity_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        attributes: &Map<String, Value>,
    ) -> RestResult<Value> {
        let mut body = Map::with_capacity(attributes.len() + 1);
        body.insert("entity_id".to_string(), Value::from(entity_id));
        for (key, value) in attributes {
            body.insert(key.clone(), value.clone());
        }
        self.call_service(domain, service, &Value::Object(body))
            .await
    }

    /// `turn_on` with optional attributes such as `brightness` or `hs_color`
    pub async fn turn_on(
        &self,
        entity_id: &str,
        domain: &str,
        attributes: &Map<String, Value>,
    ) -> RestResult<Value> {
        self.entity_service(domain, "turn_on", entity_id, attributes)
            .await
    }

    pub async fn turn_off(&self, entity_id: &str, domain: &str) -> RestResult<Value> {
        self.entity_service(domain, "turn_off", entity_id, &Map::new())
            .await
    }

    pub async fn toggle(
        &self,
        entity_id: &str,
        domain: &str,
        attributes: &Map<String, Value>,
    ) -> RestResult<Value> {
        self.entity_service(domain, "toggle", entity_id, attributes)
            .await
    }
}

impl std::fmt::Debug for HassApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HassApi")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_for() {
        assert_eq!(
            HassApi::api_url_for("homeassistant.local:8123"),
            "http://homeassistant.local:8123/api/"
        );
        assert_eq!(
            HassApi::api_url_for("https://hub.example.org/"),
            "https://hub.example.org/api/"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let api = HassApi::new("localhost:8123", "super-secret").unwrap();
        let debug = format!("{:?}", api);
        assert!(debug.contains("http://localhost:8123/api/"));
        assert!(!debug.contains("super-secret"));
    }
}
