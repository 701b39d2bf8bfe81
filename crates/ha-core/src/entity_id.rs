//! Entity ID type representing a domain.object_id pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id '{0}' must contain exactly one '.' separator")]
    InvalidFormat(String),

    #[error("entity_id '{0}' has an empty domain or object_id")]
    EmptyPart(String),

    #[error("entity_id '{0}' must be lowercase alphanumeric with underscores")]
    InvalidChars(String),
}

/// A hub entity ID such as `light.bedroom_ceiling`
///
/// The domain doubles as the device kind when commanding the hub: the REST
/// service path for `fan.bedroom` is `services/fan/<service>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    /// Create a new EntityId from domain and object_id parts
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();
        let full = format!("{}.{}", domain, object_id);

        if domain.is_empty() || object_id.is_empty() {
            return Err(EntityIdError::EmptyPart(full));
        }
        if !is_valid_part(&domain) || domain.contains("__") || !is_valid_part(&object_id) {
            return Err(EntityIdError::InvalidChars(full));
        }

        Ok(Self { domain, object_id })
    }

    /// The domain part, e.g. `light`
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The object_id part, e.g. `bedroom_ceiling`
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Compare against a raw entity id string without allocating
    pub fn matches(&self, raw: &str) -> bool {
        raw.split_once('.')
            .map(|(domain, object_id)| domain == self.domain && object_id == self.object_id)
            .unwrap_or(false)
    }
}

/// Lowercase alphanumeric plus underscores, not starting or ending with `_`
fn is_valid_part(s: &str) -> bool {
    !s.starts_with('_')
        && !s.ends_with('_')
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !object_id.contains('.') => Self::new(domain, object_id),
            _ => Err(EntityIdError::InvalidFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_id() {
        let id: EntityId = "binary_sensor.bedroom_sensor_motion".parse().unwrap();
        assert_eq!(id.domain(), "binary_sensor");
        assert_eq!(id.object_id(), "bedroom_sensor_motion");
        assert_eq!(id.to_string(), "binary_sensor.bedroom_sensor_motion");
    }

    #[test]
    fn test_invalid_format() {
        assert!(matches!(
            "no_separator".parse::<EntityId>(),
            Err(EntityIdError::InvalidFormat(_))
        ));
        assert!(matches!(
            "too.many.parts".parse::<EntityId>(),
            Err(EntityIdError::InvalidFormat(_))
        ));
        assert!(matches!(
            ".object".parse::<EntityId>(),
            Err(EntityIdError::EmptyPart(_))
        ));
    }

    #[test]
    fn test_invalid_chars() {
        for raw in ["Light.room", "light.Room", "_light.room", "light.room_", "my__light.room"] {
            assert!(
                matches!(raw.parse::<EntityId>(), Err(EntityIdError::InvalidChars(_))),
                "{raw} should be rejected"
            );
        }
        assert!("light.my__room".parse::<EntityId>().is_ok());
    }

    #[test]
    fn test_matches_raw() {
        let id: EntityId = "fan.bedroom".parse().unwrap();
        assert!(id.matches("fan.bedroom"));
        assert!(!id.matches("fan.bedroom_2"));
        assert!(!id.matches("fan"));
    }

    #[test]
    fn test_serde_as_string() {
        let id = EntityId::new("switch", "gate").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"switch.gate\"");
        assert!(serde_json::from_str::<EntityId>("\"Switch.gate\"").is_err());
    }
}
