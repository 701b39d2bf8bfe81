//! Configuration loading for hasspy
//!
//! Reads `hasspy.yaml` from a configuration directory. Values may use
//! two YAML tags:
//!
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use ha_config::HouseConfig;
//!
//! let config = HouseConfig::load("/etc/hasspy")?;
//! println!("connecting to {}", config.hub.host);
//! ```

mod error;
mod house;
mod loader;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use house::{EngineSettings, HouseConfig, HubConfig, LoggingConfig, CONFIG_FILE};
pub use loader::YamlLoader;
pub use secrets::{Secrets, SECRETS_FILE};
