//! Household configuration
//!
//! Parses `hasspy.yaml` from the configuration directory:
//!
//! ```yaml
//! hub:
//!   host: homeassistant.local:8123
//!   token: !secret hass_token
//! engine:
//!   heartbeat_interval: 5
//! logging:
//!   level: info
//!   file: hass.log
//! residents:
//!   - "*_phone"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;

/// Configuration file name inside the configuration directory
pub const CONFIG_FILE: &str = "hasspy.yaml";

const DEFAULT_HEARTBEAT_SECONDS: f64 = 5.0;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FILE: &str = "hass.log";

/// Fully resolved household configuration
#[derive(Debug, Clone)]
pub struct HouseConfig {
    pub hub: HubConfig,
    pub engine: EngineSettings,
    pub logging: LoggingConfig,
    /// Wildcard patterns selecting the presence trackers of the people living here
    pub residents: Vec<String>,
    pub config_dir: PathBuf,
}

/// Hub connection settings with the access token already resolved
#[derive(Clone)]
pub struct HubConfig {
    pub host: String,
    token: String,
}

impl HubConfig {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    /// Seconds between heartbeat dispatches
    #[serde(default = "default_heartbeat")]
    pub heartbeat_interval: f64,
}

impl EngineSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_interval)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file, relative to the configuration directory; `null` disables it
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_heartbeat() -> f64 {
    DEFAULT_HEARTBEAT_SECONDS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_LOG_FILE))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHouseConfig {
    hub: RawHubConfig,
    #[serde(default)]
    engine: EngineSettings,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    residents: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHubConfig {
    host: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    token_file: Option<PathBuf>,
}

impl HouseConfig {
    /// Load `hasspy.yaml` (and `secrets.yaml`) from `config_dir`
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();
        let loader = YamlLoader::new(config_dir)?;
        let value = loader.load_file(CONFIG_FILE)?;
        Self::from_value(&loader, value)
    }

    /// Parse configuration text with an existing loader
    pub fn from_yaml_str(loader: &YamlLoader, content: &str) -> ConfigResult<Self> {
        let value = loader.load_string(content, &loader.resolve_path(Path::new(CONFIG_FILE)))?;
        Self::from_value(loader, value)
    }

    fn from_value(loader: &YamlLoader, value: serde_yaml::Value) -> ConfigResult<Self> {
        let path = loader.resolve_path(Path::new(CONFIG_FILE));
        let raw: RawHouseConfig =
            serde_yaml::from_value(value).map_err(|e| ConfigError::ParseYaml {
                path: path.clone(),
                source: e,
            })?;

        let config = Self {
            hub: resolve_hub(loader, raw.hub)?,
            engine: raw.engine,
            logging: raw.logging,
            residents: raw.residents,
            config_dir: loader.config_dir().to_path_buf(),
        };
        config.validate()?;

        info!(
            host = %config.hub.host,
            heartbeat = config.engine.heartbeat_interval,
            residents = config.residents.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Log file path resolved against the configuration directory
    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging.file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                self.config_dir.join(file)
            }
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.hub.host.trim().is_empty() {
            return Err(validation("hub.host must not be empty"));
        }
        let heartbeat = self.engine.heartbeat_interval;
        if !heartbeat.is_finite() || heartbeat <= 0.0 {
            return Err(validation(format!(
                "engine.heartbeat_interval must be a positive number of seconds, got {}",
                heartbeat
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(validation("logging.level must not be empty"));
        }
        if let Some(pattern) = self.residents.iter().find(|p| p.trim().is_empty()) {
            return Err(validation(format!("residents contains an empty pattern {:?}", pattern)));
        }
        Ok(())
    }
}

fn resolve_hub(loader: &YamlLoader, raw: RawHubConfig) -> ConfigResult<HubConfig> {
    if let Some(token) = raw.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        if raw.token_file.is_some() {
            debug!("Both hub.token and hub.token_file set, using hub.token");
        }
        return Ok(HubConfig::new(raw.host, token));
    }

    let Some(file) = raw.token_file else {
        return Err(validation("one of hub.token or hub.token_file is required"));
    };

    let path = loader.resolve_path(&file);
    let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
        path: path.clone(),
        source: e,
    })?;
    let token = content.trim();
    if token.is_empty() {
        return Err(validation(format!("token file {} is empty", path.display())));
    }
    Ok(HubConfig::new(raw.host, token))
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationFailed {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::Secrets;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONFIG_FILE, "hub:\n  host: hub.lan:8123\n  token: abc\n");

        let config = HouseConfig::load(dir.path()).unwrap();
        assert_eq!(config.hub.host, "hub.lan:8123");
        assert_eq!(config.hub.token(), "abc");
        assert_eq!(config.engine.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.log_file(), Some(dir.path().join("hass.log")));
        assert!(config.residents.is_empty());
    }

    #[test]
    fn test_full_config_with_secret() {
        let dir = TempDir::new().unwrap();
        write(&dir, "secrets.yaml", "hass_token: from-secrets\n");
        write(
            &dir,
            CONFIG_FILE,
            "hub:\n  host: hub.lan:8123\n  token: !secret hass_token\n\
             engine:\n  heartbeat_interval: 0.5\n\
             logging:\n  level: debug\n  file: null\n\
             residents:\n  - \"*_phone\"\n",
        );

        let config = HouseConfig::load(dir.path()).unwrap();
        assert_eq!(config.hub.token(), "from-secrets");
        assert_eq!(config.engine.heartbeat_interval(), Duration::from_millis(500));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.log_file(), None);
        assert_eq!(config.residents, vec!["*_phone".to_string()]);
    }

    #[test]
    fn test_token_file_is_trimmed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hass_key", "  file-token\n\n");
        write(&dir, CONFIG_FILE, "hub:\n  host: hub.lan\n  token_file: hass_key\n");

        let config = HouseConfig::load(dir.path()).unwrap();
        assert_eq!(config.hub.token(), "file-token");
    }

    #[test]
    fn test_token_wins_over_file() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            CONFIG_FILE,
            "hub:\n  host: hub.lan\n  token: inline\n  token_file: does-not-exist\n",
        );
        let config = HouseConfig::load(dir.path()).unwrap();
        assert_eq!(config.hub.token(), "inline");
    }

    #[test]
    fn test_missing_token() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONFIG_FILE, "hub:\n  host: hub.lan\n  token: '  '\n");
        assert!(matches!(
            HouseConfig::load(dir.path()),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_empty_token_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hass_key", "\n");
        write(&dir, CONFIG_FILE, "hub:\n  host: hub.lan\n  token_file: hass_key\n");
        assert!(matches!(
            HouseConfig::load(dir.path()),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_missing_token_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONFIG_FILE, "hub:\n  host: hub.lan\n  token_file: hass_key\n");
        assert!(matches!(
            HouseConfig::load(dir.path()),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_invalid_heartbeat() {
        let loader = YamlLoader::with_secrets("/config", Secrets::default());
        for interval in ["0", "-1"] {
            let yaml = format!(
                "hub:\n  host: hub.lan\n  token: abc\nengine:\n  heartbeat_interval: {}\n",
                interval
            );
            assert!(matches!(
                HouseConfig::from_yaml_str(&loader, &yaml),
                Err(ConfigError::ValidationFailed { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let loader = YamlLoader::with_secrets("/config", Secrets::default());
        let err = HouseConfig::from_yaml_str(&loader, "hub:\n  host: hub.lan\n  token: abc\n  port: 8123\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml { .. }));
    }

    #[test]
    fn test_missing_hub_section() {
        let loader = YamlLoader::with_secrets("/config", Secrets::default());
        assert!(matches!(
            HouseConfig::from_yaml_str(&loader, "residents: []\n"),
            Err(ConfigError::ParseYaml { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let hub = HubConfig::new("hub.lan", "super-secret");
        assert!(!format!("{:?}", hub).contains("super-secret"));
    }
}
