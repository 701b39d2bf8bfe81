//! Logging setup
//!
//! Always logs to stdout. When `logging.file` is set, a second layer
//! appends plain-text records to that file.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ha_config::HouseConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins over `logging.level`
fn filter(config: &HouseConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
}

pub fn init(config: &HouseConfig) -> Result<()> {
    let file_layer = match config.log_file() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter(config))
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::debug!(log_file = ?config.log_file(), level = %config.logging.level, "Logging initialized");
    Ok(())
}
