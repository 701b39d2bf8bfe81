//! hasspy
//!
//! Household automation daemon. Connects to the hub, builds the device
//! table, registers the room automations with the trigger engine and feeds
//! it hub notifications, heartbeat ticks and console injections.

mod console;
mod logging;
mod rooms;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ha_client::HubConnection;
use ha_config::HouseConfig;
use ha_devices::Home;
use ha_trigger_engine::{EngineConfig, EngineTasks, TriggerEngine};
use tokio::io::BufReader;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(version, about = "Household automation daemon")]
struct Args {
    /// Directory holding hasspy.yaml and secrets.yaml
    #[arg(default_value = ".")]
    config_dir: PathBuf,
}

fn watch_listener(tasks: EngineTasks) {
    let Some(listener) = tasks.listener else {
        return;
    };
    tokio::spawn(async move {
        match listener.await {
            Ok(Ok(())) => info!("Hub listener finished"),
            Ok(Err(e)) => error!(error = %e, "Hub listener failed, heartbeat and console keep running"),
            Err(e) => error!(error = %e, "Hub listener task aborted"),
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args { config_dir } = Args::parse();

    let config = HouseConfig::load(&config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;
    logging::init(&config)?;

    info!(host = %config.hub.host, "Starting hasspy");

    let home = Home::connect(&config.hub.host, config.hub.token())
        .await
        .context("building the device table")?;
    info!(devices = home.len(), "Home initialized");

    let engine = Arc::new(TriggerEngine::new(EngineConfig {
        heartbeat_interval: config.engine.heartbeat_interval(),
    }));
    rooms::register_all(&engine, &home, &config);

    let mut hub = HubConnection::connect(&config.hub.host, config.hub.token())
        .await
        .context("connecting to the hub event feed")?;
    hub.subscribe_events()
        .await
        .context("subscribing to hub events")?;

    let tasks = engine.start(hub)?;
    watch_listener(tasks);

    info!("Console has started, type 'help' for commands");
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = console::run(&engine, stdin, tokio::io::stdout()) => {
            if let Err(e) = result {
                warn!(error = %e, "Console stopped");
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            info!("Received ctrl-c");
        }
    }

    info!("Shutting down...");
    engine.stop();

    Ok(())
}
