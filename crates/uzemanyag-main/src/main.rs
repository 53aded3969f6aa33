// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Magyar Üzemanyagárak.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod config;

use anyhow::{Context, Result};
use serde_json::Map;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::FmtSubscriber;

use config::AppConfig;
use uzemanyag_core::{
    ConfigEntries, ConfigFlow, CoordinatorState, DEFAULT_NAME, FlowResult, FuelPriceIntegration,
    FuelPriceSensor, HttpFuelPriceSource, UPDATE_INTERVAL,
};
use uzemanyag_ha::{HomeAssistantClient, SensorPublisher};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" => {
                println!("{DEFAULT_NAME} - Hungarian fuel prices for Home Assistant");
                println!("Version: {VERSION}");
                println!();
                println!("Usage: uzemanyag [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help    Print this help message");
                println!("  -v, --version Print version");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{VERSION}");
                return Ok(());
            }
            _ => {}
        }
    }

    let config = AppConfig::load()?;
    init_tracing(&config.system.log_level)?;

    info!("🚀 Starting {} v{}", DEFAULT_NAME, VERSION);
    match &config.source {
        Some(path) => info!("✅ Loaded configuration from {}", path.display()),
        None => warn!("No configuration file found, using defaults with environment overrides"),
    }
    info!("📋 Configuration Summary:");
    info!("   Publish to Home Assistant: {}", config.home_assistant.enabled);
    info!("   Refresh interval: {}s", UPDATE_INTERVAL.as_secs());
    info!("   Log level: {}", config.system.log_level);

    let entries = ConfigEntries::new();
    let flow = ConfigFlow::new(entries.clone());
    if let FlowResult::ShowForm { step_id, .. } = flow.step_user(None) {
        debug!("Setup step '{}' needs no input", step_id);
    }
    let entry = match flow.step_user(Some(Map::new())) {
        FlowResult::CreateEntry(entry) => entry,
        FlowResult::Abort { reason } => anyhow::bail!("Setup aborted: {reason}"),
        FlowResult::ShowForm { step_id, .. } => anyhow::bail!("Setup stuck at step '{step_id}'"),
    };

    let source = HttpFuelPriceSource::new().context("Failed to create fuel price client")?;
    let integration = FuelPriceIntegration::new(Arc::new(source));
    let setup = integration.setup_entry(&entry).await?;
    log_sensor_states(&setup.sensors);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = vec![tokio::spawn(watch_sensor_states(
        setup.coordinator.subscribe(),
        setup.sensors.clone(),
        shutdown_rx.clone(),
    ))];

    if config.home_assistant.enabled {
        match create_ha_client(&config).await {
            Ok(client) => {
                let publisher = SensorPublisher::new(client, setup.sensors.clone());
                tasks.push(tokio::spawn(
                    publisher.run(setup.coordinator.subscribe(), shutdown_rx.clone()),
                ));
            }
            Err(e) => warn!("⚠️ Home Assistant publishing disabled: {:#}", e),
        }
    }

    info!("✅ {} running, press Ctrl+C to stop", DEFAULT_NAME);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("🛑 Shutting down...");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!("⚠️ Background task ended abnormally: {}", e);
        }
    }
    integration.unload_entry(&entry.entry_id).await?;
    info!("👋 Stopped");
    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(log_level: &str) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

async fn create_ha_client(config: &AppConfig) -> Result<HomeAssistantClient> {
    let client = if std::env::var("SUPERVISOR_TOKEN").is_ok() {
        info!("🏠 Initializing HA client using Supervisor API...");
        HomeAssistantClient::from_supervisor()?
    } else {
        info!("🏠 Initializing HA client from configuration...");
        HomeAssistantClient::from_config(
            config.home_assistant.base_url.clone(),
            config.home_assistant.token.clone(),
        )?
    };

    if !client.ping().await? {
        warn!(
            "⚠️ Home Assistant at {} is not reachable yet, will keep trying on each refresh",
            client.base_url()
        );
    }
    Ok(client)
}

fn log_sensor_states(sensors: &[FuelPriceSensor]) {
    if sensors.is_empty() {
        warn!("⚠️ No fuel price sensors available");
        return;
    }
    for sensor in sensors {
        info!(
            "⛽ {}: {} {}",
            sensor.name(),
            sensor.state(),
            sensor.description().native_unit_of_measurement
        );
    }
}

/// Log every sensor after each coordinator refresh
async fn watch_sensor_states(
    mut updates: watch::Receiver<CoordinatorState>,
    sensors: Vec<FuelPriceSensor>,
    mut shutdown: watch::Receiver<bool>,
) {
    updates.mark_unchanged();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                log_sensor_states(&sensors);
            }
        }
    }
}
