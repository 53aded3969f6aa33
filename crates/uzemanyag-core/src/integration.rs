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

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config_flow::ConfigEntry;
use crate::consts::{DOMAIN, REQUEST_TIMEOUT, UPDATE_INTERVAL};
use crate::coordinator::{CoordinatorTask, FuelPriceCoordinator};
use crate::errors::SetupError;
use crate::sensor::{FuelPriceSensor, derive_sensors};
use crate::source::FuelPriceSource;

/// What setup produced for one entry
#[derive(Debug, Clone)]
pub struct EntrySetup {
    pub coordinator: Arc<FuelPriceCoordinator>,
    pub sensors: Vec<FuelPriceSensor>,
}

struct LoadedEntry {
    coordinator: Arc<FuelPriceCoordinator>,
    sensors: Vec<FuelPriceSensor>,
    task: CoordinatorTask,
}

/// Host-side lifecycle of config entries
pub struct FuelPriceIntegration {
    source: Arc<dyn FuelPriceSource>,
    update_interval: Duration,
    request_timeout: Duration,
    loaded: Mutex<HashMap<String, LoadedEntry>>,
}

impl fmt::Debug for FuelPriceIntegration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded: Vec<String> = self.loaded.lock().keys().cloned().collect();
        f.debug_struct("FuelPriceIntegration")
            .field("source", &self.source.name())
            .field("loaded", &loaded)
            .finish_non_exhaustive()
    }
}

impl FuelPriceIntegration {
    pub fn new(source: Arc<dyn FuelPriceSource>) -> Self {
        Self::with_timing(source, UPDATE_INTERVAL, REQUEST_TIMEOUT)
    }

    pub fn with_timing(
        source: Arc<dyn FuelPriceSource>,
        update_interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            source,
            update_interval,
            request_timeout,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Set up one config entry.
    ///
    /// Succeeds even when the first refresh failed; the entry then simply
    /// has no sensors.
    pub async fn setup_entry(&self, entry: &ConfigEntry) -> Result<EntrySetup, SetupError> {
        if self.is_loaded(&entry.entry_id) {
            return Err(SetupError::AlreadyLoaded(entry.entry_id.clone()));
        }

        info!("🚀 [{}] Setting up entry '{}'", DOMAIN, entry.title);

        let coordinator = Arc::new(FuelPriceCoordinator::with_timing(
            Arc::clone(&self.source),
            self.update_interval,
            self.request_timeout,
        ));
        coordinator.first_refresh().await;

        let sensors = derive_sensors(&coordinator.subscribe());
        let task = coordinator.spawn_periodic();

        let mut loaded = self.loaded.lock();
        if loaded.contains_key(&entry.entry_id) {
            drop(loaded);
            // Lost a race with a concurrent setup of the same entry
            tokio::spawn(task.shutdown());
            return Err(SetupError::AlreadyLoaded(entry.entry_id.clone()));
        }
        loaded.insert(
            entry.entry_id.clone(),
            LoadedEntry {
                coordinator: Arc::clone(&coordinator),
                sensors: sensors.clone(),
                task,
            },
        );

        Ok(EntrySetup {
            coordinator,
            sensors,
        })
    }

    /// Stop the refresh loop and drop the entry's sensors
    pub async fn unload_entry(&self, entry_id: &str) -> Result<(), SetupError> {
        let Some(loaded) = self.loaded.lock().remove(entry_id) else {
            warn!("⚠️ [{}] Entry {} is not loaded", DOMAIN, entry_id);
            return Err(SetupError::NotLoaded(entry_id.to_owned()));
        };

        let count = loaded.sensors.len();
        loaded.task.shutdown().await;
        info!(
            "🛑 [{}] Unloaded entry {} ({} sensors removed)",
            DOMAIN, entry_id, count
        );
        Ok(())
    }

    pub fn is_loaded(&self, entry_id: &str) -> bool {
        self.loaded.lock().contains_key(entry_id)
    }

    /// Sensors registered for a loaded entry
    pub fn sensors(&self, entry_id: &str) -> Vec<FuelPriceSensor> {
        self.loaded
            .lock()
            .get(entry_id)
            .map(|l| l.sensors.clone())
            .unwrap_or_default()
    }

    pub fn coordinator(&self, entry_id: &str) -> Option<Arc<FuelPriceCoordinator>> {
        self.loaded
            .lock()
            .get(entry_id)
            .map(|l| Arc::clone(&l.coordinator))
    }

    /// Unload every entry, used on process shutdown
    pub async fn unload_all(&self) {
        let ids: Vec<String> = self.loaded.lock().keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.unload_entry(&id).await {
                warn!("⚠️ [{}] {}", DOMAIN, e);
            }
        }
    }
}
