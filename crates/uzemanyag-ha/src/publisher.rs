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

//! Pushes fuel sensor states to Home Assistant after every coordinator refresh.

use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uzemanyag_core::{CoordinatorState, FuelPriceSensor};

use crate::client::HomeAssistantClient;
use crate::types::StateUpdate;

/// Outcome of one publishing round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct SensorPublisher {
    client: HomeAssistantClient,
    sensors: Vec<FuelPriceSensor>,
}

impl SensorPublisher {
    pub fn new(client: HomeAssistantClient, sensors: Vec<FuelPriceSensor>) -> Self {
        Self { client, sensors }
    }

    pub fn entity_id(sensor: &FuelPriceSensor) -> String {
        format!("sensor.{}", sensor.unique_id())
    }

    /// State payload of one sensor at this moment
    pub fn render(sensor: &FuelPriceSensor) -> StateUpdate {
        let description = sensor.description();

        let mut attributes = if let Some(Value::Object(map)) = sensor
            .attributes()
            .and_then(|a| serde_json::to_value(a).ok())
        {
            map
        } else {
            Map::new()
        };
        attributes.insert(
            "friendly_name".to_owned(),
            Value::String(format!(
                "{} {}",
                description.device_info.name,
                sensor.name()
            )),
        );
        attributes.insert(
            "unit_of_measurement".to_owned(),
            Value::from(description.native_unit_of_measurement),
        );
        attributes.insert(
            "device_class".to_owned(),
            Value::from(description.device_class.as_str()),
        );
        attributes.insert(
            "state_class".to_owned(),
            Value::from(description.state_class.as_str()),
        );
        attributes.insert("icon".to_owned(), Value::from(description.icon));

        StateUpdate {
            state: sensor.state(),
            attributes,
        }
    }

    /// Publish every sensor; one failure does not stop the rest
    pub async fn publish_all(&self) -> PublishSummary {
        let mut summary = PublishSummary::default();

        for sensor in &self.sensors {
            let entity_id = Self::entity_id(sensor);
            match self.client.set_state(&entity_id, &Self::render(sensor)).await {
                Ok(()) => summary.published += 1,
                Err(e) => {
                    warn!("⚠️ [HA PUBLISH] Failed to publish {}: {}", entity_id, e);
                    summary.failed += 1;
                }
            }
        }

        debug!(
            "[HA PUBLISH] Published {}/{} sensors",
            summary.published,
            self.sensors.len()
        );
        summary
    }

    /// Publish now, then after each coordinator update until shutdown
    pub async fn run(
        self,
        mut updates: watch::Receiver<CoordinatorState>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if self.sensors.is_empty() {
            info!("[HA PUBLISH] No sensors to publish");
            return;
        }

        info!(
            "📡 [HA PUBLISH] Mirroring {} sensors to {}",
            self.sensors.len(),
            self.client.base_url()
        );
        updates.mark_unchanged();
        self.publish_all().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.publish_all().await;
                }
            }
        }

        debug!("[HA PUBLISH] Publisher stopped");
    }
}
