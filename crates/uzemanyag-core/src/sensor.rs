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

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::consts::{DEFAULT_NAME, DOMAIN};
use crate::coordinator::CoordinatorState;
use crate::errors::FieldError;
use crate::report::{FIELD_PRICE_AVG, FIELD_PRICE_MAX, FIELD_PRICE_MIN, FuelData, FuelEntry, FuelKey};

/// State reported while the sensor has no usable value
pub const STATE_UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorDeviceClass {
    Monetary,
}

impl SensorDeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monetary => "monetary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStateClass {
    Measurement,
}

impl SensorStateClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
        }
    }
}

/// Logical device grouping all fuel sensors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: (&'static str, &'static str),
    pub name: &'static str,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub sw_version: &'static str,
}

/// Metadata shared by every fuel sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorDescription {
    pub device_class: SensorDeviceClass,
    pub state_class: SensorStateClass,
    pub native_unit_of_measurement: &'static str,
    pub suggested_display_precision: usize,
    pub icon: &'static str,
    pub has_entity_name: bool,
    pub should_poll: bool,
    pub entity_category: Option<&'static str>,
    pub device_info: DeviceInfo,
}

pub const FUEL_SENSOR: SensorDescription = SensorDescription {
    device_class: SensorDeviceClass::Monetary,
    state_class: SensorStateClass::Measurement,
    native_unit_of_measurement: "Ft/l",
    suggested_display_precision: 1,
    icon: "mdi:fuel",
    has_entity_name: true,
    should_poll: false,
    entity_category: None,
    device_info: DeviceInfo {
        identifiers: (DOMAIN, "uzemanyagarak"),
        name: DEFAULT_NAME,
        manufacturer: "OMV",
        model: "Üzemanyagárak API",
        sw_version: "1.0.0",
    },
};

/// Extra state attributes of a fuel sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelAttributes {
    #[serde(rename = "Info")]
    pub info: String,
    #[serde(rename = "Legolcsóbb ár")]
    pub price_min: f64,
    #[serde(rename = "Legmagasabb ár")]
    pub price_max: f64,
    #[serde(rename = "Átlagár")]
    pub price_avg: f64,
}

impl FuelAttributes {
    fn from_entry(entry: &FuelEntry) -> Result<Self, FieldError> {
        Ok(Self {
            info: entry.info.clone(),
            price_min: entry.price_min.coerce_or(FIELD_PRICE_MIN, 0.0)?,
            price_max: entry.price_max.coerce_or(FIELD_PRICE_MAX, 0.0)?,
            price_avg: entry.price_avg.coerce_or(FIELD_PRICE_AVG, 0.0)?,
        })
    }
}

/// Numeric sensor for one fuel type
///
/// Name and identity are fixed when the sensor is built. Value and attributes
/// are resolved by identity in the coordinator's current report on every read,
/// so they follow later refreshes. Records sharing an identity are told apart
/// by their occurrence among those records.
#[derive(Debug, Clone)]
pub struct FuelPriceSensor {
    state: watch::Receiver<CoordinatorState>,
    key: FuelKey,
    occurrence: usize,
    name: String,
    unique_id: String,
}

impl FuelPriceSensor {
    pub fn new(state: watch::Receiver<CoordinatorState>, entry: &FuelEntry) -> Self {
        Self::with_occurrence(state, entry, 0, format!("{}_{}", DOMAIN, entry.key))
    }

    fn with_occurrence(
        state: watch::Receiver<CoordinatorState>,
        entry: &FuelEntry,
        occurrence: usize,
        unique_id: String,
    ) -> Self {
        Self {
            state,
            key: entry.key.clone(),
            occurrence,
            name: entry.name.clone(),
            unique_id,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &FuelKey {
        &self.key
    }

    /// Zero for the first record with this identity, then 1, 2, ...
    pub fn occurrence(&self) -> usize {
        self.occurrence
    }

    pub fn description(&self) -> &'static SensorDescription {
        &FUEL_SENSOR
    }

    /// Coordinator-level availability
    pub fn available(&self) -> bool {
        self.state.borrow().has_data()
    }

    /// Average price in Ft/l, `None` when it cannot be read
    pub fn value(&self) -> Option<f64> {
        let entry = self.current_entry()?;
        match entry.price_avg.coerce(FIELD_PRICE_AVG) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("❌ Error getting price for {}: {}", self.name, e);
                None
            }
        }
    }

    /// Fixed four-key mapping, `None` when any numeric field is invalid
    pub fn attributes(&self) -> Option<FuelAttributes> {
        let entry = self.current_entry()?;
        match FuelAttributes::from_entry(&entry) {
            Ok(attributes) => Some(attributes),
            Err(e) => {
                error!("❌ Error getting attributes for {}: {}", self.name, e);
                None
            }
        }
    }

    /// Host-facing state string with the suggested precision
    pub fn state(&self) -> String {
        if !self.available() {
            return STATE_UNAVAILABLE.to_owned();
        }
        self.value().map_or_else(
            || STATE_UNAVAILABLE.to_owned(),
            |v| format!("{:.*}", FUEL_SENSOR.suggested_display_precision, v),
        )
    }

    /// Wait until the coordinator publishes a new state
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    fn current_entry(&self) -> Option<FuelEntry> {
        let state = self.state.borrow();
        let Some(report) = state.report.as_ref() else {
            debug!("No report available for {}", self.name);
            return None;
        };
        let entry = report.find_nth(&self.key, self.occurrence).cloned();
        if entry.is_none() {
            warn!(
                "⚠️ Fuel {} ({}) is not present in the latest report",
                self.name, self.key
            );
        }
        entry
    }
}

/// Build sensors from the first refresh.
///
/// Returns no sensors when the refresh failed, `data` is not a list, or no
/// record carries both `nameOfFuel` and `priceAvg`.
pub fn derive_sensors(state: &watch::Receiver<CoordinatorState>) -> Vec<FuelPriceSensor> {
    let snapshot = state.borrow().clone();

    let Some(report) = snapshot.report else {
        error!("❌ No data received from API");
        return Vec::new();
    };

    if let FuelData::NotAList(found) = &report.data {
        error!("❌ Invalid data format received from API: `data` is {}", found);
        return Vec::new();
    }

    for rejected in report.rejected() {
        error!(
            "❌ Invalid fuel data format at index {}: {}",
            rejected.index, rejected.reason
        );
    }

    let mut seen: HashMap<&FuelKey, usize> = HashMap::new();
    let mut used_ids: HashSet<String> = HashSet::new();
    let mut sensors = Vec::with_capacity(report.entries().len());
    for entry in report.entries() {
        let occurrence = seen.entry(&entry.key).or_insert(0);
        let unique_id = unique_id_for(&entry.key, *occurrence, &used_ids);
        if *occurrence > 0 {
            warn!(
                "⚠️ Duplicate fuel identity {} for {}, registering as {}",
                entry.key, entry.name, unique_id
            );
        }
        debug!("Creating sensor for fuel: {}", entry.name);
        used_ids.insert(unique_id.clone());
        sensors.push(FuelPriceSensor::with_occurrence(
            state.clone(),
            entry,
            *occurrence,
            unique_id,
        ));
        *occurrence += 1;
    }

    if sensors.is_empty() {
        error!("❌ No valid entities created");
    } else {
        info!("✅ Created {} fuel price sensors", sensors.len());
    }
    sensors
}

/// `magyar_uzemanyag_<key>` for the first record, then `_2`, `_3`, ...
/// skipping any id already taken by a fuel whose own key ends that way
fn unique_id_for(key: &FuelKey, occurrence: usize, used: &HashSet<String>) -> String {
    let base = format!("{DOMAIN}_{key}");
    if occurrence == 0 && !used.contains(&base) {
        return base;
    }
    let mut suffix = occurrence.max(1) + 1;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !used.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
