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

//! Hungarian fuel price integration: API client, update coordinator,
//! per-fuel sensors and the setup wizard.

pub mod config_flow;
pub mod consts;
pub mod coordinator;
pub mod errors;
pub mod integration;
pub mod report;
pub mod sensor;
pub mod source;

pub use config_flow::{ConfigEntries, ConfigEntry, ConfigFlow, FlowResult};
pub use consts::{API_ENDPOINT, DEFAULT_NAME, DOMAIN, REQUEST_TIMEOUT, UPDATE_INTERVAL};
pub use coordinator::{CoordinatorState, CoordinatorTask, FuelPriceCoordinator, RefreshFailure};
pub use errors::{FetchError, FetchResult, FieldError, SetupError};
pub use integration::{EntrySetup, FuelPriceIntegration};
pub use report::{FuelData, FuelEntry, FuelKey, FuelPriceReport, PriceField};
pub use sensor::{FuelAttributes, FuelPriceSensor, SensorDescription, derive_sensors};
pub use source::{FuelPriceSource, HttpFuelPriceSource};
