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

//! No-input setup wizard and the registry of configured entries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::consts::{DEFAULT_NAME, DOMAIN};

pub const STEP_USER: &str = "user";
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

/// A configured instance of the integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub domain: String,
    pub unique_id: String,
    pub title: String,
    pub data: Map<String, Value>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one wizard step
#[derive(Debug, Clone, PartialEq)]
pub enum FlowResult {
    /// Ask for input; the form of this integration has no fields
    ShowForm {
        step_id: &'static str,
        fields: Vec<String>,
    },
    CreateEntry(ConfigEntry),
    Abort { reason: &'static str },
}

/// Registry of configured entries, shared between flows and the host
#[derive(Debug, Clone, Default)]
pub struct ConfigEntries {
    entries: Arc<Mutex<Vec<ConfigEntry>>>,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ConfigEntry> {
        self.entries.lock().clone()
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.entry_id == entry_id)
            .cloned()
    }

    pub fn is_configured(&self, domain: &str, unique_id: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.domain == domain && e.unique_id == unique_id)
    }

    /// Add an entry unless one with the same domain and unique id exists
    fn try_add(&self, entry: ConfigEntry) -> Option<ConfigEntry> {
        let mut entries = self.entries.lock();
        if entries
            .iter()
            .any(|e| e.domain == entry.domain && e.unique_id == entry.unique_id)
        {
            return None;
        }
        entries.push(entry.clone());
        Some(entry)
    }

    pub fn remove(&self, entry_id: &str) -> Option<ConfigEntry> {
        let mut entries = self.entries.lock();
        let idx = entries.iter().position(|e| e.entry_id == entry_id)?;
        Some(entries.remove(idx))
    }
}

/// Setup wizard for the fuel price integration
#[derive(Debug, Clone)]
pub struct ConfigFlow {
    entries: ConfigEntries,
}

impl ConfigFlow {
    pub const VERSION: u32 = 1;

    pub fn new(entries: ConfigEntries) -> Self {
        Self { entries }
    }

    /// The single user step; `None` shows the (empty) form
    pub fn step_user(&self, user_input: Option<Map<String, Value>>) -> FlowResult {
        let Some(data) = user_input else {
            return FlowResult::ShowForm {
                step_id: STEP_USER,
                fields: Vec::new(),
            };
        };

        let entry = ConfigEntry {
            entry_id: format!("{}_{}", DOMAIN, Utc::now().timestamp_micros()),
            domain: DOMAIN.to_owned(),
            unique_id: DOMAIN.to_owned(),
            title: DEFAULT_NAME.to_owned(),
            data,
            version: Self::VERSION,
            created_at: Utc::now(),
        };

        match self.entries.try_add(entry) {
            Some(entry) => {
                info!("✅ Created config entry '{}' ({})", entry.title, entry.entry_id);
                FlowResult::CreateEntry(entry)
            }
            None => {
                warn!("⚠️ {} is already configured", DEFAULT_NAME);
                FlowResult::Abort {
                    reason: ABORT_ALREADY_CONFIGURED,
                }
            }
        }
    }
}
