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

mod validation;

pub use validation::ValidationResult;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

const ADDON_OPTIONS_PATH: &str = "/data/options.json";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Publishing the sensors to Home Assistant
    #[serde(default)]
    pub home_assistant: HomeAssistantConfig,

    #[serde(default)]
    pub system: SystemConfig,

    /// Where the configuration came from, `None` for defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeAssistantConfig {
    /// Mirror sensor states into Home Assistant
    #[serde(default = "default_publish")]
    pub enabled: bool,

    /// Base URL (optional, defaults to the Supervisor proxy or HA_BASE_URL)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Long-lived access token (optional, uses SUPERVISOR_TOKEN if not set)
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            enabled: default_publish(),
            base_url: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_publish() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl AppConfig {
    /// Load configuration from HA addon options or a config file
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(ADDON_OPTIONS_PATH), Path::new("."))
    }

    /// Same lookup order as [`AppConfig::load`] with explicit locations
    pub fn load_from(addon_options: &Path, work_dir: &Path) -> Result<Self> {
        // HA addon options first
        if let Ok(options_str) = std::fs::read_to_string(addon_options) {
            let config: AppConfig =
                serde_json::from_str(&options_str).context("Failed to parse HA addon options")?;
            return config.loaded_from(addon_options);
        }

        let toml_path = work_dir.join("config.toml");
        if let Ok(config_str) = std::fs::read_to_string(&toml_path) {
            let config: AppConfig =
                toml::from_str(&config_str).context("Failed to parse config.toml")?;
            return config.loaded_from(&toml_path);
        }

        let json_path = work_dir.join("config.json");
        if let Ok(config_str) = std::fs::read_to_string(&json_path) {
            let config: AppConfig =
                serde_json::from_str(&config_str).context("Failed to parse config.json")?;
            return config.loaded_from(&json_path);
        }

        // Defaults with environment variable overrides
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    fn loaded_from(mut self, path: &Path) -> Result<Self> {
        self.source = Some(path.to_path_buf());
        self.validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(self)
    }

    fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `HA_BASE_URL`, `HA_TOKEN`, `LOG_LEVEL` and `PUBLISH_TO_HA`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("HA_BASE_URL") {
            self.home_assistant.base_url = Some(url);
        }
        if let Some(token) = lookup("HA_TOKEN") {
            self.home_assistant.token = Some(token);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.system.log_level = level.to_lowercase();
        }
        if let Some(publish) = lookup("PUBLISH_TO_HA")
            && let Ok(enabled) = publish.parse::<bool>()
        {
            self.home_assistant.enabled = enabled;
        }
    }

    /// Validate configuration with detailed error reporting
    pub fn validate_detailed(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if !LOG_LEVELS.contains(&self.system.log_level.as_str()) {
            result.add_error(
                "system.log_level",
                format!(
                    "Unknown log level '{}', expected one of {}",
                    self.system.log_level,
                    LOG_LEVELS.join(", ")
                ),
            );
        }

        result.merge(self.home_assistant.validate_detailed());
        result
    }

    pub fn validate(&self) -> Result<()> {
        let result = self.validate_detailed();
        for warning in &result.warnings {
            warn!("⚠️ Config {}: {}", warning.field, warning.message);
        }
        if result.has_errors() {
            anyhow::bail!("Invalid configuration: {}", result.error_summary());
        }
        Ok(())
    }
}

impl HomeAssistantConfig {
    fn validate_detailed(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if let Some(url) = &self.base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            result.add_error(
                "home_assistant.base_url",
                format!("'{url}' must start with http:// or https://"),
            );
        }

        if let Some(token) = &self.token
            && token.trim().is_empty()
        {
            result.add_error("home_assistant.token", "Token cannot be empty");
        }

        if self.enabled && self.base_url.is_some() && self.token.is_none() {
            result.add_warning(
                "home_assistant.token",
                "No token configured, falling back to HA_TOKEN",
            );
        }

        if !self.enabled && (self.base_url.is_some() || self.token.is_some()) {
            result.add_warning(
                "home_assistant.enabled",
                "Connection settings are ignored while publishing is disabled",
            );
        }

        result
    }
}
