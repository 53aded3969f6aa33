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

use crate::errors::{HaError, HaResult};
use crate::types::StateUpdate;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const SUPERVISOR_URL: &str = "http://supervisor/core";
const DEFAULT_BASE_URL: &str = "http://localhost:8123";

/// Home Assistant REST API client
#[derive(Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for HomeAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl HomeAssistantClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HaError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.into(),
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Client for the Supervisor proxy, used when running as an add-on
    pub fn from_supervisor() -> HaResult<Self> {
        let token = std::env::var("SUPERVISOR_TOKEN").map_err(|_| {
            HaError::ConfigError(
                "SUPERVISOR_TOKEN environment variable not set. Are you running as an HA addon?"
                    .to_owned(),
            )
        })?;

        info!("Initializing HA client using Supervisor API");
        Self::new(SUPERVISOR_URL, token)
    }

    /// Client from `HA_BASE_URL` / `HA_TOKEN`
    pub fn from_env() -> HaResult<Self> {
        let base_url = std::env::var("HA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let token = std::env::var("HA_TOKEN")
            .map_err(|_| HaError::ConfigError("HA_TOKEN environment variable not set".to_owned()))?;

        info!("Initializing HA client for development: {}", base_url);
        Self::new(base_url, token)
    }

    /// Client from configuration values, falling back to the environment
    pub fn from_config(base_url: Option<String>, token: Option<String>) -> HaResult<Self> {
        let base_url = base_url
            .or_else(|| std::env::var("HA_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        let token = token
            .or_else(|| std::env::var("HA_TOKEN").ok())
            .ok_or_else(|| {
                HaError::ConfigError(
                    "HA token not found in config or HA_TOKEN environment variable".to_owned(),
                )
            })?;

        info!("Initializing HA client from configuration: {}", base_url);
        Self::new(base_url, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create or replace the state of an entity
    pub async fn set_state(&self, entity_id: &str, update: &StateUpdate) -> HaResult<()> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        debug!("📤 [HA STATE] {} = '{}'", entity_id, update.state);
        trace!("   Attributes: {:?}", update.attributes);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(update)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                debug!("✅ [HA STATE] Updated {}", entity_id);
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [HA ERROR] Authentication failed for entity: {}", entity_id);
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [HA ERROR] Status {}: {}", status, error_text);
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Health check, never fails on connection problems
    pub async fn ping(&self) -> HaResult<bool> {
        let url = format!("{}/api/", self.base_url);
        debug!("Performing health check");

        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => {
                let is_ok = response.status().is_success();
                if is_ok {
                    debug!("Health check passed");
                } else {
                    warn!("Health check failed: status {}", response.status());
                }
                Ok(is_ok)
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Retry transport failures with exponential backoff
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> HaResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    return Err(HaError::HttpError(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::{Map, json};

    fn update(state: &str) -> StateUpdate {
        let mut attributes = Map::new();
        attributes.insert("unit_of_measurement".to_owned(), json!("Ft/l"));
        StateUpdate {
            state: state.to_owned(),
            attributes,
        }
    }

    #[tokio::test]
    async fn test_set_state_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/states/sensor.magyar_uzemanyag_benzin")
            .match_header("authorization", "Bearer test_token")
            .match_body(Matcher::Json(json!({
                "state": "510.1",
                "attributes": {"unit_of_measurement": "Ft/l"}
            })))
            .with_status(201)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client
            .set_state("sensor.magyar_uzemanyag_benzin", &update("510.1"))
            .await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_state_unauthorized() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/states/sensor.x")
            .with_status(401)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "bad").unwrap();
        let result = client.set_state("sensor.x", &update("1.0")).await;

        assert!(matches!(result, Err(HaError::AuthenticationFailed)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_state_api_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/states/sensor.x")
            .with_status(400)
            .with_body("Invalid state specified.")
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "token").unwrap();
        let result = client.set_state("sensor.x", &update("1.0")).await;

        match result {
            Err(HaError::ApiError { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid state specified.");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_set_state_gives_up_after_retries() {
        let client = HomeAssistantClient::new("http://127.0.0.1:9", "token")
            .unwrap()
            .with_retry_config(2, Duration::from_millis(10));

        let result = client.set_state("sensor.x", &update("1.0")).await;

        assert!(matches!(result, Err(HaError::HttpError(_))));
    }

    #[tokio::test]
    async fn test_ping() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .with_body(r#"{"message": "API running."}"#)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        assert!(client.ping().await.unwrap());
        mock.assert_async().await;

        let offline = HomeAssistantClient::new("http://127.0.0.1:9", "token").unwrap();
        assert!(!offline.ping().await.unwrap());
    }

    #[test]
    fn test_from_config_values_win() {
        let client = HomeAssistantClient::from_config(
            Some("http://ha.local:8123/".to_owned()),
            Some("token".to_owned()),
        )
        .unwrap();

        assert_eq!(client.base_url(), "http://ha.local:8123");
    }
}
