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

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, trace};

use crate::consts::{API_ENDPOINT, REQUEST_TIMEOUT};
use crate::errors::{FetchError, FetchResult};
use crate::report::FuelPriceReport;

/// Generic data source for fuel price reports
#[async_trait]
pub trait FuelPriceSource: Send + Sync {
    /// Fetch and validate one report
    async fn fetch_report(&self) -> FetchResult<FuelPriceReport>;

    /// Get data source name for logging
    fn name(&self) -> &str;
}

/// Fuel price API over HTTP
#[derive(Debug, Clone)]
pub struct HttpFuelPriceSource {
    endpoint: String,
    client: Client,
    timeout: Duration,
}

impl HttpFuelPriceSource {
    /// Source for the public endpoint
    pub fn new() -> FetchResult<Self> {
        Self::with_endpoint(API_ENDPOINT)
    }

    /// Source for a custom endpoint (tests, mirrors)
    pub fn with_endpoint(endpoint: impl Into<String>) -> FetchResult<Self> {
        Self::with_timeout(endpoint, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(e)
        }
    }
}

#[async_trait]
impl FuelPriceSource for HttpFuelPriceSource {
    async fn fetch_report(&self) -> FetchResult<FuelPriceReport> {
        debug!("⛽ [FUEL API] GET {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("[FUEL API] API returned status {}", status);
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        trace!("   Body: {}", String::from_utf8_lossy(&body));

        let report = FuelPriceReport::from_slice(&body)?;
        debug!(
            "✅ [FUEL API] Received {} fuel entries",
            report.entries().len()
        );
        Ok(report)
    }

    fn name(&self) -> &str {
        "OmwFuelPriceApi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    const PATH: &str = "/fuel_price_hu.php";

    fn source_for(server: &Server) -> HttpFuelPriceSource {
        HttpFuelPriceSource::with_endpoint(format!("{}{}", server.url(), PATH)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "errorCode": 200,
                    "data": [{"nameOfFuel": "Benzin", "priceAvg": "510.1"}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let source = source_for(&server);
        let report = source.fetch_report().await.unwrap();

        assert_eq!(report.entries().len(), 1);
        assert_eq!(report.entries()[0].name, "Benzin");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_non_200_status() {
        for status in [201, 404, 500, 503] {
            let mut server = Server::new_async().await;
            let mock = server
                .mock("GET", PATH)
                .with_status(status)
                .with_body(json!({"errorCode": 200, "data": []}).to_string())
                .create_async()
                .await;

            let result = source_for(&server).fetch_report().await;
            assert!(
                matches!(result, Err(FetchError::Status(s)) if usize::from(s) == status),
                "status {status} must fail the fetch"
            );
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_fetch_invalid_json() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", PATH)
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;

        let result = source_for(&server).fetch_report().await;
        assert!(matches!(result, Err(FetchError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn test_fetch_rejected_error_code() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", PATH)
            .with_status(200)
            .with_body(json!({"errorCode": 500, "data": []}).to_string())
            .create_async()
            .await;

        let result = source_for(&server).fetch_report().await;
        assert!(matches!(result, Err(FetchError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Nothing listens on the discard port
        let source = HttpFuelPriceSource::with_timeout(
            "http://127.0.0.1:9/fuel_price_hu.php",
            Duration::from_secs(2),
        )
        .unwrap();

        let result = source.fetch_report().await;
        assert!(matches!(
            result,
            Err(FetchError::Transport(_) | FetchError::Timeout(_))
        ));
    }
}
