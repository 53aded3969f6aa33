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

//! Update coordinator: owns the periodic fetch and the latest result.
//!
//! The state lives in a `tokio::sync::watch` cell. The coordinator is its only
//! writer; sensors and publishers hold receivers and read the current value
//! or wait for the next refresh. Every refresh replaces the state as a whole.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::consts::{DOMAIN, REQUEST_TIMEOUT, UPDATE_INTERVAL};
use crate::errors::{FetchError, FetchResult};
use crate::report::FuelPriceReport;
use crate::source::FuelPriceSource;

/// Summary of a failed refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub kind: &'static str,
    pub message: String,
}

impl From<&FetchError> for RefreshFailure {
    fn from(err: &FetchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Latest known result of the coordinator
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    /// Last report, `None` when the latest refresh failed
    pub report: Option<Arc<FuelPriceReport>>,
    pub last_update_success: bool,
    pub last_failure: Option<RefreshFailure>,
    /// When the latest refresh finished; `None` before the first one
    pub last_refresh: Option<DateTime<Utc>>,
}

impl CoordinatorState {
    fn from_result(result: &FetchResult<FuelPriceReport>) -> Self {
        let now = Some(Utc::now());
        match result {
            Ok(report) => Self {
                report: Some(Arc::new(report.clone())),
                last_update_success: true,
                last_failure: None,
                last_refresh: now,
            },
            Err(err) => Self {
                report: None,
                last_update_success: false,
                last_failure: Some(RefreshFailure::from(err)),
                last_refresh: now,
            },
        }
    }

    /// Succeeded, holds a report, and that report carried `data`
    pub fn has_data(&self) -> bool {
        self.last_update_success && self.report.as_ref().is_some_and(|r| r.has_data())
    }
}

/// Periodic fetcher for one config entry
pub struct FuelPriceCoordinator {
    source: Arc<dyn FuelPriceSource>,
    state: watch::Sender<CoordinatorState>,
    update_interval: Duration,
    request_timeout: Duration,
    // Serializes refreshes of this coordinator
    refresh_lock: Mutex<()>,
}

impl fmt::Debug for FuelPriceCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuelPriceCoordinator")
            .field("source", &self.source.name())
            .field("update_interval", &self.update_interval)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl FuelPriceCoordinator {
    pub fn new(source: Arc<dyn FuelPriceSource>) -> Self {
        Self::with_timing(source, UPDATE_INTERVAL, REQUEST_TIMEOUT)
    }

    pub fn with_timing(
        source: Arc<dyn FuelPriceSource>,
        update_interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self {
            source,
            state,
            update_interval,
            request_timeout,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Handle for readers; woken after every refresh
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Initial refresh, awaited by setup before entities are built
    pub async fn first_refresh(&self) -> CoordinatorState {
        info!(
            "⛽ [{}] Initial fetch from {} ...",
            DOMAIN,
            self.source.name()
        );
        self.refresh().await
    }

    /// Fetch once and replace the shared state
    pub async fn refresh(&self) -> CoordinatorState {
        let _guard = self.refresh_lock.lock().await;

        let result = match tokio::time::timeout(self.request_timeout, self.source.fetch_report())
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.request_timeout)),
        };

        self.store(&result)
    }

    fn store(&self, result: &FetchResult<FuelPriceReport>) -> CoordinatorState {
        match result {
            Ok(report) => debug!(
                "✅ [{}] Refresh succeeded: {} fuel entries",
                DOMAIN,
                report.entries().len()
            ),
            Err(FetchError::Cancelled) => {
                warn!("⚠️ [{}] Refresh cancelled", DOMAIN);
            }
            Err(e) => error!(
                "❌ [{}] Error fetching data from {}: {}",
                DOMAIN,
                self.source.name(),
                e
            ),
        }

        let state = CoordinatorState::from_result(result);
        self.state.send_replace(state.clone());
        state
    }

    /// Start periodic refreshes; the first tick comes one interval from now
    pub fn spawn_periodic(self: &Arc<Self>) -> CoordinatorTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let coordinator = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let period = coordinator.update_interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "🔄 [{}] Refreshing every {}s",
                DOMAIN,
                period.as_secs()
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    biased;
                    _ = coordinator.refresh() => {}
                    _ = shutdown_rx.changed() => {
                        coordinator.store(&Err(FetchError::Cancelled));
                        break;
                    }
                }
            }

            debug!("[{}] Refresh loop stopped", DOMAIN);
        });

        CoordinatorTask {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Running refresh loop; stop it with [`CoordinatorTask::shutdown`]
#[derive(Debug)]
pub struct CoordinatorTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CoordinatorTask {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("⚠️ [{}] Refresh loop ended abnormally: {}", DOMAIN, e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source returning queued results, then repeating the fallback
    pub(crate) struct ScriptedSource {
        queue: SyncMutex<VecDeque<FetchResult<FuelPriceReport>>>,
        fallback: serde_json::Value,
        delay: Duration,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub(crate) fn new(fallback: serde_json::Value) -> Self {
            Self {
                queue: SyncMutex::new(VecDeque::new()),
                fallback,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn push(self, result: FetchResult<FuelPriceReport>) -> Self {
            self.queue.lock().push_back(result);
            self
        }
    }

    #[async_trait]
    impl FuelPriceSource for ScriptedSource {
        async fn fetch_report(&self) -> FetchResult<FuelPriceReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let queued = self.queue.lock().pop_front();
            queued.unwrap_or_else(|| FuelPriceReport::from_json(&self.fallback))
        }

        fn name(&self) -> &str {
            "Scripted"
        }
    }

    pub(crate) fn benzin_payload() -> serde_json::Value {
        json!({
            "errorCode": 200,
            "data": [{
                "nameOfFuel": "Benzin",
                "priceAvg": "510.1",
                "priceMin": "495.0",
                "priceMax": "520.0",
                "infoOflabel": "napi átlag"
            }]
        })
    }

    #[tokio::test]
    async fn test_refresh_success_updates_state() {
        let coordinator =
            FuelPriceCoordinator::new(Arc::new(ScriptedSource::new(benzin_payload())));
        let mut rx = coordinator.subscribe();
        assert!(!rx.borrow().last_update_success);
        assert!(rx.borrow().last_refresh.is_none());

        let state = coordinator.refresh().await;

        assert!(state.last_update_success);
        assert!(state.has_data());
        assert!(state.last_failure.is_none());
        assert_eq!(state.report.as_ref().unwrap().entries().len(), 1);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().last_update_success);
    }

    #[tokio::test]
    async fn test_failed_refresh_replaces_report() {
        let source = ScriptedSource::new(benzin_payload()).push(Err(FetchError::Status(500)));
        let coordinator = FuelPriceCoordinator::new(Arc::new(source));

        let state = coordinator.refresh().await;
        assert!(!state.last_update_success);
        assert!(state.report.is_none());
        assert_eq!(state.last_failure.as_ref().unwrap().kind, "status");

        let state = coordinator.refresh().await;
        assert!(state.last_update_success);

        // A later failure must not keep the previous report around
        let coordinator = FuelPriceCoordinator::new(Arc::new(
            ScriptedSource::new(json!({"errorCode": 404})),
        ));
        let state = coordinator.refresh().await;
        assert!(state.report.is_none());
        assert_eq!(state.last_failure.unwrap().kind, "rejected");
    }

    #[tokio::test]
    async fn test_refresh_timeout() {
        let source = ScriptedSource::new(benzin_payload()).with_delay(Duration::from_secs(5));
        let coordinator = FuelPriceCoordinator::with_timing(
            Arc::new(source),
            UPDATE_INTERVAL,
            Duration::from_millis(50),
        );

        let state = coordinator.refresh().await;

        assert!(!state.last_update_success);
        assert!(state.report.is_none());
        assert_eq!(state.last_failure.unwrap().kind, "timeout");
    }

    #[tokio::test]
    async fn test_report_without_data_is_not_usable() {
        let coordinator = FuelPriceCoordinator::new(Arc::new(ScriptedSource::new(
            json!({"errorCode": 200}),
        )));

        let state = coordinator.refresh().await;

        assert!(state.last_update_success);
        assert!(state.report.is_some());
        assert!(!state.has_data());
    }

    #[tokio::test]
    async fn test_periodic_refresh_and_shutdown() {
        let source = Arc::new(ScriptedSource::new(benzin_payload()));
        let coordinator = Arc::new(FuelPriceCoordinator::with_timing(
            source.clone(),
            Duration::from_millis(20),
            Duration::from_secs(1),
        ));

        let task = coordinator.spawn_periodic();
        // No eager refresh from the loop itself
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        task.shutdown().await;

        let calls = source.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "expected several ticks, got {calls}");
        assert!(coordinator.state().last_update_success);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_refresh() {
        let source = ScriptedSource::new(benzin_payload()).with_delay(Duration::from_secs(5));
        let coordinator = Arc::new(FuelPriceCoordinator::with_timing(
            Arc::new(source),
            Duration::from_millis(10),
            Duration::from_secs(30),
        ));

        let task = coordinator.spawn_periodic();
        tokio::time::sleep(Duration::from_millis(60)).await;
        task.shutdown().await;

        let state = coordinator.state();
        assert!(!state.last_update_success);
        assert!(state.report.is_none());
        assert_eq!(state.last_failure.unwrap().kind, "cancelled");
    }
}
