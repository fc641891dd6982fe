//! Monitor cycle for ticketwatch.
//!
//! One cycle opens the configured dashboard in a hidden tab, waits for
//! load-complete plus the settle delay, scrapes the three counters, raises
//! an alert for every strict increase over the stored snapshot, persists
//! the new snapshot and closes the tab.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::services::config_cache::ConfigService;
use crate::services::notifier::{Notifier, ERROR_NOTIFICATION_TITLE};
use crate::services::page_loader::PageLoader;
use crate::services::settings_store::{get_or_default, load_snapshot, store_snapshot, KeyValueStore};
use crate::types::counters::{AlertEvent, Category, CounterSnapshot, Reading};
use crate::types::errors::{MonitorError, NotifyError};
use crate::types::settings::{MissingFieldPolicy, MonitorTuning, SettingsKey};
use crate::types::tab::TabId;

/// Host capability that shows one alert popup.
pub trait AlertPresenter: Send + Sync {
    fn spawn_alert(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}

/// Outcome of one [`Monitor::check_page`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// Nothing was opened: no URL, or another cycle was still running.
    Skipped(String),
    Completed {
        alerts: Vec<AlertEvent>,
        snapshot: CounterSnapshot,
    },
    /// The cycle aborted; the message was also sent as a notification.
    Failed(String),
}

/// Categories whose fresh reading is strictly greater than the stored one.
pub fn diff_counters(previous: &CounterSnapshot, current: &CounterSnapshot) -> Vec<AlertEvent> {
    Category::ALL
        .iter()
        .filter_map(|&category| {
            let fresh = current.get(category);
            if fresh.is_increase_over(&previous.get(category)) {
                fresh.count().map(|n| AlertEvent::new(category, n))
            } else {
                None
            }
        })
        .collect()
}

/// The snapshot to persist after a cycle.
pub fn next_snapshot(
    policy: MissingFieldPolicy,
    previous: &CounterSnapshot,
    current: &CounterSnapshot,
) -> CounterSnapshot {
    match policy {
        MissingFieldPolicy::StoreUnreadable => *current,
        MissingFieldPolicy::KeepPrevious => {
            let mut next = *current;
            for category in Category::ALL {
                if next.get(category) == Reading::Unreadable {
                    next.set(category, previous.get(category));
                }
            }
            next
        }
    }
}

/// Resets the in-progress flag when a cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Monitor {
    store: Arc<dyn KeyValueStore>,
    config: Arc<dyn ConfigService>,
    loader: Arc<dyn PageLoader>,
    alerts: Arc<dyn AlertPresenter>,
    notifier: Arc<dyn Notifier>,
    tuning: MonitorTuning,
    running: AtomicBool,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: Arc<dyn ConfigService>,
        loader: Arc<dyn PageLoader>,
        alerts: Arc<dyn AlertPresenter>,
        notifier: Arc<dyn Notifier>,
        tuning: MonitorTuning,
    ) -> Self {
        Self {
            store,
            config,
            loader,
            alerts,
            notifier,
            tuning,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs one monitor cycle. Never panics or propagates: failures are
    /// logged, notified, and reported as [`CycleReport::Failed`].
    pub async fn check_page(&self) -> CycleReport {
        tracing::info!("Starting checkPage...");

        let Some(url) = self.config.monitor_url() else {
            tracing::info!("No monitorUrl configured. Skipping check.");
            return CycleReport::Skipped("no monitorUrl configured".to_string());
        };

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Previous check still running. Skipping this one.");
            return CycleReport::Skipped("check already in progress".to_string());
        }
        let _guard = CycleGuard(&self.running);

        match self.run_cycle(&url).await {
            Ok((alerts, snapshot)) => CycleReport::Completed { alerts, snapshot },
            Err(e) => {
                tracing::error!(error = %e, "Error during checkPage");
                if let Err(notify_err) = self.notifier.notify(ERROR_NOTIFICATION_TITLE, &e.to_string()) {
                    tracing::warn!(error = %notify_err, "Could not show error notification");
                }
                CycleReport::Failed(e.to_string())
            }
        }
    }

    async fn run_cycle(&self, url: &str) -> Result<(Vec<AlertEvent>, CounterSnapshot), MonitorError> {
        let tab = self.loader.open_tab(url).await?;
        tracing::info!(tab = %tab, "Tab opened");

        let result = self.scrape_and_reconcile(&tab).await;

        match self.loader.close_tab(&tab).await {
            Ok(()) => tracing::info!(tab = %tab, "Tab closed"),
            Err(e) => tracing::warn!(tab = %tab, error = %e, "Tab close failed"),
        }
        result
    }

    async fn scrape_and_reconcile(
        &self,
        tab: &TabId,
    ) -> Result<(Vec<AlertEvent>, CounterSnapshot), MonitorError> {
        self.loader.wait_for_complete(tab).await?;
        tracing::info!(tab = %tab, "Tab load event fired");

        tracing::info!(
            secs = self.tuning.settle_delay.as_secs_f32(),
            "Waiting for page content..."
        );
        tokio::time::sleep(self.tuning.settle_delay).await;

        let scraped = self.loader.extract_counters(tab).await?;
        let current = scraped.to_snapshot();
        tracing::info!(?current, "Current values");

        let previous = load_snapshot(self.store.as_ref()).await?;
        tracing::info!(?previous, "Last stored values");

        let alerts = diff_counters(&previous, &current);
        for event in &alerts {
            tracing::info!(category = event.category.as_str(), value = event.new_value, "Counter increased!");
            if let Err(e) = self.alerts.spawn_alert(event) {
                tracing::warn!(category = event.category.as_str(), error = %e, "Alert window failed");
            }
        }

        let policy = get_or_default(self.store.as_ref(), SettingsKey::MissingFieldPolicy)
            .await
            .ok()
            .and_then(|v| v.as_str().and_then(MissingFieldPolicy::parse))
            .unwrap_or_default();
        let next = next_snapshot(policy, &previous, &current);

        match store_snapshot(self.store.as_ref(), &next).await {
            Ok(()) => tracing::info!(?next, "Stored new values"),
            Err(e) => tracing::warn!(error = %e, "Storing new values failed"),
        }

        Ok((alerts, next))
    }
}
