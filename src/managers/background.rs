//! Background reactions: startup, settings changes and alarm fires.
//!
//! Keeps the `checkTickets` schedule consistent with the stored settings:
//! it exists only while monitoring is enabled and a URL is configured, and
//! always runs at the stored interval (minimum one minute).

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::managers::monitor::{CycleReport, Monitor};
use crate::services::config_cache::ConfigService;
use crate::services::power::{apply_keep_awake, PowerManager};
use crate::services::scheduler::{AlarmFire, Scheduler};
use crate::services::settings_store::{get_or_default, load_config, KeyValueStore};
use crate::types::settings::{
    interval_duration, interval_from_value, SettingsKey, StorageChange, ALARM_NAME,
};

pub struct Background {
    store: Arc<dyn KeyValueStore>,
    config: Arc<dyn ConfigService>,
    scheduler: Arc<dyn Scheduler>,
    monitor: Arc<Monitor>,
    power: Arc<dyn PowerManager>,
}

impl Background {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: Arc<dyn ConfigService>,
        scheduler: Arc<dyn Scheduler>,
        monitor: Arc<Monitor>,
        power: Arc<dyn PowerManager>,
    ) -> Self {
        Self {
            store,
            config,
            scheduler,
            monitor,
            power,
        }
    }

    fn spawn_check(&self) -> JoinHandle<CycleReport> {
        let monitor = self.monitor.clone();
        tokio::spawn(async move { monitor.check_page().await })
    }

    async fn stored_interval(&self) -> u32 {
        match get_or_default(self.store.as_ref(), SettingsKey::CheckIntervalMinutes).await {
            Ok(value) => interval_from_value(&value),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read interval, using default");
                interval_from_value(&SettingsKey::CheckIntervalMinutes.default_value())
            }
        }
    }

    async fn stored_enabled(&self) -> bool {
        match get_or_default(self.store.as_ref(), SettingsKey::MonitorEnabled).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read monitorEnabled");
                false
            }
        }
    }

    fn schedule(&self, minutes: u32) {
        self.scheduler
            .create(ALARM_NAME, interval_duration(minutes.max(1)));
    }

    /// Startup reconciliation.
    ///
    /// Applies keep-awake, then, when a URL is configured, either runs one
    /// check immediately and schedules the rest or clears the schedule.
    /// Returns the immediate check, if one was started.
    pub async fn init_monitoring(&self) -> Option<JoinHandle<CycleReport>> {
        let config = match load_config(self.store.as_ref()).await {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Could not load settings at startup");
                return None;
            }
        };

        apply_keep_awake(self.power.as_ref(), config.keep_awake);

        if self.config.monitor_url().is_none() {
            tracing::info!("Cannot start monitoring: no monitorUrl configured.");
            return None;
        }

        if config.enabled {
            let interval = config.interval_minutes.max(1);
            tracing::info!(interval, "Monitoring enabled on startup.");
            let check = self.spawn_check();
            self.schedule(interval);
            Some(check)
        } else {
            tracing::info!("Monitoring disabled on startup.");
            self.scheduler.clear(ALARM_NAME);
            None
        }
    }

    /// Reacts to one settings write. Returns the check it started, if any.
    pub async fn handle_change(&self, change: &StorageChange) -> Option<JoinHandle<CycleReport>> {
        match SettingsKey::parse(&change.key)? {
            SettingsKey::KeepAwake => {
                let enabled = change
                    .new_value
                    .as_ref()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                apply_keep_awake(self.power.as_ref(), enabled);
                None
            }
            SettingsKey::MonitorUrl => {
                self.config.apply_change(change);
                match self.config.monitor_url() {
                    None => {
                        tracing::info!("monitorUrl cleared");
                        if self.scheduler.clear(ALARM_NAME) {
                            tracing::info!("Monitoring stopped: no monitorUrl configured.");
                        }
                    }
                    Some(url) => {
                        tracing::info!(url = %url, "monitorUrl updated");
                        // The first check waits for the first fire.
                        if self.stored_enabled().await && !self.scheduler.is_scheduled(ALARM_NAME) {
                            let interval = self.stored_interval().await;
                            self.schedule(interval);
                        }
                    }
                }
                None
            }
            SettingsKey::MonitorEnabled => {
                let enabled = change
                    .new_value
                    .as_ref()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if !enabled {
                    tracing::info!("Monitoring disabled by user.");
                    self.scheduler.clear(ALARM_NAME);
                    return None;
                }
                if self.config.monitor_url().is_none() {
                    tracing::info!("Monitoring enable attempted, but no monitorUrl configured.");
                    return None;
                }
                tracing::info!("Monitoring enabled by user.");
                let check = self.spawn_check();
                let interval = self.stored_interval().await;
                self.schedule(interval);
                Some(check)
            }
            SettingsKey::CheckIntervalMinutes => {
                if !self.stored_enabled().await {
                    tracing::info!("Interval changed but monitoring is disabled.");
                    return None;
                }
                if self.config.monitor_url().is_none() {
                    tracing::info!("Interval changed, but no monitorUrl configured.");
                    return None;
                }
                let interval = match &change.new_value {
                    Some(value) => interval_from_value(value),
                    None => self.stored_interval().await,
                };
                tracing::info!(interval, "Updating alarm.");
                self.schedule(interval);
                None
            }
            _ => None,
        }
    }

    /// Reacts to one alarm fire. Returns the started check.
    ///
    /// Fires left in the queue by a schedule that has since been cleared or
    /// replaced are dropped.
    pub fn handle_alarm(&self, fire: &AlarmFire) -> Option<JoinHandle<CycleReport>> {
        if fire.name != ALARM_NAME {
            return None;
        }
        if !self.scheduler.is_current(fire) {
            tracing::debug!(generation = fire.generation, "Dropping stale alarm fire");
            return None;
        }
        if self.config.monitor_url().is_none() {
            tracing::info!("Alarm triggered but no monitorUrl configured.");
            return None;
        }
        tracing::info!(alarm = %fire.name, "Alarm triggered");
        Some(self.spawn_check())
    }

    /// Re-reads the URL and reconciles after change notifications were lost.
    async fn resync(&self) {
        match get_or_default(self.store.as_ref(), SettingsKey::MonitorUrl).await {
            Ok(url) => {
                self.config.apply_change(&StorageChange {
                    key: SettingsKey::MonitorUrl.as_str().to_string(),
                    old_value: None,
                    new_value: Some(url),
                });
            }
            Err(e) => tracing::warn!(error = %e, "Could not re-read monitorUrl"),
        }
        if self.config.monitor_url().is_none() {
            self.scheduler.clear(ALARM_NAME);
        } else if self.stored_enabled().await {
            let interval = self.stored_interval().await;
            self.schedule(interval);
        } else {
            self.scheduler.clear(ALARM_NAME);
        }
    }

    /// Event loop: settings changes and alarm fires until shutdown.
    pub async fn run(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<StorageChange>,
        mut alarms: mpsc::UnboundedReceiver<AlarmFire>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => {
                        self.handle_change(&change).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Missed settings changes, resyncing");
                        self.resync().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                alarm = alarms.recv() => match alarm {
                    Some(fire) => {
                        self.handle_alarm(&fire);
                    }
                    None => break,
                },
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Background loop stopped");
    }
}
