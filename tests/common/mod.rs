//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, Notify};

use ticketwatch::managers::monitor::{AlertPresenter, Monitor};
use ticketwatch::services::config_cache::{ConfigCache, ConfigService};
use ticketwatch::services::notifier::Notifier;
use ticketwatch::services::page_loader::PageLoader;
use ticketwatch::services::power::PowerManager;
use ticketwatch::services::scheduler::{AlarmFire, Scheduler};
use ticketwatch::services::settings_store::{KeyValueStore, SqliteStore};
use ticketwatch::services::sound::SoundPlayer;
use ticketwatch::types::counters::{AlertEvent, ScrapedCounters};
use ticketwatch::types::errors::{NotifyError, PageError, PlaybackError, PowerError, StoreError};
use ticketwatch::types::settings::{MonitorTuning, StorageChange};
use ticketwatch::types::tab::TabId;

pub fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

/// Tuning with the real timings; tests run on paused time.
pub fn tuning() -> MonitorTuning {
    MonitorTuning::default()
}

pub fn locales_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("locales")
}

pub fn assets_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("assets")
}

// ─── Page loader ───

#[derive(Default)]
pub struct FakeLoader {
    pub counters: Mutex<ScrapedCounters>,
    pub fail_open: Mutex<Option<String>>,
    pub fail_load: Mutex<Option<String>>,
    pub fail_extract: Mutex<Option<String>>,
    pub gate: Mutex<Option<Arc<Notify>>>,
    pub opened: Mutex<Vec<String>>,
    pub closed: Mutex<Vec<TabId>>,
}

impl FakeLoader {
    pub fn with_counters(danger: &str, success: &str, warning: &str) -> Self {
        let loader = Self::default();
        loader.set_counters(Some(danger), Some(success), Some(warning));
        loader
    }

    pub fn set_counters(&self, danger: Option<&str>, success: Option<&str>, warning: Option<&str>) {
        *self.counters.lock().unwrap() = ScrapedCounters {
            danger: danger.map(str::to_string),
            success: success.map(str::to_string),
            warning: warning.map(str::to_string),
        };
    }

    /// Makes `wait_for_complete` block until the returned handle is notified.
    pub fn hold_loading(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn opened_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.lock().unwrap().len()
    }
}

#[async_trait]
impl PageLoader for FakeLoader {
    async fn open_tab(&self, url: &str) -> Result<TabId, PageError> {
        if let Some(msg) = self.fail_open.lock().unwrap().clone() {
            return Err(PageError::OpenFailed(msg));
        }
        self.opened.lock().unwrap().push(url.to_string());
        Ok(TabId::new())
    }

    async fn wait_for_complete(&self, _tab: &TabId) -> Result<(), PageError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.fail_load.lock().unwrap().clone() {
            Some(msg) => Err(PageError::LoadFailed(msg)),
            None => Ok(()),
        }
    }

    async fn extract_counters(&self, _tab: &TabId) -> Result<ScrapedCounters, PageError> {
        if let Some(msg) = self.fail_extract.lock().unwrap().clone() {
            return Err(PageError::InjectionFailed(msg));
        }
        Ok(self.counters.lock().unwrap().clone())
    }

    async fn close_tab(&self, tab: &TabId) -> Result<(), PageError> {
        self.closed.lock().unwrap().push(tab.clone());
        Ok(())
    }
}

// ─── Alerts and notifications ───

#[derive(Default)]
pub struct RecordingAlerts {
    pub events: Mutex<Vec<AlertEvent>>,
}

impl AlertPresenter for RecordingAlerts {
    fn spawn_alert(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

impl RecordingAlerts {
    pub fn taken(&self) -> Vec<AlertEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        Ok(())
    }
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

// ─── Power ───

#[derive(Default)]
pub struct FakePower {
    pub active: AtomicBool,
    pub requests: AtomicUsize,
    pub releases: AtomicUsize,
}

impl PowerManager for FakePower {
    fn request_keep_awake(&self) -> Result<(), PowerError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release_keep_awake(&self) -> Result<(), PowerError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ─── Scheduler ───

/// Records schedule state without spawning timers.
#[derive(Default)]
pub struct FakeScheduler {
    pub entries: Mutex<HashMap<String, (Duration, u64)>>,
    pub creates: AtomicUsize,
    generations: AtomicU64,
}

impl FakeScheduler {
    /// The fire the active schedule `name` would deliver next.
    pub fn fire(&self, name: &str) -> Option<AlarmFire> {
        self.entries
            .lock()
            .unwrap()
            .get(name)
            .map(|(_, generation)| AlarmFire::new(name, *generation))
    }
}

impl Scheduler for FakeScheduler {
    fn create(&self, name: &str, period: Duration) {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries
            .lock()
            .unwrap()
            .insert(name.to_string(), (period, generation));
    }

    fn clear(&self, name: &str) -> bool {
        self.entries.lock().unwrap().remove(name).is_some()
    }

    fn is_scheduled(&self, name: &str) -> bool {
        self.entries.lock().unwrap().contains_key(name)
    }

    fn period(&self, name: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(name).map(|(period, _)| *period)
    }

    fn is_current(&self, fire: &AlarmFire) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(&fire.name)
            .map(|(_, generation)| *generation == fire.generation)
            .unwrap_or(false)
    }
}

// ─── Sound ───

/// Fails the first `failures` plays, then succeeds.
#[derive(Default)]
pub struct FakePlayer {
    pub failures: AtomicUsize,
    pub attempts: Mutex<Vec<(PathBuf, f32)>>,
}

impl FakePlayer {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl SoundPlayer for FakePlayer {
    fn play(&self, path: &Path, volume: f32) -> Result<(), PlaybackError> {
        self.attempts
            .lock()
            .unwrap()
            .push((path.to_path_buf(), volume));
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(PlaybackError::NoOutputDevice("test device busy".to_string()));
        }
        Ok(())
    }
}

// ─── Store wrapper ───

/// Delegates to an in-memory store, failing reads or writes on demand.
pub struct FlakyStore {
    pub inner: Arc<SqliteStore>,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: memory_store(),
            fail_get: AtomicBool::new(false),
            fail_set: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::DatabaseError("read refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(StoreError::DatabaseError("write refused".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.subscribe()
    }
}

// ─── Monitor harness ───

pub struct Harness {
    pub store: Arc<dyn KeyValueStore>,
    pub config: Arc<ConfigCache>,
    pub loader: Arc<FakeLoader>,
    pub alerts: Arc<RecordingAlerts>,
    pub notifier: Arc<RecordingNotifier>,
    pub monitor: Arc<Monitor>,
}

pub fn harness_with_store(store: Arc<dyn KeyValueStore>, url: &str, loader: FakeLoader) -> Harness {
    let config = Arc::new(ConfigCache::with_url(url));
    let loader = Arc::new(loader);
    let alerts = Arc::new(RecordingAlerts::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = Arc::new(Monitor::new(
        store.clone(),
        config.clone() as Arc<dyn ConfigService>,
        loader.clone(),
        alerts.clone(),
        notifier.clone(),
        tuning(),
    ));
    Harness {
        store,
        config,
        loader,
        alerts,
        notifier,
        monitor,
    }
}

pub fn harness(url: &str, loader: FakeLoader) -> Harness {
    harness_with_store(memory_store(), url, loader)
}
