//! App Core for ticketwatch.
//!
//! Owns the settings store, the scheduler, the monitor and the options
//! controller, and wires them to whatever host provides tabs and windows.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::database::connection::Database;
use crate::managers::background::Background;
use crate::managers::monitor::{AlertPresenter, CycleReport, Monitor};
use crate::managers::options::OptionsController;
use crate::platform;
use crate::services::config_cache::{ConfigCache, ConfigService};
use crate::services::localization_engine::{LocalizationEngine, LocalizationEngineTrait};
use crate::services::notifier::Notifier;
use crate::services::page_loader::PageLoader;
use crate::services::power::PowerManager;
use crate::services::scheduler::{AlarmFire, Scheduler, TokioScheduler};
use crate::services::settings_store::{load_config, KeyValueStore, SqliteStore};
use crate::services::sound::SoundPlayer;
use crate::types::errors::StoreError;
use crate::types::settings::{MonitorTuning, ALARM_NAME};

/// Capabilities the embedding host lends to the app.
pub struct HostCapabilities {
    pub loader: Arc<dyn PageLoader>,
    pub alerts: Arc<dyn AlertPresenter>,
    pub notifier: Arc<dyn Notifier>,
    pub power: Arc<dyn PowerManager>,
    pub sound: Arc<dyn SoundPlayer>,
}

pub struct App {
    pub store: Arc<dyn KeyValueStore>,
    pub config: Arc<ConfigCache>,
    pub scheduler: Arc<TokioScheduler>,
    pub i18n: Arc<RwLock<LocalizationEngine>>,
    pub background: Arc<Background>,
    pub options: Arc<OptionsController>,
    pub sound: Arc<dyn SoundPlayer>,
    pub power: Arc<dyn PowerManager>,
    pub tuning: MonitorTuning,
    pub assets_dir: PathBuf,
    alarms: Mutex<Option<mpsc::UnboundedReceiver<AlarmFire>>>,
    shutdown: watch::Sender<bool>,
}

impl App {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        host: HostCapabilities,
        i18n: LocalizationEngine,
        tuning: MonitorTuning,
        assets_dir: PathBuf,
    ) -> Self {
        let config = Arc::new(ConfigCache::new());
        let (scheduler, alarms) = TokioScheduler::new();
        let scheduler = Arc::new(scheduler);
        let i18n = Arc::new(RwLock::new(i18n));

        let monitor = Arc::new(Monitor::new(
            store.clone(),
            config.clone() as Arc<dyn ConfigService>,
            host.loader,
            host.alerts,
            host.notifier,
            tuning.clone(),
        ));
        let background = Arc::new(Background::new(
            store.clone(),
            config.clone() as Arc<dyn ConfigService>,
            scheduler.clone() as Arc<dyn Scheduler>,
            monitor,
            host.power.clone(),
        ));
        let options = Arc::new(OptionsController::new(store.clone(), i18n.clone(), &tuning));
        let (shutdown, _) = watch::channel(false);

        Self {
            store,
            config,
            scheduler,
            i18n,
            background,
            options,
            sound: host.sound,
            power: host.power,
            tuning,
            assets_dir,
            alarms: Mutex::new(Some(alarms)),
            shutdown,
        }
    }

    /// Opens the settings database in the data directory and uses the
    /// bundled locales and assets.
    pub fn open_default(host: HostCapabilities) -> Result<Self, StoreError> {
        let path = platform::database_path();
        let db = Database::open(&path).map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        tracing::info!(path = %path.display(), "Settings database opened");
        Ok(Self::new(
            Arc::new(SqliteStore::new(db)),
            host,
            LocalizationEngine::with_default_path(),
            MonitorTuning::default(),
            platform::assets_dir(),
        ))
    }

    /// Startup sequence: load translations, activate the resolved language,
    /// start listening for changes and alarm fires, then reconcile the
    /// schedule with the stored settings.
    ///
    /// Returns the immediate check started by reconciliation, if any. Only
    /// the first call starts the event loop.
    pub async fn startup(&self) -> Option<JoinHandle<CycleReport>> {
        let config = match load_config(self.store.as_ref()).await {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Could not read settings");
                Default::default()
            }
        };

        {
            let mut i18n = match self.i18n.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Err(e) = i18n.initialize() {
                tracing::warn!(error = %e, "Translations unavailable");
            }
            let language = i18n.activate(config.lang_override.as_deref());
            tracing::info!(language = %language, "Language resolved");
        }

        if let Err(e) = self.config.refresh(self.store.as_ref()).await {
            tracing::warn!(error = %e, "Could not load monitorUrl");
        }

        let alarms = match self.alarms.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(alarms) = alarms {
            let changes = self.store.subscribe();
            let background = self.background.clone();
            tokio::spawn(background.run(changes, alarms, self.shutdown.subscribe()));
        }

        self.background.init_monitoring().await
    }

    /// True when no monitor URL is configured yet.
    pub fn needs_setup(&self) -> bool {
        self.config.monitor_url().is_none()
    }

    /// Shutdown sequence: stop the event loop, drop the schedule and give
    /// back any keep-awake request.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.scheduler.clear(ALARM_NAME);
        if self.power.is_active() {
            if let Err(e) = self.power.release_keep_awake() {
                tracing::warn!(error = %e, "Could not release keep-awake");
            }
        }
        tracing::info!("ticketwatch stopped");
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the
/// default filter. The RPC binary logs to stderr since stdout carries
/// protocol frames.
pub fn init_tracing(to_stderr: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ticketwatch=info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if to_stderr {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {}", e);
    }
}
