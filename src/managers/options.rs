//! Options form controller.
//!
//! Holds the form state shown by the options page and turns user input into
//! settings writes: URL validation gates the monitoring toggle, the URL and
//! interval fields are saved debounced, checkboxes are saved immediately.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use url::Url;

use crate::managers::alert_window::render_page;
use crate::services::debounce::Debouncer;
use crate::services::localization_engine::{
    LocalizationEngine, LocalizationEngineTrait, SUPPORTED_LOCALES,
};
use crate::services::settings_store::{load_config, KeyValueStore};
use crate::types::errors::{LocaleError, StoreError};
use crate::types::settings::{MonitorTuning, SettingsKey};

const OPTIONS_TEMPLATE: &str = include_str!("../../resources/ui/options.html");

/// Everything the options page displays.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptionsView {
    pub url: String,
    pub url_valid: bool,
    /// Whether the monitoring checkbox can be switched on.
    pub monitoring_toggle_enabled: bool,
    pub monitoring_enabled: bool,
    pub interval_minutes: u32,
    pub keep_awake: bool,
    pub sound_enabled: bool,
    pub lang_override_enabled: bool,
    pub language: String,
    pub languages: Vec<String>,
    pub version: String,
}

impl Default for OptionsView {
    fn default() -> Self {
        Self {
            url: String::new(),
            url_valid: false,
            monitoring_toggle_enabled: false,
            monitoring_enabled: false,
            interval_minutes: 1,
            keep_awake: false,
            sound_enabled: false,
            lang_override_enabled: false,
            language: "en".to_string(),
            languages: SUPPORTED_LOCALES.iter().map(|s| s.to_string()).collect(),
            version: format!("v{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// One message posted by the options page.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsCommand {
    Ready,
    UrlInput(String),
    IntervalInput(String),
    SetKeepAwake(bool),
    SetSound(bool),
    SetMonitoring(bool),
    SetLanguageOverride(bool),
    SelectLanguage(String),
}

impl OptionsCommand {
    /// Parses `{"cmd": "...", "value": ...}`.
    pub fn from_ipc(message: &str) -> Option<Self> {
        let msg: Value = serde_json::from_str(message).ok()?;
        let cmd = msg.get("cmd")?.as_str()?;
        let value = msg.get("value");
        let text = || value.and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let flag = || value.and_then(Value::as_bool);

        match cmd {
            "ready" => Some(OptionsCommand::Ready),
            "url_input" => text().map(OptionsCommand::UrlInput),
            "interval_input" => text().map(OptionsCommand::IntervalInput),
            "set_keep_awake" => flag().map(OptionsCommand::SetKeepAwake),
            "set_sound" => flag().map(OptionsCommand::SetSound),
            "set_monitoring" => flag().map(OptionsCommand::SetMonitoring),
            "set_language_override" => flag().map(OptionsCommand::SetLanguageOverride),
            "select_language" => text().map(OptionsCommand::SelectLanguage),
            _ => None,
        }
    }
}

/// True for a syntactically valid absolute URL.
pub fn is_valid_monitor_url(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && Url::parse(trimmed).is_ok()
}

/// Parses the slider/number input the way `parseInt` would, then clamps
/// to at least one minute.
pub fn clamp_interval(raw: &str) -> u32 {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if negative || digits.is_empty() {
        return 1;
    }
    digits.parse::<u32>().unwrap_or(u32::MAX).max(1)
}

type SharedView = Arc<watch::Sender<OptionsView>>;

pub struct OptionsController {
    store: Arc<dyn KeyValueStore>,
    i18n: Arc<RwLock<LocalizationEngine>>,
    view: SharedView,
    validate_url: Debouncer,
    save_url: Debouncer,
    save_interval: Debouncer,
}

impl OptionsController {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        i18n: Arc<RwLock<LocalizationEngine>>,
        tuning: &MonitorTuning,
    ) -> Self {
        let (view, _) = watch::channel(OptionsView::default());
        Self {
            store,
            i18n,
            view: Arc::new(view),
            validate_url: Debouncer::new(tuning.url_validate_debounce),
            save_url: Debouncer::new(tuning.url_save_debounce),
            save_interval: Debouncer::new(tuning.interval_save_debounce),
        }
    }

    fn i18n_read(&self) -> RwLockReadGuard<'_, LocalizationEngine> {
        match self.i18n.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn i18n_write(&self) -> RwLockWriteGuard<'_, LocalizationEngine> {
        match self.i18n.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn view(&self) -> OptionsView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OptionsView> {
        self.view.subscribe()
    }

    async fn write(&self, key: SettingsKey, value: Value) {
        if let Err(e) = self.store.set(key.as_str(), value.clone()).await {
            tracing::warn!(key = key.as_str(), error = %e, "Options write failed");
        } else {
            tracing::info!(key = key.as_str(), %value, "Option saved");
        }
    }

    /// Fills the form from the store and activates the resolved language.
    pub async fn load(&self) -> Result<OptionsView, StoreError> {
        let config = load_config(self.store.as_ref()).await?;
        let language = self.i18n_write().activate(config.lang_override.as_deref());
        let url_valid = is_valid_monitor_url(&config.url);

        self.view.send_modify(|view| {
            view.url = config.url.clone();
            view.url_valid = url_valid;
            view.monitoring_toggle_enabled = url_valid;
            view.monitoring_enabled = config.enabled;
            view.interval_minutes = config.interval_minutes;
            view.keep_awake = config.keep_awake;
            view.sound_enabled = config.sound_enabled;
            view.lang_override_enabled = config.lang_override.is_some();
            view.language = language;
        });
        Ok(self.view())
    }

    /// URL field edited: validate after a short pause, save after a longer one.
    pub fn url_input(&self, text: &str) {
        let text = text.to_string();
        self.view.send_modify(|view| view.url = text.clone());

        let view = self.view.clone();
        let store = self.store.clone();
        let candidate = text.trim().to_string();
        self.validate_url.call(async move {
            let valid = is_valid_monitor_url(&candidate);
            let was_enabled = view.borrow().monitoring_enabled;
            view.send_modify(|v| {
                v.url_valid = valid;
                v.monitoring_toggle_enabled = valid;
                if !valid {
                    v.monitoring_enabled = false;
                }
            });
            if !valid && was_enabled {
                tracing::info!("Monitoring disabled: URL is not valid");
                if let Err(e) = store
                    .set(SettingsKey::MonitorEnabled.as_str(), Value::Bool(false))
                    .await
                {
                    tracing::warn!(error = %e, "Could not disable monitoring");
                }
            }
        });

        let view = self.view.clone();
        let store = self.store.clone();
        let trimmed = text.trim().to_string();
        self.save_url.call(async move {
            match store
                .set(SettingsKey::MonitorUrl.as_str(), Value::String(trimmed.clone()))
                .await
            {
                Ok(()) => tracing::info!(url = %trimmed, "monitorUrl saved"),
                Err(e) => tracing::warn!(error = %e, "Could not save monitorUrl"),
            }
            let valid = is_valid_monitor_url(&trimmed);
            view.send_modify(|v| v.monitoring_toggle_enabled = valid);
        });
    }

    /// Interval field edited. Shows the clamped value now, saves it later.
    pub fn interval_input(&self, raw: &str) -> u32 {
        let minutes = clamp_interval(raw);
        self.view.send_modify(|view| view.interval_minutes = minutes);

        let store = self.store.clone();
        self.save_interval.call(async move {
            match store
                .set(SettingsKey::CheckIntervalMinutes.as_str(), Value::from(minutes))
                .await
            {
                Ok(()) => tracing::info!(minutes, "Check interval saved"),
                Err(e) => tracing::warn!(error = %e, "Could not save check interval"),
            }
        });
        minutes
    }

    pub async fn set_keep_awake(&self, enabled: bool) {
        self.view.send_modify(|view| view.keep_awake = enabled);
        self.write(SettingsKey::KeepAwake, Value::Bool(enabled)).await;
    }

    pub async fn set_sound(&self, enabled: bool) {
        self.view.send_modify(|view| view.sound_enabled = enabled);
        self.write(SettingsKey::EnableSound, Value::Bool(enabled)).await;
    }

    /// Switches monitoring. Turning it on is refused while the URL is
    /// invalid. Returns the resulting state.
    pub async fn set_monitoring(&self, enabled: bool) -> bool {
        if enabled && !self.view.borrow().monitoring_toggle_enabled {
            tracing::info!("Monitoring toggle ignored: no valid URL");
            self.view.send_modify(|view| view.monitoring_enabled = false);
            return false;
        }
        self.view.send_modify(|view| view.monitoring_enabled = enabled);
        self.write(SettingsKey::MonitorEnabled, Value::Bool(enabled)).await;
        enabled
    }

    /// Turns the language override on (pinning the current language) or
    /// off (reverting to the host locale). Returns the active language.
    pub async fn set_language_override(&self, enabled: bool) -> String {
        if enabled {
            let current = self.view.borrow().language.clone();
            self.write(SettingsKey::LangOverride, Value::String(current.clone()))
                .await;
            self.view.send_modify(|view| view.lang_override_enabled = true);
            return current;
        }

        if let Err(e) = self.store.remove(SettingsKey::LangOverride.as_str()).await {
            tracing::warn!(error = %e, "Could not clear language override");
        }
        let language = self.i18n_write().activate(None);
        self.view.send_modify(|view| {
            view.lang_override_enabled = false;
            view.language = language.clone();
        });
        language
    }

    /// Picks an override language and applies it immediately.
    pub async fn select_language(&self, tag: &str) -> Result<String, LocaleError> {
        if !SUPPORTED_LOCALES.contains(&tag) {
            return Err(LocaleError::UnsupportedLocale(tag.to_string()));
        }
        self.write(SettingsKey::LangOverride, Value::String(tag.to_string()))
            .await;
        let language = self.i18n_write().activate(Some(tag));
        self.view.send_modify(|view| {
            view.lang_override_enabled = true;
            view.language = language.clone();
        });
        Ok(language)
    }

    /// Applies one page message. Returns true when the page must be
    /// re-rendered because the language changed.
    pub async fn handle(&self, command: OptionsCommand) -> bool {
        match command {
            OptionsCommand::Ready => {
                if let Err(e) = self.load().await {
                    tracing::warn!(error = %e, "Could not load options");
                }
                false
            }
            OptionsCommand::UrlInput(text) => {
                self.url_input(&text);
                false
            }
            OptionsCommand::IntervalInput(raw) => {
                self.interval_input(&raw);
                false
            }
            OptionsCommand::SetKeepAwake(enabled) => {
                self.set_keep_awake(enabled).await;
                false
            }
            OptionsCommand::SetSound(enabled) => {
                self.set_sound(enabled).await;
                false
            }
            OptionsCommand::SetMonitoring(enabled) => {
                self.set_monitoring(enabled).await;
                false
            }
            OptionsCommand::SetLanguageOverride(enabled) => {
                let before = self.view().language;
                self.set_language_override(enabled).await != before
            }
            OptionsCommand::SelectLanguage(tag) => {
                let before = self.view().language;
                match self.select_language(&tag).await {
                    Ok(language) => language != before,
                    Err(e) => {
                        tracing::warn!(error = %e, "Language not applied");
                        false
                    }
                }
            }
        }
    }

    /// Full HTML of the options page in the active language.
    pub fn render_html(&self) -> String {
        let i18n = self.i18n_read();
        let view = self.view();
        let mut slots = HashMap::new();
        slots.insert("lang", i18n.get_locale().to_string());
        slots.insert("version", view.version.clone());
        render_page(OPTIONS_TEMPLATE, &i18n, &slots)
    }
}

/// Script that pushes `view` into the rendered options page.
pub fn view_script(view: &OptionsView) -> String {
    let json = serde_json::to_string(view).unwrap_or_else(|_| "null".to_string());
    format!("if(typeof applyView==='function')applyView({})", json)
}
