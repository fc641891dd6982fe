use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the periodic task that drives the monitor.
pub const ALARM_NAME: &str = "checkTickets";

/// Default check interval when none is stored.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 1;

/// Keys of the flat settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    MonitorUrl,
    MonitorEnabled,
    CheckIntervalMinutes,
    KeepAwake,
    EnableSound,
    Danger,
    Success,
    Warning,
    LangOverride,
    MissingFieldPolicy,
}

impl SettingsKey {
    pub const ALL: [SettingsKey; 10] = [
        SettingsKey::MonitorUrl,
        SettingsKey::MonitorEnabled,
        SettingsKey::CheckIntervalMinutes,
        SettingsKey::KeepAwake,
        SettingsKey::EnableSound,
        SettingsKey::Danger,
        SettingsKey::Success,
        SettingsKey::Warning,
        SettingsKey::LangOverride,
        SettingsKey::MissingFieldPolicy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsKey::MonitorUrl => "monitorUrl",
            SettingsKey::MonitorEnabled => "monitorEnabled",
            SettingsKey::CheckIntervalMinutes => "checkIntervalMinutes",
            SettingsKey::KeepAwake => "keepAwake",
            SettingsKey::EnableSound => "enableSound",
            SettingsKey::Danger => "danger",
            SettingsKey::Success => "success",
            SettingsKey::Warning => "warning",
            SettingsKey::LangOverride => "langOverride",
            SettingsKey::MissingFieldPolicy => "missingFieldPolicy",
        }
    }

    pub fn parse(key: &str) -> Option<SettingsKey> {
        Self::ALL.iter().copied().find(|k| k.as_str() == key)
    }

    /// Value returned when the key has never been written.
    pub fn default_value(&self) -> Value {
        match self {
            SettingsKey::MonitorUrl => Value::String(String::new()),
            SettingsKey::MonitorEnabled
            | SettingsKey::KeepAwake
            | SettingsKey::EnableSound => Value::Bool(false),
            SettingsKey::CheckIntervalMinutes => Value::from(DEFAULT_INTERVAL_MINUTES),
            SettingsKey::Danger | SettingsKey::Success | SettingsKey::Warning => Value::from(0),
            SettingsKey::LangOverride => Value::Null,
            SettingsKey::MissingFieldPolicy => {
                Value::String(MissingFieldPolicy::default().as_str().to_string())
            }
        }
    }
}

/// One store write as seen by listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl StorageChange {
    pub fn is(&self, key: SettingsKey) -> bool {
        self.key == key.as_str()
    }
}

/// What to store for a category whose scraped value was unreadable.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MissingFieldPolicy {
    /// Store the unreadable marker (`null`) as-is.
    #[default]
    #[serde(rename = "store-unreadable")]
    StoreUnreadable,
    /// Keep the previously stored reading for that category.
    #[serde(rename = "keep-previous")]
    KeepPrevious,
}

impl MissingFieldPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingFieldPolicy::StoreUnreadable => "store-unreadable",
            MissingFieldPolicy::KeepPrevious => "keep-previous",
        }
    }

    pub fn parse(value: &str) -> Option<MissingFieldPolicy> {
        match value {
            "store-unreadable" => Some(MissingFieldPolicy::StoreUnreadable),
            "keep-previous" => Some(MissingFieldPolicy::KeepPrevious),
            _ => None,
        }
    }
}

/// User-facing monitor preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    pub url: String,
    pub enabled: bool,
    pub interval_minutes: u32,
    pub keep_awake: bool,
    pub sound_enabled: bool,
    pub lang_override: Option<String>,
    pub missing_field_policy: MissingFieldPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            enabled: false,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            keep_awake: false,
            sound_enabled: false,
            lang_override: None,
            missing_field_policy: MissingFieldPolicy::default(),
        }
    }
}

impl MonitorConfig {
    /// The configured URL, or `None` when it is empty.
    pub fn url(&self) -> Option<&str> {
        let trimmed = self.url.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Coerces a stored interval to whole minutes, never below 1.
pub fn interval_from_value(value: &Value) -> u32 {
    let minutes = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    };
    if !minutes.is_finite() || minutes < 1.0 {
        return 1;
    }
    minutes.min(u32::MAX as f64) as u32
}

pub fn interval_duration(minutes: u32) -> Duration {
    Duration::from_secs(u64::from(minutes.max(1)) * 60)
}

/// Fixed timings and geometry of the monitor and its windows.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorTuning {
    /// Wait after load-complete so client-rendered content can populate.
    pub settle_delay: Duration,
    pub playback_retry_delay: Duration,
    pub volume: f32,
    pub alert_width: u32,
    pub alert_height: u32,
    pub alert_left: i32,
    pub alert_top: i32,
    pub url_validate_debounce: Duration,
    pub url_save_debounce: Duration,
    pub interval_save_debounce: Duration,
}

impl Default for MonitorTuning {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(20),
            playback_retry_delay: Duration::from_secs(1),
            volume: 0.7,
            alert_width: 400,
            alert_height: 200,
            alert_left: 100,
            alert_top: 100,
            url_validate_debounce: Duration::from_millis(300),
            url_save_debounce: Duration::from_millis(800),
            interval_save_debounce: Duration::from_millis(500),
        }
    }
}
