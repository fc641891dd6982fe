//! Alert popup: locator parameters, page rendering and sound.
//!
//! Every locator parameter is untrusted display data. The page only ever
//! shows escaped text, takes its colour from the parsed category, and plays
//! a sound only if it is one of the bundled category sounds.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use url::Url;

use crate::services::localization_engine::{escape_html, LocalizationEngine, LocalizationEngineTrait};
use crate::services::settings_store::{get_or_default, KeyValueStore};
use crate::services::sound::{play_alert_sound, resolve_sound_path, PlaybackOutcome, SoundPlayer};
use crate::types::counters::{AlertEvent, Category};
use crate::types::settings::{MonitorTuning, SettingsKey};

/// Base locator of the alert page served by the host.
pub const ALERT_LOCATOR: &str = "ticketwatch://localhost/alert";

/// Background for an unknown `type` parameter.
pub const NEUTRAL_COLOR: &str = "#333";

const ALERT_TEMPLATE: &str = include_str!("../../resources/ui/alert.html");

/// Query parameters of one alert popup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertParams {
    pub alert_type: String,
    pub title: String,
    pub color: String,
    pub sound: String,
    pub value: String,
}

impl AlertParams {
    pub fn from_event(event: &AlertEvent) -> Self {
        Self {
            alert_type: event.category.as_str().to_string(),
            title: event.category.default_title().to_string(),
            color: event.category.color().to_string(),
            sound: event.sound_file.clone(),
            value: event.new_value.to_string(),
        }
    }

    /// `ticketwatch://localhost/alert?type=..&title=..&color=..&sound=..&value=..`
    pub fn to_locator(&self) -> String {
        let mut url = match Url::parse(ALERT_LOCATOR) {
            Ok(url) => url,
            Err(_) => return ALERT_LOCATOR.to_string(),
        };
        url.query_pairs_mut()
            .append_pair("type", &self.alert_type)
            .append_pair("title", &self.title)
            .append_pair("color", &self.color)
            .append_pair("sound", &self.sound)
            .append_pair("value", &self.value);
        url.to_string()
    }

    /// Reads the parameters from a full locator or a bare query string.
    /// Missing parameters are empty; repeated ones keep the first value.
    pub fn from_query(locator: &str) -> Self {
        let query = match Url::parse(locator) {
            Ok(url) => url.query().unwrap_or_default().to_string(),
            Err(_) => locator.trim_start_matches('?').to_string(),
        };

        let mut params = Self::default();
        let mut seen = HashSet::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if !seen.insert(key.to_string()) {
                continue;
            }
            let slot = match key.as_ref() {
                "type" => &mut params.alert_type,
                "title" => &mut params.title,
                "color" => &mut params.color,
                "sound" => &mut params.sound,
                "value" => &mut params.value,
                _ => continue,
            };
            *slot = value.into_owned();
        }
        params
    }

    pub fn category(&self) -> Option<Category> {
        Category::parse(&self.alert_type)
    }
}

/// Display values of an alert, before HTML rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertView {
    pub category: Option<Category>,
    pub title: String,
    pub details: String,
    pub color: &'static str,
}

/// Resolves title, details and colour.
///
/// The title is the translated `alert.<category>`, then the `title`
/// parameter, then the translated generic `alert.title`.
pub fn build_alert_view(params: &AlertParams, i18n: &LocalizationEngine) -> AlertView {
    let category = params.category();
    let generic = || i18n.t("alert.title", None);

    let title = match category {
        Some(c) => {
            let key = format!("alert.{}", c.as_str());
            let translated = i18n.t(&key, None);
            if translated != key {
                translated
            } else if !params.title.trim().is_empty() {
                params.title.clone()
            } else {
                generic()
            }
        }
        None => generic(),
    };

    let mut values = HashMap::new();
    values.insert("value".to_string(), params.value.clone());
    let details = match i18n.t("alert.details", Some(&values)) {
        d if d == "alert.details" => format!("Current Ticket Count: {}", params.value),
        d => d,
    };

    AlertView {
        category,
        title,
        details,
        color: category.map(|c| c.color()).unwrap_or(NEUTRAL_COLOR),
    }
}

/// Fills `{{name}}` slots and `{{t:key}}` translations in one pass.
///
/// Every substituted value is HTML-escaped, and substituted text is never
/// scanned again. Unknown slots are left untouched.
pub fn render_page(template: &str, i18n: &LocalizationEngine, slots: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = after[..end].trim();
        if let Some(key) = name.strip_prefix("t:") {
            out.push_str(&escape_html(&i18n.t(key.trim(), None)));
        } else if let Some(value) = slots.get(name) {
            out.push_str(&escape_html(value));
        } else {
            out.push_str(&rest[start..start + 2 + end + 2]);
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

/// Full HTML of the alert popup.
pub fn render_alert_html(params: &AlertParams, i18n: &LocalizationEngine) -> String {
    let view = build_alert_view(params, i18n);
    let mut slots = HashMap::new();
    slots.insert("lang", i18n.get_locale().to_string());
    slots.insert("title", view.title);
    slots.insert("details", view.details);
    slots.insert("color", view.color.to_string());
    render_page(ALERT_TEMPLATE, i18n, &slots)
}

/// Runs when the popup has rendered: plays the alert sound if the
/// `enableSound` preference is on at this moment.
pub async fn on_alert_ready(
    store: &dyn KeyValueStore,
    player: Arc<dyn SoundPlayer>,
    assets_dir: &Path,
    params: &AlertParams,
    tuning: &MonitorTuning,
) -> PlaybackOutcome {
    let enabled = match get_or_default(store, SettingsKey::EnableSound).await {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read enableSound");
            false
        }
    };
    if !enabled || params.sound.is_empty() {
        tracing::debug!(sound = %params.sound, "Alert sound skipped");
        return PlaybackOutcome::Skipped;
    }

    let path = match resolve_sound_path(assets_dir, &params.sound) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "Refusing to play alert sound");
            return PlaybackOutcome::Failed(e.to_string());
        }
    };

    play_alert_sound(player, path, tuning.volume, tuning.playback_retry_delay).await
}
