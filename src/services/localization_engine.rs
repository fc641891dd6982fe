use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use crate::types::errors::LocaleError;

/// Supported locales.
pub const SUPPORTED_LOCALES: &[&str] = &[
    "en", "es", "pt-BR", "pt-PT", "fr", "zh-Hans", "zh-Hant", "ja", "ko", "de", "it", "nl", "id",
    "ar", "ms", "pl", "sv", "fi", "tr", "hi",
];

/// Default locale when neither the override nor the host locale is supported.
pub const DEFAULT_LOCALE: &str = "en";

/// Trait defining the localization engine interface.
pub trait LocalizationEngineTrait {
    fn initialize(&mut self) -> Result<(), LocaleError>;
    fn set_locale(&mut self, lang: &str) -> Result<(), LocaleError>;
    fn get_locale(&self) -> &str;
    fn t(&self, key: &str, params: Option<&HashMap<String, String>>) -> String;
    fn apply_translations(&self, html: &str) -> String;
    fn detect_system_locale(&self) -> String;
    fn get_available_locales(&self) -> Vec<String>;
}

/// Picks the active language tag.
///
/// A supported override wins. Otherwise the host tag is normalized (`_` to
/// `-`), any Chinese tag maps to `zh-Hant` or `zh-Hans` by its region or
/// script suffix, then the exact tag, then its base language, then `en`.
pub fn resolve_language(lang_override: Option<&str>, host_locale: &str) -> String {
    if let Some(tag) = lang_override {
        if SUPPORTED_LOCALES.contains(&tag) {
            return tag.to_string();
        }
    }

    let tag = host_locale.trim().replacen('_', "-", 1);

    if tag.starts_with("zh") {
        let lower = tag.to_ascii_lowercase();
        let traditional = ["tw", "hk", "hant", "mo"]
            .iter()
            .any(|suffix| lower.ends_with(suffix));
        return if traditional { "zh-Hant" } else { "zh-Hans" }.to_string();
    }

    if SUPPORTED_LOCALES.contains(&tag.as_str()) {
        return tag;
    }

    let base = tag.split('-').next().unwrap_or_default();
    if SUPPORTED_LOCALES.contains(&base) {
        return base.to_string();
    }

    DEFAULT_LOCALE.to_string()
}

/// Reads the host locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, dropping the
/// encoding and modifier (`pt_BR.UTF-8@euro` becomes `pt_BR`).
pub fn host_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|raw| {
            raw.split(['.', '@'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .find(|tag| !tag.is_empty() && tag != "C" && tag != "POSIX")
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
}

/// Localization engine holding one translation tree per supported locale.
pub struct LocalizationEngine {
    /// Current active locale (e.g., "en" or "pt-BR").
    current_locale: String,
    /// Loaded locale data: maps locale name to its parsed JSON value.
    locales: HashMap<String, Value>,
    /// Path to the directory containing locale JSON files.
    locales_dir: PathBuf,
}

impl LocalizationEngine {
    /// Creates a new LocalizationEngine with the given locales directory path.
    pub fn new(locales_dir: impl Into<PathBuf>) -> Self {
        Self {
            current_locale: DEFAULT_LOCALE.to_string(),
            locales: HashMap::new(),
            locales_dir: locales_dir.into(),
        }
    }

    /// Creates a new LocalizationEngine using the platform locale directory.
    pub fn with_default_path() -> Self {
        Self::new(crate::platform::locales_dir())
    }

    /// Resolves the language for the given override and activates it,
    /// falling back to the default locale when that file failed to load.
    pub fn activate(&mut self, lang_override: Option<&str>) -> String {
        let tag = resolve_language(lang_override, &host_locale());
        if let Err(e) = self.set_locale(&tag) {
            tracing::warn!(locale = %tag, error = %e, "Falling back to default locale");
            self.current_locale = DEFAULT_LOCALE.to_string();
        }
        self.current_locale.clone()
    }

    /// Looks up a nested key in a JSON value using dot notation.
    /// For example, "alert.danger" looks up `value["alert"]["danger"]`.
    fn lookup_key<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
        let mut current = data;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Replaces `{param_name}` placeholders in a string with values from the params map.
    fn interpolate(template: &str, params: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in params {
            let placeholder = format!("{{{}}}", key);
            result = result.replace(&placeholder, value);
        }
        result
    }
}

impl LocalizationEngineTrait for LocalizationEngine {
    /// Loads all locale JSON files from the locales directory.
    fn initialize(&mut self) -> Result<(), LocaleError> {
        let dir = &self.locales_dir;

        if !dir.exists() {
            return Err(LocaleError::FileNotFound(dir.to_string_lossy().to_string()));
        }

        for locale in SUPPORTED_LOCALES {
            let file_path = dir.join(format!("{}.json", locale));
            if !file_path.exists() {
                tracing::debug!(locale, "No translation file");
                continue;
            }
            let content = fs::read_to_string(&file_path).map_err(|e| {
                LocaleError::FileNotFound(format!("{}: {}", file_path.to_string_lossy(), e))
            })?;
            let data: Value = serde_json::from_str(&content).map_err(|e| {
                LocaleError::ParseError(format!("{}: {}", file_path.to_string_lossy(), e))
            })?;
            self.locales.insert(locale.to_string(), data);
        }

        if self.locales.is_empty() {
            return Err(LocaleError::FileNotFound("No locale files found".to_string()));
        }

        Ok(())
    }

    /// Switches the active locale. Returns an error if the locale is not supported
    /// or not loaded.
    fn set_locale(&mut self, lang: &str) -> Result<(), LocaleError> {
        if !SUPPORTED_LOCALES.contains(&lang) {
            return Err(LocaleError::UnsupportedLocale(lang.to_string()));
        }
        if !self.locales.contains_key(lang) {
            return Err(LocaleError::FileNotFound(format!("Locale '{}' not loaded", lang)));
        }
        self.current_locale = lang.to_string();
        Ok(())
    }

    fn get_locale(&self) -> &str {
        &self.current_locale
    }

    /// Looks up a translation key using dot notation and optionally interpolates parameters.
    /// Returns the key itself if the translation is not found or empty.
    fn t(&self, key: &str, params: Option<&HashMap<String, String>>) -> String {
        let text = self
            .locales
            .get(&self.current_locale)
            .and_then(|data| Self::lookup_key(data, key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());

        match (text, params) {
            (Some(text), Some(p)) => Self::interpolate(text, p),
            (Some(text), None) => text.to_string(),
            (None, _) => key.to_string(),
        }
    }

    /// Replaces every `{{t:key}}` marker with its HTML-escaped translation.
    /// Unterminated markers are left as-is.
    fn apply_translations(&self, html: &str) -> String {
        const OPEN: &str = "{{t:";
        const CLOSE: &str = "}}";

        let mut out = String::with_capacity(html.len());
        let mut rest = html;
        while let Some(start) = rest.find(OPEN) {
            let after = &rest[start + OPEN.len()..];
            let Some(end) = after.find(CLOSE) else {
                break;
            };
            out.push_str(&rest[..start]);
            let key = after[..end].trim();
            out.push_str(&escape_html(&self.t(key, None)));
            rest = &after[end + CLOSE.len()..];
        }
        out.push_str(rest);
        out
    }

    /// Resolves the host locale with no override.
    fn detect_system_locale(&self) -> String {
        resolve_language(None, &host_locale())
    }

    /// Returns a list of all available (loaded) locales.
    fn get_available_locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = self.locales.keys().cloned().collect();
        locales.sort();
        locales
    }
}

/// Escapes text for safe insertion into HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
