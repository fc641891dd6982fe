//! RPC method handler for the ticketwatch JSON-RPC protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be unit-tested. Methods read
//! and write the same settings store the monitor uses, with the same
//! validation the options page applies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use crate::managers::options::is_valid_monitor_url;
use crate::services::localization_engine::{
    host_locale, resolve_language, LocalizationEngine, LocalizationEngineTrait, SUPPORTED_LOCALES,
};
use crate::services::settings_store::{
    get_or_default, load_snapshot, store_snapshot, validate_setting, KeyValueStore,
};
use crate::types::counters::{Category, CounterSnapshot};
use crate::types::settings::SettingsKey;

/// State shared by every RPC call.
pub struct RpcContext {
    pub store: Arc<dyn KeyValueStore>,
    pub i18n: Mutex<LocalizationEngine>,
}

impl RpcContext {
    pub fn new(store: Arc<dyn KeyValueStore>, i18n: LocalizationEngine) -> Self {
        Self {
            store,
            i18n: Mutex::new(i18n),
        }
    }
}

fn str_param<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

/// Dispatch a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(ctx: &RpcContext, method: &str, params: &Value) -> Result<Value, String> {
    let store = ctx.store.as_ref();
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Settings ───
        "settings.get" => match str_param(params, "key") {
            Some(name) => {
                let key = SettingsKey::parse(name).ok_or_else(|| format!("unknown key: {}", name))?;
                let value = get_or_default(store, key).await.map_err(|e| e.to_string())?;
                Ok(json!({"key": name, "value": value}))
            }
            None => {
                let mut all = Map::new();
                for key in SettingsKey::ALL {
                    let value = get_or_default(store, key).await.map_err(|e| e.to_string())?;
                    all.insert(key.as_str().to_string(), value);
                }
                Ok(Value::Object(all))
            }
        },
        "settings.set" => {
            let name = str_param(params, "key").ok_or("missing key")?;
            let raw = params.get("value").cloned().ok_or("missing value")?;
            let (key, value) = validate_setting(name, raw).map_err(|e| e.to_string())?;

            if key == SettingsKey::MonitorEnabled && value == Value::Bool(true) {
                let url = get_or_default(store, SettingsKey::MonitorUrl)
                    .await
                    .map_err(|e| e.to_string())?;
                if !is_valid_monitor_url(url.as_str().unwrap_or_default()) {
                    return Err("cannot enable monitoring without a valid monitorUrl".to_string());
                }
            }

            store.set(key.as_str(), value.clone()).await.map_err(|e| e.to_string())?;

            let mut monitoring_disabled = false;
            if key == SettingsKey::MonitorUrl && !is_valid_monitor_url(value.as_str().unwrap_or_default()) {
                let enabled = get_or_default(store, SettingsKey::MonitorEnabled)
                    .await
                    .map_err(|e| e.to_string())?;
                if enabled == Value::Bool(true) {
                    store
                        .set(SettingsKey::MonitorEnabled.as_str(), Value::Bool(false))
                        .await
                        .map_err(|e| e.to_string())?;
                    monitoring_disabled = true;
                }
            }
            Ok(json!({"ok": true, "key": name, "value": value, "monitoring_disabled": monitoring_disabled}))
        }
        "settings.reset" => {
            let name = str_param(params, "key").ok_or("missing key")?;
            let key = SettingsKey::parse(name).ok_or_else(|| format!("unknown key: {}", name))?;
            store.remove(key.as_str()).await.map_err(|e| e.to_string())?;
            let value = get_or_default(store, key).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true, "key": name, "value": value}))
        }

        // ─── Snapshot ───
        "snapshot.get" => {
            let snapshot = load_snapshot(store).await.map_err(|e| e.to_string())?;
            let mut out = Map::new();
            for category in Category::ALL {
                out.insert(category.as_str().to_string(), snapshot.get(category).to_value());
            }
            Ok(Value::Object(out))
        }
        "snapshot.reset" => {
            store_snapshot(store, &CounterSnapshot::default())
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Localization ───
        "i18n.locales" => Ok(json!(SUPPORTED_LOCALES)),
        "i18n.resolve" => {
            let host = str_param(params, "host")
                .map(str::to_string)
                .unwrap_or_else(host_locale);
            let language = resolve_language(str_param(params, "override"), &host);
            Ok(json!({"language": language}))
        }
        "i18n.t" => {
            let key = str_param(params, "key").ok_or("missing key")?;
            let values: Option<HashMap<String, String>> = params
                .get("params")
                .and_then(|v| v.as_object())
                .map(|obj| {
                    obj.iter()
                        .map(|(k, v)| {
                            let text = match v {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            (k.clone(), text)
                        })
                        .collect()
                });
            let mut i18n = ctx.i18n.lock().map_err(|e| e.to_string())?;
            let Some(lang) = str_param(params, "lang") else {
                let text = i18n.t(key, values.as_ref());
                return Ok(json!({"text": text, "locale": i18n.get_locale()}));
            };
            // `lang` applies to this call only.
            let previous = i18n.get_locale().to_string();
            i18n.set_locale(lang).map_err(|e| e.to_string())?;
            let text = i18n.t(key, values.as_ref());
            i18n.set_locale(&previous).map_err(|e| e.to_string())?;
            Ok(json!({"text": text, "locale": lang}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
