//! In-memory cache of the monitor URL.
//!
//! Loaded once from the store at startup and then kept current by feeding
//! it every [`StorageChange`] for `monitorUrl`.

use std::sync::RwLock;

use serde_json::Value;

use crate::services::settings_store::{get_or_default, KeyValueStore};
use crate::types::errors::StoreError;
use crate::types::settings::{SettingsKey, StorageChange};

/// Read side of the cached configuration, injected where the URL is needed.
pub trait ConfigService: Send + Sync {
    /// The configured monitor URL, or `None` when it is unset or blank.
    fn monitor_url(&self) -> Option<String>;
    /// Applies a change notification. Returns true when the cached URL changed.
    fn apply_change(&self, change: &StorageChange) -> bool;
}

#[derive(Default)]
pub struct ConfigCache {
    url: RwLock<String>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            url: RwLock::new(url.trim().to_string()),
        }
    }

    /// Replaces the cached URL with the stored one.
    pub async fn refresh(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        let value = get_or_default(store, SettingsKey::MonitorUrl).await?;
        self.replace(value.as_str().unwrap_or_default());
        Ok(())
    }

    fn replace(&self, url: &str) -> bool {
        let trimmed = url.trim();
        match self.url.write() {
            Ok(mut guard) => {
                if *guard == trimmed {
                    false
                } else {
                    *guard = trimmed.to_string();
                    true
                }
            }
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                *guard = trimmed.to_string();
                true
            }
        }
    }
}

impl ConfigService for ConfigCache {
    fn monitor_url(&self) -> Option<String> {
        let url = match self.url.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if url.is_empty() {
            None
        } else {
            Some(url)
        }
    }

    fn apply_change(&self, change: &StorageChange) -> bool {
        if !change.is(SettingsKey::MonitorUrl) {
            return false;
        }
        let url = change
            .new_value
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default();
        self.replace(url)
    }
}
