//! Flat key-value settings store.
//!
//! Every write is persisted to SQLite as JSON text and, when the value
//! actually changed, broadcast as a [`StorageChange`] to subscribers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::database::Database;
use crate::types::counters::{Category, CounterSnapshot, Reading};
use crate::types::errors::StoreError;
use crate::types::settings::{
    interval_from_value, MissingFieldPolicy, MonitorConfig, SettingsKey, StorageChange,
};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Persistent settings storage with change notification.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;

    /// Reads several keys. Unset keys are absent from the result.
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let mut values = HashMap::new();
        for key in keys {
            if let Some(value) = self.get(key).await? {
                values.insert((*key).to_string(), value);
            }
        }
        Ok(values)
    }
}

/// Settings store backed by the `settings` table.
pub struct SqliteStore {
    db: Mutex<Database>,
    changes: broadcast::Sender<StorageChange>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            db: Mutex::new(db),
            changes,
        }
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Database::open_in_memory().map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        Ok(Self::new(db))
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let db = self
            .db
            .lock()
            .map_err(|e| StoreError::DatabaseError(format!("Lock poisoned: {}", e)))?;
        f(&db)
    }

    fn read(db: &Database, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = db
            .connection()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        raw.map(|text| {
            serde_json::from_str(&text).map_err(|e| StoreError::SerializationError(e.to_string()))
        })
        .transpose()
    }

    fn publish(&self, change: StorageChange) {
        tracing::debug!(key = %change.key, "setting changed");
        // No receivers is fine; nobody is listening yet.
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.with_db(|db| Self::read(db, key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let text =
            serde_json::to_string(&value).map_err(|e| StoreError::SerializationError(e.to_string()))?;
        let old_value = self.with_db(|db| {
            let old = Self::read(db, key)?;
            if old.as_ref() != Some(&value) {
                db.connection()
                    .execute(
                        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                        params![key, text, Self::now()],
                    )
                    .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
            }
            Ok(old)
        })?;

        if old_value.as_ref() != Some(&value) {
            self.publish(StorageChange {
                key: key.to_string(),
                old_value,
                new_value: Some(value),
            });
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let old_value = self.with_db(|db| {
            let old = Self::read(db, key)?;
            if old.is_some() {
                db.connection()
                    .execute("DELETE FROM settings WHERE key = ?1", params![key])
                    .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
            }
            Ok(old)
        })?;

        if old_value.is_some() {
            self.publish(StorageChange {
                key: key.to_string(),
                old_value,
                new_value: None,
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

/// Reads a known key, falling back to its default when unset.
pub async fn get_or_default(
    store: &dyn KeyValueStore,
    key: SettingsKey,
) -> Result<Value, StoreError> {
    Ok(store
        .get(key.as_str())
        .await?
        .unwrap_or_else(|| key.default_value()))
}

/// Loads every monitor preference in one go.
pub async fn load_config(store: &dyn KeyValueStore) -> Result<MonitorConfig, StoreError> {
    let url = get_or_default(store, SettingsKey::MonitorUrl).await?;
    let enabled = get_or_default(store, SettingsKey::MonitorEnabled).await?;
    let interval = get_or_default(store, SettingsKey::CheckIntervalMinutes).await?;
    let keep_awake = get_or_default(store, SettingsKey::KeepAwake).await?;
    let sound = get_or_default(store, SettingsKey::EnableSound).await?;
    let lang = get_or_default(store, SettingsKey::LangOverride).await?;
    let policy = get_or_default(store, SettingsKey::MissingFieldPolicy).await?;

    Ok(MonitorConfig {
        url: url.as_str().unwrap_or_default().to_string(),
        enabled: enabled.as_bool().unwrap_or(false),
        interval_minutes: interval_from_value(&interval),
        keep_awake: keep_awake.as_bool().unwrap_or(false),
        sound_enabled: sound.as_bool().unwrap_or(false),
        lang_override: lang
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        missing_field_policy: policy
            .as_str()
            .and_then(MissingFieldPolicy::parse)
            .unwrap_or_default(),
    })
}

/// Reads the last stored counter values. Unset categories read as zero.
pub async fn load_snapshot(store: &dyn KeyValueStore) -> Result<CounterSnapshot, StoreError> {
    let mut snapshot = CounterSnapshot::default();
    for category in Category::ALL {
        if let Some(value) = store.get(category.as_str()).await? {
            snapshot.set(category, Reading::from_value(&value));
        }
    }
    Ok(snapshot)
}

/// Persists all three counter values.
pub async fn store_snapshot(
    store: &dyn KeyValueStore,
    snapshot: &CounterSnapshot,
) -> Result<(), StoreError> {
    for category in Category::ALL {
        store
            .set(category.as_str(), snapshot.get(category).to_value())
            .await?;
    }
    Ok(())
}

/// Checks and normalizes a value written through an external interface.
pub fn validate_setting(key: &str, value: Value) -> Result<(SettingsKey, Value), StoreError> {
    let parsed = SettingsKey::parse(key).ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
    let invalid = |expected: &str| {
        StoreError::InvalidValue(format!("{} expects {}, got {}", key, expected, value))
    };
    let normalized = match parsed {
        SettingsKey::MonitorUrl => match &value {
            Value::String(s) => Value::String(s.trim().to_string()),
            _ => return Err(invalid("a string")),
        },
        SettingsKey::MonitorEnabled | SettingsKey::KeepAwake | SettingsKey::EnableSound => {
            match value {
                Value::Bool(_) => value.clone(),
                _ => return Err(invalid("a boolean")),
            }
        }
        SettingsKey::CheckIntervalMinutes => match &value {
            Value::Number(_) | Value::String(_) => Value::from(interval_from_value(&value)),
            _ => return Err(invalid("a number")),
        },
        SettingsKey::Danger | SettingsKey::Success | SettingsKey::Warning => {
            match Reading::from_value(&value) {
                Reading::Count(n) => Value::from(n),
                Reading::Unreadable if value.is_null() => Value::Null,
                Reading::Unreadable => return Err(invalid("a non-negative number or null")),
            }
        }
        SettingsKey::LangOverride => match &value {
            Value::String(_) | Value::Null => value.clone(),
            _ => return Err(invalid("a locale tag or null")),
        },
        SettingsKey::MissingFieldPolicy => match value.as_str().and_then(MissingFieldPolicy::parse) {
            Some(policy) => Value::String(policy.as_str().to_string()),
            None => return Err(invalid("\"store-unreadable\" or \"keep-previous\"")),
        },
    };
    Ok((parsed, normalized))
}
