use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::migrations::{CachedFood, Migrated};
use crate::models::Settings;
use crate::registry::FoodRegistry;
use crate::stats::FoodStats;

pub const DATA_KEY: &str = "data";
pub const BACKUP_KEY: &str = "data.bak";
pub const REGISTRY_KEY: &str = "food_registry";
pub const STATS_KEY: &str = "food_stats";
pub const LEGACY_CACHE_KEY: &str = "food_cache";
pub const SETTINGS_KEY: &str = "settings";

/// Where a loaded value came from.
#[derive(Debug)]
pub enum LoadSource {
    Stored,
    Missing,
    /// The stored blob was unreadable and the default was substituted.
    Recovered(StoreError),
}

#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub source: LoadSource,
}

impl<T> Loaded<T> {
    #[must_use]
    pub fn is_recovered(&self) -> bool {
        matches!(self.source, LoadSource::Recovered(_))
    }
}

/// Key/value blob store. Every blob is JSON text, read and written whole.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS blobs (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Raw blobs ---

    pub fn read_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT value FROM blobs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw)
    }

    pub fn read_blob(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let Some(raw) = self.read_raw(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw).map_err(|source| StoreError::Malformed {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    pub(crate) fn write_raw(&self, key: &str, raw: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO blobs (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, raw, now],
        )?;
        debug!(key, bytes = raw.len(), "persisted blob");
        Ok(())
    }

    /// Overwrite the whole blob stored under `key`.
    pub fn write_blob(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(StoreError::Encode)?;
        self.write_raw(key, &raw)
    }

    pub fn delete_blob(&self, key: &str) -> Result<bool, StoreError> {
        let rows = self
            .conn
            .execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    /// Copy the raw text under `key` to `backup_key`, leaving the source in place.
    /// Returns false when there was nothing to copy.
    pub fn backup_blob(&self, key: &str, backup_key: &str) -> Result<bool, StoreError> {
        let Some(raw) = self.read_raw(key)? else {
            return Ok(false);
        };
        self.write_raw(backup_key, &raw)?;
        warn!(key, backup_key, "backed up unreadable blob");
        Ok(true)
    }

    // --- Typed loaders ---

    /// The primary blob as stored, before migration.
    pub fn load_raw_data(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        match self.read_blob(DATA_KEY)? {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(StoreError::UnexpectedShape {
                key: DATA_KEY.to_string(),
                expected: "an object keyed by date",
            }),
        }
    }

    fn load_or_default<T: Default>(
        &self,
        key: &str,
        decode: impl FnOnce(&str, Value) -> Result<T, StoreError>,
    ) -> Loaded<T> {
        let result = self
            .read_blob(key)
            .and_then(|blob| blob.map(|value| decode(key, value)).transpose());
        match result {
            Ok(Some(value)) => Loaded {
                value,
                source: LoadSource::Stored,
            },
            Ok(None) => Loaded {
                value: T::default(),
                source: LoadSource::Missing,
            },
            Err(err) => {
                warn!(key, error = %err, "unreadable blob, using default");
                Loaded {
                    value: T::default(),
                    source: LoadSource::Recovered(err),
                }
            }
        }
    }

    pub fn load_registry(&self) -> Loaded<FoodRegistry> {
        self.load_or_default(REGISTRY_KEY, FoodRegistry::from_blob)
    }

    pub fn load_stats(&self) -> Loaded<FoodStats> {
        self.load_or_default(STATS_KEY, FoodStats::from_blob)
    }

    /// The pre-registry food cache. Entries are `{name}` objects or bare strings;
    /// anything else is skipped.
    pub fn load_legacy_cache(&self) -> Loaded<Vec<CachedFood>> {
        self.load_or_default(LEGACY_CACHE_KEY, |key, value| {
            let Value::Array(items) = value else {
                return Err(StoreError::UnexpectedShape {
                    key: key.to_string(),
                    expected: "an array of cached foods",
                });
            };
            Ok(items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(name) => Some(CachedFood { name }),
                    other => serde_json::from_value(other).ok(),
                })
                .collect())
        })
    }

    pub fn load_settings(&self) -> Loaded<Settings> {
        self.load_or_default(SETTINGS_KEY, |key, value| {
            serde_json::from_value(value).map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
        })
    }

    // --- Typed writers ---

    pub fn save_data(&self, blob: &Value) -> Result<(), StoreError> {
        self.write_blob(DATA_KEY, blob)
    }

    pub fn save_registry(&self, registry: &FoodRegistry) -> Result<(), StoreError> {
        self.write_blob(REGISTRY_KEY, &registry.to_blob())
    }

    pub fn save_stats(&self, stats: &FoodStats) -> Result<(), StoreError> {
        self.write_blob(STATS_KEY, &stats.to_blob())
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let value = serde_json::to_value(settings).map_err(StoreError::Encode)?;
        self.write_blob(SETTINGS_KEY, &value)
    }

    /// Remove the primary blob. Settings, registry and stats are kept.
    pub fn clear_data(&self) -> Result<bool, StoreError> {
        self.delete_blob(DATA_KEY)
    }

    /// Persist the outcome of a migration run as one transaction.
    ///
    /// Dependent stores are written before the primary blob so the version
    /// stamp is the last thing to land.
    pub fn commit_migration(&self, migrated: &Migrated) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        if let Some(registry) = &migrated.registry {
            self.save_registry(registry)?;
        }
        if let Some(stats) = &migrated.stats {
            self.save_stats(stats)?;
        }
        if migrated.discard_legacy_cache {
            self.delete_blob(LEGACY_CACHE_KEY)?;
        }
        self.save_data(&Value::Object(migrated.blob.clone()))?;
        tx.commit()?;
        Ok(())
    }
}
