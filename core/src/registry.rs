use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::models::{Fodmap, is_metadata_key};

pub const ID_PREFIX: &str = "f_";
pub const NEXT_ID_KEY: &str = "_nextId";
pub const SEARCH_MIN_CHARS: usize = 2;
pub const SEARCH_LIMIT: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fodmap: Fodmap,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

/// Input to [`FoodRegistry::register`].
#[derive(Debug, Clone, Default)]
pub struct NewFood {
    pub name: String,
    pub fodmap: Option<Fodmap>,
    pub external_id: Option<String>,
    pub details: Option<Value>,
}

impl NewFood {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Outcome of a registration. Only `Created` and `Enriched` need persisting.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Created(FoodEntry),
    Enriched(FoodEntry),
    Existing(FoodEntry),
}

impl Registration {
    #[must_use]
    pub fn entry(&self) -> &FoodEntry {
        match self {
            Registration::Created(e) | Registration::Enriched(e) | Registration::Existing(e) => e,
        }
    }

    #[must_use]
    pub fn into_entry(self) -> FoodEntry {
        match self {
            Registration::Created(e) | Registration::Enriched(e) | Registration::Existing(e) => e,
        }
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        !matches!(self, Registration::Existing(_))
    }
}

/// Persisted as `{ "_nextId": n, "f_1": {...}, ... }`. Names are unique
/// case-insensitively and ids are never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodRegistry {
    next_id: u64,
    /// Creation order.
    entries: Vec<FoodEntry>,
}

impl Default for FoodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn id_number(id: &str) -> Option<u64> {
    id.strip_prefix(ID_PREFIX)?.parse().ok()
}

fn creation_key(entry: &FoodEntry) -> (u64, String) {
    (id_number(&entry.id).unwrap_or(u64::MAX), entry.id.clone())
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl FoodRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }

    pub fn from_blob(key: &str, blob: Value) -> Result<Self, StoreError> {
        let Value::Object(map) = blob else {
            return Err(StoreError::UnexpectedShape {
                key: key.to_string(),
                expected: "an object of registry entries",
            });
        };

        let mut next_id = map.get(NEXT_ID_KEY).and_then(Value::as_u64).unwrap_or(1);
        let mut entries = Vec::new();
        for (entry_key, value) in map {
            if is_metadata_key(&entry_key) {
                continue;
            }
            let entry: FoodEntry =
                serde_json::from_value(value).map_err(|source| StoreError::Decode {
                    key: format!("{key}.{entry_key}"),
                    source,
                })?;
            entries.push(entry);
        }

        // Object keys come back sorted as strings ("f_10" < "f_2"); restore creation order.
        entries.sort_by_key(creation_key);

        // A stale counter would hand out an id that is already taken.
        if let Some(max) = entries.iter().filter_map(|e| id_number(&e.id)).max() {
            next_id = next_id.max(max + 1);
        }

        Ok(Self { next_id, entries })
    }

    #[must_use]
    pub fn to_blob(&self) -> Value {
        let mut map = Map::new();
        map.insert(NEXT_ID_KEY.to_string(), Value::from(self.next_id));
        for entry in &self.entries {
            let value = serde_json::to_value(entry).unwrap_or(Value::Null);
            map.insert(entry.id.clone(), value);
        }
        Value::Object(map)
    }

    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    #[must_use]
    pub fn entries(&self) -> &[FoodEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find or create the entry for `food.name`.
    ///
    /// Returns `None` for a blank name. An existing entry only gains
    /// `external_id`/`details` when it has none yet.
    pub fn register(&mut self, food: NewFood) -> Option<Registration> {
        let trimmed = food.name.trim();
        if trimmed.is_empty() {
            return None;
        }
        let key = name_key(trimmed);
        let external_id = food.external_id.filter(|id| !id.trim().is_empty());

        if let Some(entry) = self.entries.iter_mut().find(|e| name_key(&e.name) == key) {
            let mut updated = false;
            if entry.external_id.is_none() && external_id.is_some() {
                entry.external_id = external_id;
                updated = true;
            }
            if entry.details.is_none() && food.details.is_some() {
                entry.details = food.details;
                updated = true;
            }
            let entry = entry.clone();
            return Some(if updated {
                Registration::Enriched(entry)
            } else {
                Registration::Existing(entry)
            });
        }

        let entry = FoodEntry {
            id: format!("{ID_PREFIX}{}", self.next_id),
            name: trimmed.to_string(),
            fodmap: food.fodmap.unwrap_or_default(),
            external_id,
            details: food.details,
        };
        self.next_id += 1;
        self.entries.push(entry.clone());
        Some(Registration::Created(entry))
    }

    /// Keep the counter above `id` so it is never minted again.
    pub fn reserve_id(&mut self, id: &str) -> bool {
        match id_number(id) {
            Some(n) if n >= self.next_id => {
                self.next_id = n.saturating_add(1);
                true
            }
            _ => false,
        }
    }

    /// Record a food under an id that stored data already carries.
    ///
    /// The id is always reserved. An entry is added only when neither the id
    /// nor the name is known yet and the name is not blank. Returns whether
    /// the registry changed.
    pub fn adopt(&mut self, id: &str, name: &str, fodmap: Fodmap) -> bool {
        let reserved = self.reserve_id(id);
        let name = name.trim();
        if id.is_empty()
            || name.is_empty()
            || self.find_by_id(id).is_some()
            || self.find_by_name(name).is_some()
        {
            return reserved;
        }
        self.entries.push(FoodEntry {
            id: id.to_string(),
            name: name.to_string(),
            fodmap,
            external_id: None,
            details: None,
        });
        self.entries.sort_by_key(creation_key);
        true
    }

    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&FoodEntry> {
        if id.is_empty() {
            return None;
        }
        self.entries.iter().find(|e| e.id == id)
    }

    /// Case-insensitive exact name match.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&FoodEntry> {
        let key = name_key(name);
        if key.is_empty() {
            return None;
        }
        self.entries.iter().find(|e| name_key(&e.name) == key)
    }

    /// Case-insensitive substring search in creation order, capped at [`SEARCH_LIMIT`].
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&FoodEntry> {
        let needle = query.trim().to_lowercase();
        if needle.chars().count() < SEARCH_MIN_CHARS {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .take(SEARCH_LIMIT)
            .collect()
    }
}
