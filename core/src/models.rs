use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, bail};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::StoreError;
use crate::migrations::{CURRENT_VERSION, VERSION_KEY};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Keys starting with this prefix carry metadata and are never dates.
pub const META_PREFIX: char = '_';
/// Raw days that could not be decoded and were later logged to again.
pub const QUARANTINE_KEY: &str = "_quarantined";

pub const MEAL_TYPES: &[&str] = &["Breakfast", "Lunch", "Dinner", "Snack"];

#[must_use]
pub fn is_metadata_key(key: &str) -> bool {
    key.starts_with(META_PREFIX)
}

// --- FODMAP classification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Fodmap {
    Low,
    High,
    #[default]
    Unknown,
}

impl Fodmap {
    /// Parse a stored classification. Anything other than `low`/`high` is unknown.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Fodmap::Low,
            "high" => Fodmap::High,
            _ => Fodmap::Unknown,
        }
    }

    #[must_use]
    pub fn is_known(self) -> bool {
        self != Fodmap::Unknown
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Fodmap::Low => "low",
            Fodmap::High => "high",
            Fodmap::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Fodmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Legacy blobs store `null` or free-form strings here.
impl<'de> Deserialize<'de> for Fodmap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Value::String(s)) => Fodmap::parse(&s),
            _ => Fodmap::Unknown,
        })
    }
}

// --- Entries ---

/// A food as embedded in a meal or beverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
    #[serde(
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub food_id: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_text")]
    pub name: String,
    #[serde(default)]
    pub fodmap: Fodmap,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FoodItem {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            food_id: None,
            name: name.to_string(),
            fodmap: Fodmap::Unknown,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    #[serde(deserialize_with = "de::lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::lenient_text")]
    pub time: String,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub meal_type: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_text")]
    pub content: String,
    /// Absent on pre-item meals; readers then fall back to `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<FoodItem>>,
    #[serde(
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub portion: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub high_fat: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beverage {
    #[serde(deserialize_with = "de::lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::lenient_text")]
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<FoodItem>>,
    #[serde(default, deserialize_with = "de::lenient_text")]
    pub content: String,
    #[serde(
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub volume: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub caffeine: bool,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub alcohol: bool,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub carbonated: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pain {
    #[serde(deserialize_with = "de::lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::lenient_text")]
    pub time: String,
    #[serde(
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<String>,
    /// 1–10.
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub severity: Option<u8>,
    /// Minutes.
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub duration: Option<u32>,
    #[serde(
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub character: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub preceded_by: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub helped_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bowel {
    #[serde(deserialize_with = "de::lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::lenient_text")]
    pub time: String,
    /// Bristol stool scale, 1–7.
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub bristol_type: Option<u8>,
    #[serde(
        default,
        deserialize_with = "de::lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub blood: bool,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub mucus: bool,
    #[serde(default, deserialize_with = "de::lenient_bool")]
    pub urgency: bool,
    #[serde(default, deserialize_with = "de::lenient_opt_bool")]
    pub complete_evacuation: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub feeling: Option<u8>,
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub energy: Option<u8>,
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub sleep: Option<u8>,
    #[serde(default, deserialize_with = "de::lenient_number")]
    pub stress: Option<u8>,
    #[serde(default, deserialize_with = "de::lenient_text")]
    pub notes: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Meals,
    Beverages,
    Pain,
    Bowel,
}

impl EntryKind {
    pub const ALL: [EntryKind; 4] = [
        EntryKind::Meals,
        EntryKind::Beverages,
        EntryKind::Pain,
        EntryKind::Bowel,
    ];

    /// Kinds whose entries embed food items.
    pub const WITH_FOOD: [EntryKind; 2] = [EntryKind::Meals, EntryKind::Beverages];

    /// Field name of this collection inside a day record.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            EntryKind::Meals => "meals",
            EntryKind::Beverages => "beverages",
            EntryKind::Pain => "pain",
            EntryKind::Bowel => "bowel",
        }
    }

    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        match self {
            EntryKind::Meals => "m",
            EntryKind::Beverages => "d",
            EntryKind::Pain => "p",
            EntryKind::Bowel => "b",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Meals => "Meal",
            EntryKind::Beverages => "Beverage",
            EntryKind::Pain => "Pain",
            EntryKind::Bowel => "Bowel",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meal" | "meals" => Ok(EntryKind::Meals),
            "beverage" | "beverages" | "drink" => Ok(EntryKind::Beverages),
            "pain" => Ok(EntryKind::Pain),
            "bowel" => Ok(EntryKind::Bowel),
            _ => bail!("Invalid entry kind '{s}'. Must be one of: meal, beverage, pain, bowel"),
        }
    }

    /// Mint a fresh entry identifier, e.g. `m_3f2a…`.
    #[must_use]
    pub fn new_id(self) -> String {
        format!("{}_{}", self.id_prefix(), Uuid::new_v4().simple())
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entry {
    Meal(Meal),
    Beverage(Beverage),
    Pain(Pain),
    Bowel(Bowel),
}

impl Entry {
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Meal(_) => EntryKind::Meals,
            Entry::Beverage(_) => EntryKind::Beverages,
            Entry::Pain(_) => EntryKind::Pain,
            Entry::Bowel(_) => EntryKind::Bowel,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Entry::Meal(e) => &e.id,
            Entry::Beverage(e) => &e.id,
            Entry::Pain(e) => &e.id,
            Entry::Bowel(e) => &e.id,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Entry::Meal(e) => e.id = id,
            Entry::Beverage(e) => e.id = id,
            Entry::Pain(e) => e.id = id,
            Entry::Bowel(e) => e.id = id,
        }
    }

    #[must_use]
    pub fn time(&self) -> &str {
        match self {
            Entry::Meal(e) => &e.time,
            Entry::Beverage(e) => &e.time,
            Entry::Pain(e) => &e.time,
            Entry::Bowel(e) => &e.time,
        }
    }

    /// Embedded food items; empty for kinds without food.
    #[must_use]
    pub fn food_items(&self) -> &[FoodItem] {
        match self {
            Entry::Meal(e) => e.items.as_deref().unwrap_or_default(),
            Entry::Beverage(e) => e.items.as_deref().unwrap_or_default(),
            Entry::Pain(_) | Entry::Bowel(_) => &[],
        }
    }

    /// Mutable access to the food items and free-text content of a meal or beverage.
    pub fn food_parts_mut(&mut self) -> Option<(&mut Option<Vec<FoodItem>>, &mut String)> {
        match self {
            Entry::Meal(e) => Some((&mut e.items, &mut e.content)),
            Entry::Beverage(e) => Some((&mut e.items, &mut e.content)),
            Entry::Pain(_) | Entry::Bowel(_) => None,
        }
    }

    /// Food names shown for this entry: items when present, `content` otherwise.
    #[must_use]
    pub fn food_names(&self) -> Vec<String> {
        let (items, content) = match self {
            Entry::Meal(e) => (e.items.as_deref(), e.content.as_str()),
            Entry::Beverage(e) => (e.items.as_deref(), e.content.as_str()),
            Entry::Pain(_) | Entry::Bowel(_) => return Vec::new(),
        };
        match items {
            Some(items) if !items.is_empty() => items.iter().map(|i| i.name.clone()).collect(),
            _ => split_food_content(content),
        }
    }
}

/// Split a legacy free-text food list (`"Oatmeal, banana"`) into names.
#[must_use]
pub fn split_food_content(content: &str) -> Vec<String> {
    content
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

// --- Day records ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub meals: Vec<Meal>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub beverages: Vec<Beverage>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub pain: Vec<Pain>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub bowel: Vec<Bowel>,
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DayRecord {
    #[must_use]
    pub fn entries(&self, kind: EntryKind) -> Vec<Entry> {
        match kind {
            EntryKind::Meals => self.meals.iter().cloned().map(Entry::Meal).collect(),
            EntryKind::Beverages => self.beverages.iter().cloned().map(Entry::Beverage).collect(),
            EntryKind::Pain => self.pain.iter().cloned().map(Entry::Pain).collect(),
            EntryKind::Bowel => self.bowel.iter().cloned().map(Entry::Bowel).collect(),
        }
    }

    #[must_use]
    pub fn find(&self, kind: EntryKind, id: &str) -> Option<Entry> {
        match kind {
            EntryKind::Meals => self.meals.iter().find(|e| e.id == id).cloned().map(Entry::Meal),
            EntryKind::Beverages => self
                .beverages
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .map(Entry::Beverage),
            EntryKind::Pain => self.pain.iter().find(|e| e.id == id).cloned().map(Entry::Pain),
            EntryKind::Bowel => self.bowel.iter().find(|e| e.id == id).cloned().map(Entry::Bowel),
        }
    }

    pub fn push(&mut self, entry: Entry) {
        match entry {
            Entry::Meal(e) => self.meals.push(e),
            Entry::Beverage(e) => self.beverages.push(e),
            Entry::Pain(e) => self.pain.push(e),
            Entry::Bowel(e) => self.bowel.push(e),
        }
    }

    /// Replace the entry with `id` in the collection matching `entry`'s kind.
    /// Returns false when no such entry exists.
    pub fn replace(&mut self, id: &str, entry: Entry) -> bool {
        fn swap<T>(list: &mut [T], id: &str, get_id: impl Fn(&T) -> &str, new: T) -> bool {
            match list.iter_mut().find(|e| get_id(e) == id) {
                Some(slot) => {
                    *slot = new;
                    true
                }
                None => false,
            }
        }
        match entry {
            Entry::Meal(e) => swap(&mut self.meals, id, |m| m.id.as_str(), e),
            Entry::Beverage(e) => swap(&mut self.beverages, id, |b| b.id.as_str(), e),
            Entry::Pain(e) => swap(&mut self.pain, id, |p| p.id.as_str(), e),
            Entry::Bowel(e) => swap(&mut self.bowel, id, |b| b.id.as_str(), e),
        }
    }

    /// Remove the entry with `id`. Returns false when nothing was removed.
    pub fn remove(&mut self, kind: EntryKind, id: &str) -> bool {
        fn drop_id<T>(list: &mut Vec<T>, id: &str, get_id: impl Fn(&T) -> &str) -> bool {
            let before = list.len();
            list.retain(|e| get_id(e) != id);
            list.len() != before
        }
        match kind {
            EntryKind::Meals => drop_id(&mut self.meals, id, |m| m.id.as_str()),
            EntryKind::Beverages => drop_id(&mut self.beverages, id, |b| b.id.as_str()),
            EntryKind::Pain => drop_id(&mut self.pain, id, |p| p.id.as_str()),
            EntryKind::Bowel => drop_id(&mut self.bowel, id, |b| b.id.as_str()),
        }
    }

    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        EntryKind::ALL.iter().any(|k| self.find(*k, id).is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meals.is_empty()
            && self.beverages.is_empty()
            && self.pain.is_empty()
            && self.bowel.is_empty()
            && self.summary.is_none()
    }
}

/// The migrated primary blob: every day record keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq)]
pub struct DayData {
    pub version: u32,
    pub days: BTreeMap<String, DayRecord>,
    /// Metadata keys other than `_version`, kept verbatim.
    pub meta: Map<String, Value>,
    /// Days that could not be decoded, kept as stored so a save never loses them.
    pub quarantined: BTreeMap<String, Value>,
}

impl Default for DayData {
    fn default() -> Self {
        Self::empty()
    }
}

impl DayData {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: CURRENT_VERSION,
            days: BTreeMap::new(),
            meta: Map::new(),
            quarantined: BTreeMap::new(),
        }
    }

    /// Decode a blob that is already at the current schema version.
    pub fn from_blob(blob: Map<String, Value>) -> Result<Self, StoreError> {
        let mut data = Self::empty();
        for (key, value) in blob {
            if key == VERSION_KEY {
                continue;
            }
            if is_metadata_key(&key) {
                data.meta.insert(key, value);
                continue;
            }
            match serde_json::from_value::<DayRecord>(value.clone()) {
                Ok(day) => {
                    data.days.insert(key, day);
                }
                Err(source) => {
                    let err = StoreError::Decode { key: key.clone(), source };
                    warn!(date = %key, error = %err, "keeping undecodable day as stored");
                    data.quarantined.insert(key, value);
                }
            }
        }
        Ok(data)
    }

    pub fn to_blob(&self) -> Result<Value, StoreError> {
        let mut blob = Map::new();
        blob.insert(VERSION_KEY.to_string(), Value::from(self.version));
        for (key, value) in &self.meta {
            blob.insert(key.clone(), value.clone());
        }
        // A quarantined day that was logged to again is parked under a metadata key.
        let mut parked = Map::new();
        for (date, raw) in &self.quarantined {
            if self.days.contains_key(date) {
                parked.insert(date.clone(), raw.clone());
            } else {
                blob.insert(date.clone(), raw.clone());
            }
        }
        if !parked.is_empty() {
            let slot = blob
                .entry(QUARANTINE_KEY)
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(existing) = slot {
                existing.extend(parked);
            }
        }
        for (date, day) in &self.days {
            let value = serde_json::to_value(day).map_err(StoreError::Encode)?;
            blob.insert(date.clone(), value);
        }
        Ok(Value::Object(blob))
    }

    #[must_use]
    pub fn day(&self, date: &str) -> Option<&DayRecord> {
        self.days.get(date)
    }

    /// The record for `date`, or an empty one when nothing was logged.
    #[must_use]
    pub fn day_or_empty(&self, date: &str) -> DayRecord {
        self.days.get(date).cloned().unwrap_or_default()
    }

    /// Find an entry by id on one day, regardless of kind.
    #[must_use]
    pub fn find_entry(&self, date: &str, id: &str) -> Option<Entry> {
        let day = self.days.get(date)?;
        EntryKind::ALL.iter().find_map(|k| day.find(*k, id))
    }
}

// --- Settings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => bail!("Invalid theme '{s}'. Must be 'light' or 'dark'"),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Day,
    Week,
    Export,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usda_api_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// --- Validation ---

pub fn validate_date_key(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| anyhow::anyhow!("Invalid date '{date}'. Use YYYY-MM-DD"))
}

pub fn validate_time(time: &str) -> Result<()> {
    if NaiveTime::parse_from_str(time, TIME_FORMAT).is_err() {
        bail!("Invalid time '{time}'. Use HH:MM");
    }
    Ok(())
}

pub fn validate_meal_type(meal_type: &str) -> Result<String> {
    MEAL_TYPES
        .iter()
        .find(|t| t.eq_ignore_ascii_case(meal_type.trim()))
        .map(|t| (*t).to_string())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid meal type '{meal_type}'. Must be one of: {}",
                MEAL_TYPES.join(", ")
            )
        })
}

pub fn validate_scale(label: &str, value: u8, max: u8) -> Result<u8> {
    if !(1..=max).contains(&value) {
        bail!("{label} must be between 1 and {max} (got {value})");
    }
    Ok(value)
}

/// Check the kind-specific ranges of an entry before it is stored.
pub fn validate_entry(entry: &Entry) -> Result<()> {
    validate_time(entry.time())?;
    match entry {
        Entry::Meal(m) => {
            if let Some(t) = &m.meal_type {
                if !t.is_empty() {
                    validate_meal_type(t)?;
                }
            }
        }
        Entry::Pain(p) => {
            if let Some(s) = p.severity {
                validate_scale("Severity", s, 10)?;
            }
        }
        Entry::Bowel(b) => {
            if let Some(t) = b.bristol_type {
                validate_scale("Bristol type", t, 7)?;
            }
        }
        Entry::Beverage(_) => {}
    }
    Ok(())
}

pub fn validate_summary(summary: &Summary) -> Result<()> {
    for (label, value) in [
        ("Feeling", summary.feeling),
        ("Energy", summary.energy),
        ("Sleep", summary.sleep),
        ("Stress", summary.stress),
    ] {
        if let Some(v) = value {
            validate_scale(label, v, 10)?;
        }
    }
    Ok(())
}

mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    fn scalar_text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Strings as-is, numbers and booleans as their text; anything else is empty.
    pub(super) fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.and_then(scalar_text).unwrap_or_default())
    }

    pub(super) fn lenient_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.and_then(scalar_text))
    }

    fn flag(value: Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "on" | "1" => Some(true),
                "false" | "no" | "n" | "off" | "0" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Booleans, `0`/`1` and yes/no style strings; anything else is false.
    pub(super) fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.and_then(flag).unwrap_or(false))
    }

    pub(super) fn lenient_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.and_then(flag))
    }

    /// Accept numbers, integral floats and numeric strings; anything else is absent.
    pub(super) fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        let n = match raw {
            Some(Value::Number(n)) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX.into())
                    .map(|f| f as u64)
            }),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        Ok(n.and_then(|n| T::try_from(n).ok()))
    }
}
