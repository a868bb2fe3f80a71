use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use crate::db::{
    BACKUP_KEY, DATA_KEY, Database, LEGACY_CACHE_KEY, LoadSource, Loaded, REGISTRY_KEY,
    SETTINGS_KEY, STATS_KEY,
};
use crate::error::{MigrationError, StoreError};
use crate::fodmap::{FodmapLookup, FodmapTable};
use crate::migrations::{AuxStores, CURRENT_VERSION, Migrated, migrate};
use crate::models::{
    DayData, DayRecord, Entry, EntryKind, FoodItem, Settings, Summary, Theme, View,
    validate_date_key, validate_entry, validate_meal_type, validate_summary,
};
use crate::reducer::{Action, AppState, reduce};
use crate::registry::{FoodEntry, FoodRegistry, NewFood, SEARCH_MIN_CHARS};
use crate::stats::FoodStats;

/// A food suggested by a remote search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodCandidate {
    pub name: String,
    pub brand: Option<String>,
    pub external_id: Option<String>,
}

/// Remote food search.
///
/// The CLI implements this with reqwest. Only called on explicit user
/// action; remote services rate-limit per-keystroke queries.
pub trait FoodLookupProvider: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<FoodCandidate>>;
}

/// How the primary blob was obtained at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Nothing was stored yet.
    Fresh,
    Stored,
    Migrated {
        from: u32,
        steps: Vec<&'static str>,
    },
    /// The blob could not be read or migrated; an empty one is in use.
    Recovered { reason: String, backed_up: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub data: DataSource,
    /// Auxiliary stores that were unreadable and replaced by defaults.
    pub recovered_stores: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopFood {
    pub food_id: String,
    pub name: Option<String>,
    pub count: u64,
}

pub struct TrackerService {
    db: Database,
    fodmap: Box<dyn FodmapLookup>,
    state: AppState,
    registry: FoodRegistry,
    stats: FoodStats,
    report: LoadReport,
}

fn note_recovered<T>(loaded: &Loaded<T>, key: &str, recovered: &mut Vec<String>) {
    if let LoadSource::Recovered(err) = &loaded.source {
        recovered.push(format!("{key}: {err}"));
    }
}

impl TrackerService {
    pub fn open(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Self::with_database(
            db,
            Box::new(FodmapTable::builtin()),
            Local::now().date_naive(),
        )
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Self::with_database(
            db,
            Box::new(FodmapTable::builtin()),
            Local::now().date_naive(),
        )
    }

    /// Load every store, migrate the primary blob and build the initial state.
    pub fn with_database(
        db: Database,
        fodmap: Box<dyn FodmapLookup>,
        today: NaiveDate,
    ) -> Result<Self> {
        let mut recovered_stores = Vec::new();
        let registry = db.load_registry();
        note_recovered(&registry, REGISTRY_KEY, &mut recovered_stores);
        let stats = db.load_stats();
        note_recovered(&stats, STATS_KEY, &mut recovered_stores);
        let settings = db.load_settings();
        note_recovered(&settings, SETTINGS_KEY, &mut recovered_stores);

        let mut registry = registry.value;
        let mut stats = stats.value;

        let (data, source) = match db.load_raw_data() {
            Ok(None) => (DayData::empty(), DataSource::Fresh),
            Ok(Some(blob)) => {
                let legacy_cache = db.load_legacy_cache();
                note_recovered(&legacy_cache, LEGACY_CACHE_KEY, &mut recovered_stores);
                let aux = AuxStores {
                    registry: registry.clone(),
                    stats: stats.clone(),
                    legacy_cache: legacy_cache.value,
                };
                match load_migrated(&db, blob, aux, fodmap.as_ref())? {
                    Ok((data, migrated)) => {
                        if let Some(updated) = migrated.registry {
                            registry = updated;
                        }
                        if let Some(updated) = migrated.stats {
                            stats = updated;
                        }
                        let source = if migrated.applied.is_empty() {
                            DataSource::Stored
                        } else {
                            DataSource::Migrated {
                                from: migrated.from_version,
                                steps: migrated.applied,
                            }
                        };
                        (data, source)
                    }
                    Err(reason) => fail_closed(&db, &reason),
                }
            }
            Err(err) => fail_closed(&db, &err.to_string()),
        };

        for date in data.quarantined.keys() {
            recovered_stores.push(format!("{DATA_KEY}[{date}]: kept as stored, unreadable"));
        }
        if reconcile_registry(&mut registry, &data, &stats) {
            warn!(
                foods = registry.len(),
                next_id = registry.next_id(),
                "food registry was missing ids used by stored data"
            );
            db.save_registry(&registry)
                .context("Failed to save food registry")?;
        }

        Ok(Self {
            db,
            fodmap,
            state: AppState::new(data, settings.value, today),
            registry,
            stats,
            report: LoadReport {
                data: source,
                recovered_stores,
            },
        })
    }

    // --- State access ---

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    #[must_use]
    pub fn data(&self) -> &DayData {
        &self.state.data
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    #[must_use]
    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    /// The record for `date`; an empty one when nothing was logged.
    #[must_use]
    pub fn day(&self, date: &str) -> DayRecord {
        self.state.data.day_or_empty(date)
    }

    #[must_use]
    pub fn registry(&self) -> &FoodRegistry {
        &self.registry
    }

    #[must_use]
    pub fn stats(&self) -> &FoodStats {
        &self.stats
    }

    // --- Reducer dispatch ---

    /// Apply `action` and persist whichever blob it changed.
    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        let clears = matches!(action, Action::ClearAllData);
        let next = reduce(&self.state, action);

        if clears {
            self.db.clear_data().context("Failed to clear data")?;
        } else if next.data != self.state.data {
            let blob = next.data.to_blob()?;
            self.db.save_data(&blob).context("Failed to save data")?;
        }
        if next.settings != self.state.settings {
            self.db
                .save_settings(&next.settings)
                .context("Failed to save settings")?;
        }

        self.state = next;
        Ok(())
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<()> {
        self.dispatch(Action::SetSelectedDate(date))
    }

    pub fn set_view(&mut self, view: View) -> Result<()> {
        self.dispatch(Action::SetActiveView(view))
    }

    // --- Entries ---

    /// Validate, link food items and store a new entry. A blank id is replaced
    /// by a freshly minted one.
    pub fn add_entry(&mut self, date: &str, mut entry: Entry) -> Result<Entry> {
        validate_date_key(date)?;
        prepare_entry(&mut entry)?;

        if entry.id().trim().is_empty() {
            entry.set_id(entry.kind().new_id());
        } else if self
            .state
            .data
            .day(date)
            .is_some_and(|day| day.contains_id(entry.id()))
        {
            bail!("Entry '{}' already exists on {date}", entry.id());
        }

        self.link_items(&mut entry)?;
        self.dispatch(Action::AddEntry {
            date: date.to_string(),
            entry: entry.clone(),
        })?;
        self.adjust_stats(&[], &entry)?;
        Ok(entry)
    }

    /// Replace an existing entry. Returns `None` when `entry_id` is not logged
    /// on `date` under `entry`'s kind.
    pub fn update_entry(
        &mut self,
        date: &str,
        entry_id: &str,
        mut entry: Entry,
    ) -> Result<Option<Entry>> {
        validate_date_key(date)?;
        prepare_entry(&mut entry)?;

        let Some(old) = self
            .state
            .data
            .day(date)
            .and_then(|day| day.find(entry.kind(), entry_id))
        else {
            return Ok(None);
        };

        entry.set_id(entry_id.to_string());
        self.link_items(&mut entry)?;
        self.dispatch(Action::UpdateEntry {
            date: date.to_string(),
            entry_id: entry_id.to_string(),
            entry: entry.clone(),
        })?;
        self.adjust_stats(old.food_items(), &entry)?;
        Ok(Some(entry))
    }

    /// Returns false when nothing matched.
    pub fn delete_entry(&mut self, date: &str, kind: EntryKind, entry_id: &str) -> Result<bool> {
        let Some(old) = self
            .state
            .data
            .day(date)
            .and_then(|day| day.find(kind, entry_id))
        else {
            return Ok(false);
        };

        self.dispatch(Action::DeleteEntry {
            date: date.to_string(),
            kind,
            entry_id: entry_id.to_string(),
        })?;

        let mut changed = false;
        for food_id in old.food_items().iter().filter_map(|i| i.food_id.as_deref()) {
            changed |= self.stats.decrement(food_id);
        }
        if changed {
            self.db.save_stats(&self.stats)?;
        }
        Ok(true)
    }

    pub fn set_summary(&mut self, date: &str, summary: Option<Summary>) -> Result<()> {
        validate_date_key(date)?;
        if let Some(summary) = &summary {
            validate_summary(summary)?;
        }
        self.dispatch(Action::SetSummary {
            date: date.to_string(),
            summary,
        })
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.dispatch(Action::SetTheme(theme))
    }

    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let theme = self.state.settings.theme.toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    /// Remove every day record. Settings, registry and stats are kept.
    pub fn clear_all(&mut self) -> Result<()> {
        self.dispatch(Action::ClearAllData)
    }

    /// Register unlinked food items and give each its `foodId`.
    fn link_items(&mut self, entry: &mut Entry) -> Result<()> {
        let Some((items, content)) = entry.food_parts_mut() else {
            return Ok(());
        };
        let Some(items) = items else {
            return Ok(());
        };

        items.retain(|item| !item.name.trim().is_empty());
        let mut registry_changed = false;
        for item in items.iter_mut() {
            item.name = item.name.trim().to_string();
            if item.food_id.as_deref().is_some_and(|id| !id.is_empty()) {
                continue;
            }
            let fodmap = if item.fodmap.is_known() {
                item.fodmap
            } else {
                self.fodmap.classify(&item.name).or_unknown()
            };
            let Some(registration) = self.registry.register(NewFood {
                name: item.name.clone(),
                fodmap: Some(fodmap),
                ..NewFood::default()
            }) else {
                continue;
            };
            registry_changed |= registration.changed();
            let food = registration.into_entry();
            if !item.fodmap.is_known() {
                item.fodmap = food.fodmap;
            }
            item.food_id = Some(food.id);
        }

        if content.trim().is_empty() && !items.is_empty() {
            *content = items
                .iter()
                .map(|item| item.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
        }

        if registry_changed {
            self.db
                .save_registry(&self.registry)
                .context("Failed to save food registry")?;
        }
        Ok(())
    }

    fn adjust_stats(&mut self, removed: &[FoodItem], added: &Entry) -> Result<()> {
        let mut changed = false;
        for food_id in removed.iter().filter_map(|i| i.food_id.as_deref()) {
            changed |= self.stats.decrement(food_id);
        }
        for food_id in added.food_items().iter().filter_map(|i| i.food_id.as_deref()) {
            changed |= self.stats.increment(food_id);
        }
        if changed {
            self.db.save_stats(&self.stats)?;
        }
        Ok(())
    }

    // --- Food registry ---

    /// Find or create a registry entry. A missing classification is looked up.
    /// Returns `None` for a blank name.
    pub fn register_food(&mut self, mut food: NewFood) -> Result<Option<FoodEntry>> {
        if food.fodmap.is_none_or(|f| !f.is_known()) {
            let found = self.fodmap.classify(&food.name);
            food.fodmap = Some(found.or_unknown());
            if food.details.is_none() {
                food.details = found.details;
            }
        }
        let Some(registration) = self.registry.register(food) else {
            return Ok(None);
        };
        if registration.changed() {
            self.db
                .save_registry(&self.registry)
                .context("Failed to save food registry")?;
        }
        Ok(Some(registration.into_entry()))
    }

    /// Register a remote search result, keeping its external id and brand.
    pub fn register_candidate(&mut self, candidate: &FoodCandidate) -> Result<Option<FoodEntry>> {
        let details = candidate.brand.as_ref().map(|brand| json!({ "brand": brand }));
        self.register_food(NewFood {
            name: candidate.name.clone(),
            fodmap: None,
            external_id: candidate.external_id.clone(),
            details,
        })
    }

    #[must_use]
    pub fn find_food_by_id(&self, id: &str) -> Option<&FoodEntry> {
        self.registry.find_by_id(id)
    }

    #[must_use]
    pub fn find_food_by_name(&self, name: &str) -> Option<&FoodEntry> {
        self.registry.find_by_name(name)
    }

    #[must_use]
    pub fn search_registry(&self, query: &str) -> Vec<&FoodEntry> {
        self.registry.search(query)
    }

    /// Query a remote provider. Queries shorter than the registry's minimum
    /// return nothing without a network call.
    pub fn search_remote(
        &self,
        provider: &dyn FoodLookupProvider,
        query: &str,
    ) -> Result<Vec<FoodCandidate>> {
        let query = query.trim();
        if query.chars().count() < SEARCH_MIN_CHARS {
            return Ok(Vec::new());
        }
        provider.search(query)
    }

    // --- Usage statistics ---

    pub fn increment_food_stat(&mut self, food_id: &str) -> Result<bool> {
        if !self.stats.increment(food_id) {
            return Ok(false);
        }
        self.db.save_stats(&self.stats)?;
        Ok(true)
    }

    pub fn decrement_food_stat(&mut self, food_id: &str) -> Result<bool> {
        if !self.stats.decrement(food_id) {
            return Ok(false);
        }
        self.db.save_stats(&self.stats)?;
        Ok(true)
    }

    #[must_use]
    pub fn top_foods(&self, n: usize) -> Vec<TopFood> {
        self.stats
            .top(n)
            .into_iter()
            .map(|(food_id, count)| TopFood {
                food_id: food_id.to_string(),
                name: self.registry.find_by_id(food_id).map(|f| f.name.clone()),
                count,
            })
            .collect()
    }
}

/// Canonicalise and range-check an entry before it is stored.
fn prepare_entry(entry: &mut Entry) -> Result<()> {
    validate_entry(entry)?;
    if let Entry::Meal(meal) = entry {
        meal.meal_type = match meal.meal_type.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(t) => Some(validate_meal_type(t)?),
        };
    }
    Ok(())
}

fn collect_food_ids<'a>(value: &'a Value, ids: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("foodId") {
                ids.push(id);
            }
            map.values().for_each(|v| collect_food_ids(v, ids));
        }
        Value::Array(values) => values.iter().for_each(|v| collect_food_ids(v, ids)),
        _ => {}
    }
}

/// Make the registry know every id the day data and stats refer to, so a
/// reset registry never mints an id that is already in use. Returns whether
/// the registry changed.
fn reconcile_registry(registry: &mut FoodRegistry, data: &DayData, stats: &FoodStats) -> bool {
    let mut changed = false;
    for day in data.days.values() {
        let items = day
            .meals
            .iter()
            .filter_map(|m| m.items.as_deref())
            .chain(day.beverages.iter().filter_map(|b| b.items.as_deref()))
            .flatten();
        for item in items {
            if let Some(id) = item.food_id.as_deref() {
                changed |= registry.adopt(id, &item.name, item.fodmap);
            }
        }
    }

    let mut raw_ids = Vec::new();
    for raw in data.quarantined.values() {
        collect_food_ids(raw, &mut raw_ids);
    }
    for id in raw_ids {
        changed |= registry.reserve_id(id);
    }
    for (key, _) in stats.iter() {
        changed |= registry.reserve_id(key);
    }
    changed
}

/// Migrate and decode the stored blob, committing the result when a step ran.
///
/// The outer error is a storage failure while committing; the inner one is the
/// reason the blob had to be abandoned.
fn load_migrated(
    db: &Database,
    blob: Map<String, Value>,
    aux: AuxStores,
    fodmap: &dyn FodmapLookup,
) -> Result<Result<(DayData, Migrated), String>> {
    let migrated = match migrate(blob, aux, fodmap) {
        Ok(migrated) => migrated,
        Err(err @ MigrationError::Store(_)) => return Err(err.into()),
        Err(err) => return Ok(Err(err.to_string())),
    };

    let data = match DayData::from_blob(migrated.blob.clone()) {
        Ok(data) => data,
        Err(err @ StoreError::Sqlite(_)) => return Err(err.into()),
        Err(err) => return Ok(Err(err.to_string())),
    };

    if !migrated.is_noop() {
        db.commit_migration(&migrated)
            .context("Failed to save migrated data")?;
        info!(
            from = migrated.from_version,
            to = CURRENT_VERSION,
            "stored migrated data"
        );
    }
    Ok(Ok((data, migrated)))
}

/// Abandon the stored blob: keep a copy under the backup key and start empty.
fn fail_closed(db: &Database, reason: &str) -> (DayData, DataSource) {
    error!(reason, "stored data is unusable, starting from an empty log");
    let backed_up = match db.backup_blob(DATA_KEY, BACKUP_KEY) {
        Ok(copied) => copied,
        Err(err) => {
            warn!(error = %err, "could not back up unusable data");
            false
        }
    };
    (
        DayData::empty(),
        DataSource::Recovered {
            reason: reason.to_string(),
            backed_up,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Beverage, Fodmap, Meal};

    struct MockProvider {
        foods: Vec<FoodCandidate>,
    }

    impl FoodLookupProvider for MockProvider {
        fn search(&self, query: &str) -> Result<Vec<FoodCandidate>> {
            let needle = query.to_lowercase();
            Ok(self
                .foods
                .iter()
                .filter(|f| f.name.to_lowercase().contains(&needle))
                .cloned()
                .collect())
        }
    }

    struct FailingProvider;

    impl FoodLookupProvider for FailingProvider {
        fn search(&self, _query: &str) -> Result<Vec<FoodCandidate>> {
            bail!("network unavailable")
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn service_with(db: Database) -> TrackerService {
        TrackerService::with_database(db, Box::new(FodmapTable::builtin()), today()).unwrap()
    }

    fn meal_with_items(names: &[&str]) -> Entry {
        Entry::Meal(Meal {
            id: String::new(),
            time: "12:30".into(),
            meal_type: Some("lunch".into()),
            content: String::new(),
            items: Some(names.iter().map(|n| FoodItem::named(n)).collect()),
            portion: None,
            high_fat: false,
            extra: Map::new(),
        })
    }

    fn coffee() -> Entry {
        Entry::Beverage(Beverage {
            id: String::new(),
            time: "09:00".into(),
            items: Some(vec![FoodItem::named("Coffee")]),
            content: String::new(),
            volume: Some("250ml".into()),
            temperature: Some("hot".into()),
            caffeine: true,
            alcohol: false,
            carbonated: false,
            extra: Map::new(),
        })
    }

    #[test]
    fn test_fresh_database() {
        let svc = TrackerService::open_in_memory().unwrap();
        assert_eq!(svc.load_report().data, DataSource::Fresh);
        assert!(svc.load_report().recovered_stores.is_empty());
        assert!(svc.data().days.is_empty());
        assert_eq!(svc.data().version, CURRENT_VERSION);
        assert_eq!(svc.settings().theme, Theme::Light);
    }

    #[test]
    fn test_legacy_blob_is_migrated_and_committed() {
        let db = Database::open_in_memory().unwrap();
        db.write_blob(
            DATA_KEY,
            &json!({"2024-01-01": {"meals": [
                {"id": "m_1", "time": "08:00", "content": "Oatmeal, banana", "highFat": false}
            ]}}),
        )
        .unwrap();
        db.write_blob(STATS_KEY, &json!({"Oatmeal": 3})).unwrap();
        db.write_blob(LEGACY_CACHE_KEY, &json!([{"name": "Kiwi"}])).unwrap();

        let svc = service_with(db);
        assert!(matches!(
            svc.load_report().data,
            DataSource::Migrated { from: 0, ref steps } if steps.len() == 4
        ));

        let day = svc.day("2024-01-01");
        let items = day.meals[0].items.as_ref().unwrap();
        assert_eq!(items[0].food_id.as_deref(), Some("f_1"));
        assert_eq!(items[1].food_id.as_deref(), Some("f_2"));
        assert_eq!(svc.registry().len(), 3);
        assert_eq!(svc.stats().count("f_1"), 3);

        let stored = svc.db.load_raw_data().unwrap().unwrap();
        assert_eq!(stored["_version"], json!(CURRENT_VERSION));
        assert!(svc.db.read_raw(LEGACY_CACHE_KEY).unwrap().is_none());
        assert_eq!(svc.db.load_registry().value, *svc.registry());
    }

    #[test]
    fn test_current_blob_is_not_rewritten() {
        let db = Database::open_in_memory().unwrap();
        let blob = json!({
            "_version": CURRENT_VERSION,
            "2024-01-01": {"meals": [], "beverages": [], "pain": [], "bowel": []}
        });
        db.write_blob(DATA_KEY, &blob).unwrap();
        let before = db.read_raw(DATA_KEY).unwrap();
        let svc = service_with(db);
        assert_eq!(svc.load_report().data, DataSource::Stored);
        assert_eq!(svc.db.read_raw(DATA_KEY).unwrap(), before);
    }

    #[test]
    fn test_corrupt_blob_fails_closed_with_backup() {
        let db = Database::open_in_memory().unwrap();
        db.write_raw(DATA_KEY, "{\"2024-01-01\": ").unwrap();
        let svc = service_with(db);

        assert!(matches!(
            svc.load_report().data,
            DataSource::Recovered { backed_up: true, .. }
        ));
        assert!(svc.data().days.is_empty());
        assert_eq!(
            svc.db.read_raw(BACKUP_KEY).unwrap().as_deref(),
            Some("{\"2024-01-01\": ")
        );
    }

    #[test]
    fn test_unmigratable_blob_fails_closed() {
        for blob in [
            json!({"_version": CURRENT_VERSION + 1, "2024-01-01": {}}),
            json!({"2024-01-01": 17}),
        ] {
            let db = Database::open_in_memory().unwrap();
            db.write_blob(DATA_KEY, &blob).unwrap();
            let svc = service_with(db);
            assert!(
                matches!(svc.load_report().data, DataSource::Recovered { .. }),
                "{blob}"
            );
            assert!(svc.data().days.is_empty());
            // The unreadable blob stays in place until the next mutation.
            assert_eq!(svc.db.read_blob(DATA_KEY).unwrap(), Some(blob.clone()));
            assert_eq!(svc.db.read_blob(BACKUP_KEY).unwrap(), Some(blob));
        }
    }

    #[test]
    fn test_loosely_typed_fields_do_not_hide_the_diary() {
        let db = Database::open_in_memory().unwrap();
        db.write_blob(
            DATA_KEY,
            &json!({
                "_version": CURRENT_VERSION,
                "2024-01-01": {
                    "meals": [],
                    "beverages": [
                        {"id": "d_1", "time": "09:00", "content": "Tea", "caffeine": "yes"}
                    ],
                    "pain": [{"id": 3, "time": "10:00", "location": 12}],
                    "bowel": []
                },
                "2024-01-02": {
                    "meals": [{"id": "m_1", "time": "08:00", "content": "Toast"}],
                    "beverages": [],
                    "pain": [],
                    "bowel": []
                }
            }),
        )
        .unwrap();
        let svc = service_with(db);
        assert_eq!(svc.load_report().data, DataSource::Stored);
        assert!(svc.load_report().recovered_stores.is_empty());
        assert_eq!(svc.data().days.len(), 2);
        assert!(svc.day("2024-01-01").beverages[0].caffeine);
        assert_eq!(svc.day("2024-01-01").pain[0].id, "3");
        assert_eq!(svc.day("2024-01-01").pain[0].location.as_deref(), Some("12"));
        assert_eq!(svc.day("2024-01-02").meals[0].content, "Toast");
    }

    #[test]
    fn test_undecodable_day_is_reported_and_kept() {
        let bad = json!({"meals": {"id": "m_9"}, "beverages": [], "pain": [], "bowel": []});
        let db = Database::open_in_memory().unwrap();
        db.write_blob(
            DATA_KEY,
            &json!({
                "_version": CURRENT_VERSION,
                "2024-01-01": bad.clone(),
                "2024-01-02": {"meals": [], "beverages": [], "pain": [], "bowel": []}
            }),
        )
        .unwrap();
        let mut svc = service_with(db);
        assert_eq!(svc.load_report().data, DataSource::Stored);
        assert_eq!(svc.load_report().recovered_stores.len(), 1);
        assert!(svc.load_report().recovered_stores[0].contains("2024-01-01"));
        assert_eq!(svc.data().days.len(), 1);

        svc.add_entry("2024-01-02", coffee()).unwrap();
        let stored = svc.db.read_blob(DATA_KEY).unwrap().unwrap();
        assert_eq!(stored["2024-01-01"], bad);
        assert_eq!(stored["2024-01-02"]["beverages"][0]["content"], "Coffee");
    }

    #[test]
    fn test_lost_registry_never_reuses_linked_ids() {
        let db = Database::open_in_memory().unwrap();
        db.write_blob(
            DATA_KEY,
            &json!({
                "_version": CURRENT_VERSION,
                "2024-01-01": {
                    "meals": [{"id": "m_1", "time": "12:00", "content": "Rice",
                               "items": [{"foodId": "f_1", "name": "Rice", "fodmap": "low"}]}],
                    "beverages": [],
                    "pain": [],
                    "bowel": []
                }
            }),
        )
        .unwrap();
        db.write_raw(REGISTRY_KEY, "garbage").unwrap();
        db.write_blob(STATS_KEY, &json!({"f_1": 1, "f_3": 2})).unwrap();

        let mut svc = service_with(db);
        assert_eq!(svc.registry().find_by_id("f_1").unwrap().name, "Rice");
        assert_eq!(svc.registry().next_id(), 4);

        let entry = svc
            .add_entry("2024-01-02", meal_with_items(&["Pizza", "rice"]))
            .unwrap();
        let items = entry.food_items();
        assert_eq!(items[0].food_id.as_deref(), Some("f_4"));
        assert_eq!(items[1].food_id.as_deref(), Some("f_1"));

        // The rebuilt registry was persisted.
        let stored = FoodRegistry::from_blob(
            REGISTRY_KEY,
            svc.db.read_blob(REGISTRY_KEY).unwrap().unwrap(),
        )
        .unwrap();
        assert_eq!(stored.find_by_id("f_1").unwrap().name, "Rice");
        assert_eq!(stored.find_by_id("f_4").unwrap().name, "Pizza");
    }

    #[test]
    fn test_recovered_aux_stores_are_reported() {
        let db = Database::open_in_memory().unwrap();
        db.write_raw(REGISTRY_KEY, "garbage").unwrap();
        db.write_raw(SETTINGS_KEY, "42").unwrap();
        let svc = service_with(db);
        assert_eq!(svc.load_report().recovered_stores.len(), 2);
        assert!(svc.registry().is_empty());
    }

    #[test]
    fn test_add_entry_links_items_and_counts() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        let entry = svc
            .add_entry("2024-01-01", meal_with_items(&["Rice", " ", "garlic"]))
            .unwrap();

        assert!(entry.id().starts_with("m_"));
        let Entry::Meal(meal) = &entry else {
            panic!("expected a meal")
        };
        assert_eq!(meal.meal_type.as_deref(), Some("Lunch"));
        assert_eq!(meal.content, "Rice, garlic");
        let items = meal.items.as_ref().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].food_id.as_deref(), Some("f_1"));
        assert_eq!(items[0].fodmap, Fodmap::Low);
        assert_eq!(items[1].fodmap, Fodmap::High);

        assert_eq!(svc.stats().count("f_1"), 1);
        assert_eq!(svc.db.load_stats().value.count("f_2"), 1);
        assert_eq!(svc.db.load_registry().value.len(), 2);

        let stored = svc.db.load_raw_data().unwrap().unwrap();
        assert_eq!(stored["2024-01-01"]["meals"][0]["id"], json!(entry.id()));
    }

    #[test]
    fn test_add_entry_validation() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        assert!(svc.add_entry("01/02/2024", coffee()).is_err());

        let mut bad_time = coffee();
        if let Entry::Beverage(b) = &mut bad_time {
            b.time = "9am".into();
        }
        assert!(svc.add_entry("2024-01-01", bad_time).is_err());

        let first = svc.add_entry("2024-01-01", coffee()).unwrap();
        let mut duplicate = coffee();
        duplicate.set_id(first.id().to_string());
        assert!(svc.add_entry("2024-01-01", duplicate).is_err());
        assert_eq!(svc.data().days.len(), 1);
    }

    #[test]
    fn test_update_entry_moves_stats() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        let added = svc
            .add_entry("2024-01-01", meal_with_items(&["Rice"]))
            .unwrap();
        let updated = svc
            .update_entry("2024-01-01", added.id(), meal_with_items(&["Potato"]))
            .unwrap()
            .unwrap();

        assert_eq!(updated.id(), added.id());
        assert_eq!(svc.stats().count("f_1"), 0);
        assert_eq!(svc.stats().count("f_2"), 1);
        assert_eq!(svc.day("2024-01-01").meals.len(), 1);
        assert_eq!(svc.day("2024-01-01").meals[0].content, "Potato");
    }

    #[test]
    fn test_update_missing_entry_returns_none() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        let result = svc
            .update_entry("2024-01-01", "m_missing", meal_with_items(&["Rice"]))
            .unwrap();
        assert!(result.is_none());
        assert!(svc.data().days.is_empty());
        assert!(svc.db.load_raw_data().unwrap().is_none());
    }

    #[test]
    fn test_delete_entry() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        let added = svc.add_entry("2024-01-01", coffee()).unwrap();

        assert!(!svc.delete_entry("2024-01-01", EntryKind::Beverages, "d_x").unwrap());
        assert!(!svc.delete_entry("2024-01-01", EntryKind::Meals, added.id()).unwrap());
        assert!(svc.delete_entry("2024-01-01", EntryKind::Beverages, added.id()).unwrap());

        assert!(svc.day("2024-01-01").beverages.is_empty());
        assert!(svc.stats().is_empty());
        assert!(svc.db.load_stats().value.is_empty());
    }

    #[test]
    fn test_summary_and_theme_persist() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        let summary = Summary {
            feeling: Some(8),
            stress: Some(2),
            ..Summary::default()
        };
        svc.set_summary("2024-01-03", Some(summary.clone())).unwrap();
        assert_eq!(svc.day("2024-01-03").summary, Some(summary));

        let invalid = Summary {
            sleep: Some(11),
            ..Summary::default()
        };
        assert!(svc.set_summary("2024-01-03", Some(invalid)).is_err());

        assert_eq!(svc.toggle_theme().unwrap(), Theme::Dark);
        assert_eq!(svc.db.load_settings().value.theme, Theme::Dark);
    }

    #[test]
    fn test_clear_all_keeps_settings_and_registry() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        svc.add_entry("2024-01-01", coffee()).unwrap();
        svc.set_theme(Theme::Dark).unwrap();
        svc.clear_all().unwrap();

        assert!(svc.data().days.is_empty());
        assert!(svc.db.load_raw_data().unwrap().is_none());
        assert_eq!(svc.db.load_settings().value.theme, Theme::Dark);
        assert_eq!(svc.registry().len(), 1);
    }

    #[test]
    fn test_register_food_classifies() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        let onion = svc.register_food(NewFood::named("Red onion")).unwrap().unwrap();
        assert_eq!(onion.fodmap, Fodmap::High);
        assert!(svc.register_food(NewFood::named("  ")).unwrap().is_none());
        assert_eq!(svc.find_food_by_name("RED ONION").unwrap().id, onion.id);
        assert_eq!(svc.find_food_by_id(&onion.id).unwrap().name, "Red onion");
        assert_eq!(svc.search_registry("oni").len(), 1);
    }

    #[test]
    fn test_remote_search_and_candidate_registration() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        let provider = MockProvider {
            foods: vec![FoodCandidate {
                name: "Nutella".into(),
                brand: Some("Ferrero".into()),
                external_id: Some("3017620422003".into()),
            }],
        };

        assert!(svc.search_remote(&FailingProvider, " n ").unwrap().is_empty());
        assert!(svc.search_remote(&FailingProvider, "nutella").is_err());

        let results = svc.search_remote(&provider, "  nut ").unwrap();
        assert_eq!(results.len(), 1);

        svc.register_food(NewFood::named("nutella")).unwrap();
        let entry = svc.register_candidate(&results[0]).unwrap().unwrap();
        assert_eq!(entry.name, "nutella");
        assert_eq!(entry.external_id.as_deref(), Some("3017620422003"));
        assert_eq!(entry.details, Some(json!({"brand": "Ferrero"})));
    }

    #[test]
    fn test_food_stats_operations() {
        let mut svc = TrackerService::open_in_memory().unwrap();
        let rice = svc.register_food(NewFood::named("Rice")).unwrap().unwrap();
        assert!(svc.increment_food_stat(&rice.id).unwrap());
        assert!(svc.increment_food_stat(&rice.id).unwrap());
        assert!(svc.increment_food_stat("f_99").unwrap());
        assert!(!svc.decrement_food_stat("f_404").unwrap());

        let top = svc.top_foods(5);
        assert_eq!(top[0].food_id, rice.id);
        assert_eq!(top[0].name.as_deref(), Some("Rice"));
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].name, None);

        assert!(svc.decrement_food_stat("f_99").unwrap());
        assert_eq!(svc.db.load_stats().value.count("f_99"), 0);
    }

    #[test]
    fn test_reopen_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gutlog.db");
        let id = {
            let mut svc = TrackerService::open(&path).unwrap();
            svc.add_entry("2024-02-01", coffee()).unwrap().id().to_string()
        };
        let svc = TrackerService::open(&path).unwrap();
        assert_eq!(svc.load_report().data, DataSource::Stored);
        assert_eq!(svc.day("2024-02-01").beverages[0].id, id);
        assert_eq!(svc.stats().count("f_1"), 1);
    }
}
