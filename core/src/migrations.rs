use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::error::MigrationError;
use crate::fodmap::FodmapLookup;
use crate::models::{EntryKind, Fodmap, is_metadata_key, split_food_content};
use crate::registry::{FoodRegistry, NewFood};
use crate::stats::FoodStats;

pub const CURRENT_VERSION: u32 = 4;
pub const VERSION_KEY: &str = "_version";

/// Entry of the pre-registry flat food cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CachedFood {
    pub name: String,
}

/// Auxiliary stores a migration may read and rewrite.
#[derive(Debug, Clone, Default)]
pub struct AuxStores {
    pub registry: FoodRegistry,
    pub stats: FoodStats,
    pub legacy_cache: Vec<CachedFood>,
}

pub struct MigrationContext<'a> {
    fodmap: &'a dyn FodmapLookup,
    aux: AuxStores,
    registry_dirty: bool,
    stats_dirty: bool,
    discard_legacy_cache: bool,
}

impl<'a> MigrationContext<'a> {
    fn new(fodmap: &'a dyn FodmapLookup, aux: AuxStores) -> Self {
        Self {
            fodmap,
            aux,
            registry_dirty: false,
            stats_dirty: false,
            discard_legacy_cache: false,
        }
    }
}

type StepFn =
    fn(&mut Map<String, Value>, &mut MigrationContext<'_>) -> Result<(), MigrationError>;

pub struct Migration {
    /// Version this step upgrades from; it produces `from + 1`.
    pub from: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub apply: StepFn,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        from: 0,
        name: "stamp_initial_version",
        description: "Establish the version field on unversioned data",
        apply: stamp_initial_version,
    },
    Migration {
        from: 1,
        name: "meal_items",
        description: "Optional structured food items on meals",
        apply: meal_items,
    },
    Migration {
        from: 2,
        name: "day_collections",
        description: "Beverage collection and defined entry arrays on every day",
        apply: day_collections,
    },
    Migration {
        from: 3,
        name: "food_identity",
        description: "Link every food item to a food registry id",
        apply: food_identity,
    },
];

/// Result of a successful pipeline run.
///
/// `registry` and `stats` are `Some` when a step rewrote them and they must be
/// persisted together with `blob`.
#[derive(Debug, Clone)]
pub struct Migrated {
    pub blob: Map<String, Value>,
    pub from_version: u32,
    pub applied: Vec<&'static str>,
    pub registry: Option<FoodRegistry>,
    pub stats: Option<FoodStats>,
    pub discard_legacy_cache: bool,
}

impl Migrated {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Check that `migrations` covers every version from 0 to `CURRENT_VERSION - 1` in order.
pub fn validate_ladder(migrations: &[Migration]) -> Result<(), MigrationError> {
    for (index, step) in migrations.iter().enumerate() {
        if u32::try_from(index).ok() != Some(step.from) {
            return Err(MigrationError::BrokenLadder {
                index,
                from: step.from,
            });
        }
    }
    if u32::try_from(migrations.len()).ok() != Some(CURRENT_VERSION) {
        return Err(MigrationError::IncompleteLadder {
            len: migrations.len(),
            current: CURRENT_VERSION,
        });
    }
    Ok(())
}

/// The stored schema version; missing or non-integer values count as 0.
#[must_use]
pub fn blob_version(blob: &Map<String, Value>) -> u32 {
    blob.get(VERSION_KEY)
        .and_then(Value::as_u64)
        .map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX))
}

/// Walk [`MIGRATIONS`] from the blob's `_version` up to [`CURRENT_VERSION`].
/// The new version is stamped only after every step succeeded; steps work on
/// raw JSON and must be safe to re-run on partly migrated data.
pub fn migrate(
    blob: Map<String, Value>,
    aux: AuxStores,
    fodmap: &dyn FodmapLookup,
) -> Result<Migrated, MigrationError> {
    run_ladder(MIGRATIONS, blob, aux, fodmap)
}

fn run_ladder(
    migrations: &[Migration],
    mut blob: Map<String, Value>,
    aux: AuxStores,
    fodmap: &dyn FodmapLookup,
) -> Result<Migrated, MigrationError> {
    validate_ladder(migrations)?;

    let from_version = blob_version(&blob);
    if from_version > CURRENT_VERSION {
        return Err(MigrationError::UnsupportedVersion {
            found: from_version,
            current: CURRENT_VERSION,
        });
    }

    let mut ctx = MigrationContext::new(fodmap, aux);
    let mut applied = Vec::new();
    for step in &migrations[from_version as usize..] {
        debug!(from = step.from, step = step.name, "applying migration step");
        (step.apply)(&mut blob, &mut ctx)?;
        applied.push(step.name);
    }

    blob.insert(VERSION_KEY.to_string(), Value::from(CURRENT_VERSION));
    if !applied.is_empty() {
        info!(
            from = from_version,
            to = CURRENT_VERSION,
            steps = applied.len(),
            "migrated data blob"
        );
    }

    Ok(Migrated {
        blob,
        from_version,
        applied,
        registry: ctx.registry_dirty.then_some(ctx.aux.registry),
        stats: ctx.stats_dirty.then_some(ctx.aux.stats),
        discard_legacy_cache: ctx.discard_legacy_cache,
    })
}

// --- Blob traversal ---

fn day_objects_mut(
    blob: &mut Map<String, Value>,
) -> impl Iterator<Item = &mut Map<String, Value>> {
    blob.iter_mut()
        .filter(|(key, _)| !is_metadata_key(key))
        .filter_map(|(_, day)| day.as_object_mut())
}

/// Visit every entry object of the kinds that embed food.
fn for_each_food_entry(
    blob: &mut Map<String, Value>,
    mut f: impl FnMut(&mut Map<String, Value>),
) {
    for day in day_objects_mut(blob) {
        for kind in EntryKind::WITH_FOOD {
            if let Some(Value::Array(entries)) = day.get_mut(kind.field()) {
                entries
                    .iter_mut()
                    .filter_map(Value::as_object_mut)
                    .for_each(&mut f);
            }
        }
    }
}

/// Visit every embedded food item object.
fn for_each_food_item(
    blob: &mut Map<String, Value>,
    mut f: impl FnMut(&mut Map<String, Value>),
) {
    for_each_food_entry(blob, |entry| {
        if let Some(Value::Array(items)) = entry.get_mut("items") {
            items
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .for_each(&mut f);
        }
    });
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// --- Steps ---

fn stamp_initial_version(
    _blob: &mut Map<String, Value>,
    _ctx: &mut MigrationContext<'_>,
) -> Result<(), MigrationError> {
    Ok(())
}

/// `items` is optional; a meal without it is read through `content`. Values
/// that are not arrays are dropped so that fallback applies.
fn meal_items(
    blob: &mut Map<String, Value>,
    _ctx: &mut MigrationContext<'_>,
) -> Result<(), MigrationError> {
    for day in day_objects_mut(blob) {
        let Some(Value::Array(meals)) = day.get_mut(EntryKind::Meals.field()) else {
            continue;
        };
        for meal in meals.iter_mut().filter_map(Value::as_object_mut) {
            if meal.get("items").is_some_and(|items| !items.is_array()) {
                meal.remove("items");
            }
        }
    }
    Ok(())
}

fn day_collections(
    blob: &mut Map<String, Value>,
    _ctx: &mut MigrationContext<'_>,
) -> Result<(), MigrationError> {
    for (date, day) in blob.iter_mut() {
        if is_metadata_key(date) {
            continue;
        }
        if day.is_null() {
            *day = Value::Object(Map::new());
        }
        let found = value_kind(day);
        let Some(record) = day.as_object_mut() else {
            return Err(MigrationError::MalformedDay {
                date: date.clone(),
                reason: format!("expected an object, found {found}"),
            });
        };
        for kind in EntryKind::ALL {
            if record.get(kind.field()).is_none_or(Value::is_null) {
                record.insert(kind.field().to_string(), Value::Array(Vec::new()));
            }
        }
    }
    Ok(())
}

/// Distinct food names, case-insensitive, first-seen casing kept.
#[derive(Default)]
struct NameMap {
    order: Vec<(String, Fodmap)>,
    index: HashMap<String, usize>,
}

impl NameMap {
    fn observe(&mut self, name: &str, fodmap: Fodmap) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let key = name.to_lowercase();
        match self.index.get(&key) {
            Some(&i) => {
                if !self.order[i].1.is_known() && fodmap.is_known() {
                    self.order[i].1 = fodmap;
                }
            }
            None => {
                self.index.insert(key, self.order.len());
                self.order.push((name.to_string(), fodmap));
            }
        }
    }
}

fn item_name(item: &Map<String, Value>) -> Option<&str> {
    item.get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

fn item_fodmap(item: &Map<String, Value>) -> Fodmap {
    item.get("fodmap")
        .and_then(Value::as_str)
        .map(Fodmap::parse)
        .unwrap_or_default()
}

fn has_food_id(item: &Map<String, Value>) -> bool {
    item.get("foodId")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty())
}

/// Give an entry structured items: derive them from `content` when missing,
/// and turn bare string items into objects.
fn backfill_items(entry: &mut Map<String, Value>, fodmap: &dyn FodmapLookup) {
    let has_items = matches!(entry.get("items"), Some(Value::Array(items)) if !items.is_empty());
    if !has_items {
        let names = entry
            .get("content")
            .and_then(Value::as_str)
            .map(split_food_content)
            .unwrap_or_default();
        if !names.is_empty() {
            let items = names
                .iter()
                .map(|name| json!({ "name": name, "fodmap": fodmap.classify(name).or_unknown() }))
                .collect();
            entry.insert("items".to_string(), Value::Array(items));
        }
    }

    if let Some(Value::Array(items)) = entry.get_mut("items") {
        for item in items.iter_mut() {
            if let Value::String(s) = item {
                let name = s.trim().to_string();
                *item = json!({ "name": name });
            }
        }
    }
}

fn food_identity(
    blob: &mut Map<String, Value>,
    ctx: &mut MigrationContext<'_>,
) -> Result<(), MigrationError> {
    let fodmap = ctx.fodmap;
    for_each_food_entry(blob, |entry| backfill_items(entry, fodmap));

    // Ids already on items stay theirs: record them before minting new ones.
    let mut linked_before = Vec::new();
    for_each_food_item(blob, |item| {
        if let Some(id) = item.get("foodId").and_then(Value::as_str) {
            if !id.is_empty() {
                let name = item_name(item).unwrap_or_default().to_string();
                linked_before.push((id.to_string(), name, item_fodmap(item)));
            }
        }
    });
    let mut adopted = 0usize;
    for (id, name, fodmap) in linked_before {
        if ctx.aux.registry.adopt(&id, &name, fodmap) {
            adopted += 1;
        }
    }

    let mut names = NameMap::default();
    for_each_food_item(blob, |item| {
        if has_food_id(item) {
            return;
        }
        if let Some(name) = item_name(item) {
            names.observe(name, item_fodmap(item));
        }
    });
    for cached in &ctx.aux.legacy_cache {
        names.observe(&cached.name, Fodmap::Unknown);
    }

    let mut created = 0usize;
    for (name, known) in names.order {
        let fodmap = if known.is_known() {
            known
        } else {
            ctx.fodmap.classify(&name).or_unknown()
        };
        let registration = ctx.aux.registry.register(NewFood {
            name,
            fodmap: Some(fodmap),
            ..NewFood::default()
        });
        if registration.is_some_and(|r| r.changed()) {
            created += 1;
        }
    }

    let registry = &ctx.aux.registry;
    let mut linked = 0usize;
    for_each_food_item(blob, |item| {
        if has_food_id(item) {
            return;
        }
        let Some(food) = item_name(item).and_then(|name| registry.find_by_name(name)) else {
            return;
        };
        let fodmap = match item_fodmap(item) {
            Fodmap::Unknown => food.fodmap,
            known => known,
        };
        item.insert("foodId".to_string(), Value::String(food.id.clone()));
        item.insert("fodmap".to_string(), json!(fodmap));
        linked += 1;
    });

    remap_stats(ctx);

    ctx.registry_dirty = true;
    ctx.stats_dirty = true;
    ctx.discard_legacy_cache = true;
    info!(
        foods = ctx.aux.registry.len(),
        adopted,
        created,
        linked,
        "introduced food identities"
    );
    Ok(())
}

/// Re-key usage counts from food names to registry ids. Case variants of
/// one name are summed; names the registry does not know are dropped.
fn remap_stats(ctx: &mut MigrationContext<'_>) {
    let old = std::mem::take(&mut ctx.aux.stats);
    let registry = &ctx.aux.registry;
    let mut remapped = FoodStats::new();
    let mut dropped = 0usize;
    for (key, count) in old.iter() {
        match registry.find_by_id(key).or_else(|| registry.find_by_name(key)) {
            Some(food) => {
                remapped.add(&food.id, count);
            }
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(dropped, "dropped usage stats for foods missing from the registry");
    }
    ctx.aux.stats = remapped;
}
