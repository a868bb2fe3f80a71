use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoodStats {
    counts: BTreeMap<String, u64>,
}

impl FoodStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stats blob. Non-integer, negative or zero counts are dropped.
    pub fn from_blob(key: &str, blob: Value) -> Result<Self, StoreError> {
        let Value::Object(map) = blob else {
            return Err(StoreError::UnexpectedShape {
                key: key.to_string(),
                expected: "an object of usage counts",
            });
        };
        let mut counts = BTreeMap::new();
        for (food, count) in map {
            match count.as_u64() {
                Some(0) => {}
                Some(n) => {
                    counts.insert(food, n);
                }
                None => warn!(key, food = %food, value = %count, "dropping invalid usage count"),
            }
        }
        Ok(Self { counts })
    }

    #[must_use]
    pub fn to_blob(&self) -> Value {
        let map: Map<String, Value> = self
            .counts
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect();
        Value::Object(map)
    }

    #[must_use]
    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Returns false (and changes nothing) for a blank key.
    pub fn increment(&mut self, key: &str) -> bool {
        self.add(key, 1)
    }

    pub fn add(&mut self, key: &str, amount: u64) -> bool {
        let key = key.trim();
        if key.is_empty() || amount == 0 {
            return false;
        }
        *self.counts.entry(key.to_string()).or_insert(0) += amount;
        true
    }

    /// Decrease by one, removing the key at zero. Returns false when the key was absent.
    pub fn decrement(&mut self, key: &str) -> bool {
        let key = key.trim();
        let Some(count) = self.counts.get_mut(key) else {
            return false;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.counts.remove(key);
        }
        true
    }

    /// The `n` most used keys, highest count first, ties broken by key.
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut all: Vec<(&str, u64)> = self.iter().collect();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        all.truncate(n);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_increment_and_decrement() {
        let mut stats = FoodStats::new();
        assert!(stats.increment("f_1"));
        assert!(stats.increment(" f_1 "));
        assert_eq!(stats.count("f_1"), 2);

        assert!(stats.decrement("f_1"));
        assert_eq!(stats.count("f_1"), 1);
        assert!(stats.decrement("f_1"));
        assert_eq!(stats.count("f_1"), 0);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_decrement_missing_is_noop() {
        let mut stats = FoodStats::new();
        assert!(!stats.decrement("f_9"));
        assert!(stats.is_empty());
    }

    #[test]
    fn test_blank_keys_ignored() {
        let mut stats = FoodStats::new();
        assert!(!stats.increment("  "));
        assert!(stats.is_empty());
    }

    #[test]
    fn test_top_orders_by_count_then_key() {
        let mut stats = FoodStats::new();
        stats.add("f_3", 2);
        stats.add("f_1", 5);
        stats.add("f_2", 2);
        assert_eq!(stats.top(2), vec![("f_1", 5), ("f_2", 2)]);
        assert_eq!(stats.top(10).len(), 3);
    }

    #[test]
    fn test_from_blob_drops_invalid_counts() {
        let stats = FoodStats::from_blob(
            "food_stats",
            json!({"Rice": 3, "Oats": 0, "Milk": -2, "Tea": "many", "Kiwi": 1.5}),
        )
        .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.count("Rice"), 3);
        assert_eq!(stats.to_blob(), json!({"Rice": 3}));
    }

    #[test]
    fn test_from_blob_rejects_non_object() {
        assert!(FoodStats::from_blob("food_stats", json!("nope")).is_err());
    }
}
