use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::models::Fodmap;

/// Result of classifying a food name. `fodmap` is `None` when nothing matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FodmapMatch {
    pub fodmap: Option<Fodmap>,
    pub details: Option<Value>,
}

impl FodmapMatch {
    /// The classification, with misses mapped to [`Fodmap::Unknown`].
    #[must_use]
    pub fn or_unknown(&self) -> Fodmap {
        self.fodmap.unwrap_or_default()
    }
}

pub trait FodmapLookup {
    fn classify(&self, name: &str) -> FodmapMatch;
}

#[derive(Debug, Clone, Deserialize)]
pub struct FodmapRecord {
    pub name: String,
    pub fodmap: Fodmap,
    #[serde(default)]
    pub details: Option<Value>,
}

/// Static lookup table indexed by normalised name, in insertion order.
///
/// Matching runs three passes: exact name, then substring containment in
/// either direction (table order decides ties), then whole words of at
/// least three characters.
#[derive(Debug, Clone)]
pub struct FodmapTable {
    index: Vec<(String, FodmapRecord)>,
}

const BUILTIN: &[(&str, Fodmap)] = &[
    ("garlic", Fodmap::High),
    ("onion", Fodmap::High),
    ("wheat bread", Fodmap::High),
    ("rye bread", Fodmap::High),
    ("pasta", Fodmap::High),
    ("couscous", Fodmap::High),
    ("apple", Fodmap::High),
    ("pear", Fodmap::High),
    ("mango", Fodmap::High),
    ("watermelon", Fodmap::High),
    ("cherries", Fodmap::High),
    ("milk", Fodmap::High),
    ("yogurt", Fodmap::High),
    ("ice cream", Fodmap::High),
    ("chickpeas", Fodmap::High),
    ("lentils", Fodmap::High),
    ("kidney beans", Fodmap::High),
    ("cauliflower", Fodmap::High),
    ("mushrooms", Fodmap::High),
    ("asparagus", Fodmap::High),
    ("honey", Fodmap::High),
    ("cashews", Fodmap::High),
    ("lactose free milk", Fodmap::Low),
    ("sourdough spelt bread", Fodmap::Low),
    ("gluten free bread", Fodmap::Low),
    ("oatmeal", Fodmap::Low),
    ("oats", Fodmap::Low),
    ("rice", Fodmap::Low),
    ("quinoa", Fodmap::Low),
    ("potato", Fodmap::Low),
    ("banana", Fodmap::Low),
    ("blueberries", Fodmap::Low),
    ("strawberries", Fodmap::Low),
    ("orange", Fodmap::Low),
    ("kiwi", Fodmap::Low),
    ("carrot", Fodmap::Low),
    ("zucchini", Fodmap::Low),
    ("spinach", Fodmap::Low),
    ("tomato", Fodmap::Low),
    ("cucumber", Fodmap::Low),
    ("eggs", Fodmap::Low),
    ("chicken", Fodmap::Low),
    ("salmon", Fodmap::Low),
    ("tofu", Fodmap::Low),
    ("cheddar", Fodmap::Low),
    ("peanut butter", Fodmap::Low),
    ("maple syrup", Fodmap::Low),
    ("coffee", Fodmap::Low),
    ("green tea", Fodmap::Low),
    ("water", Fodmap::Low),
];

/// Lowercase, strip punctuation, collapse whitespace.
#[must_use]
pub fn normalize(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl FodmapTable {
    #[must_use]
    pub fn new(records: Vec<FodmapRecord>) -> Self {
        let mut index: Vec<(String, FodmapRecord)> = Vec::with_capacity(records.len());
        for record in records {
            let key = normalize(&record.name);
            if key.is_empty() {
                continue;
            }
            // Later duplicates win, as with a map insert, but keep the first position.
            if let Some(slot) = index.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = record;
            } else {
                index.push((key, record));
            }
        }
        Self { index }
    }

    #[must_use]
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|(name, fodmap)| FodmapRecord {
                    name: (*name).to_string(),
                    fodmap: *fodmap,
                    details: None,
                })
                .collect(),
        )
    }

    /// Load a table from a JSON array of `{name, fodmap, details?}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<FodmapRecord> =
            serde_json::from_str(json).context("Failed to parse FODMAP table")?;
        Ok(Self::new(records))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn hit(record: &FodmapRecord) -> FodmapMatch {
        FodmapMatch {
            fodmap: Some(record.fodmap),
            details: record.details.clone(),
        }
    }
}

impl Default for FodmapTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FodmapLookup for FodmapTable {
    fn classify(&self, name: &str) -> FodmapMatch {
        let normalized = normalize(name);
        if normalized.is_empty() {
            return FodmapMatch::default();
        }

        if let Some((_, record)) = self.index.iter().find(|(k, _)| *k == normalized) {
            return Self::hit(record);
        }

        if let Some((_, record)) = self
            .index
            .iter()
            .find(|(k, _)| normalized.contains(k.as_str()) || k.contains(normalized.as_str()))
        {
            return Self::hit(record);
        }

        for word in normalized.split(' ').filter(|w| w.len() >= 3) {
            if let Some((_, record)) = self.index.iter().find(|(k, _)| k == word) {
                return Self::hit(record);
            }
        }

        FodmapMatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Peanut-Butter!!  "), "peanutbutter");
        assert_eq!(normalize("Lactose   free\tmilk"), "lactose free milk");
    }

    #[test]
    fn test_exact_match() {
        let table = FodmapTable::builtin();
        assert_eq!(table.classify("Garlic").fodmap, Some(Fodmap::High));
        assert_eq!(table.classify("RICE").fodmap, Some(Fodmap::Low));
    }

    #[test]
    fn test_exact_beats_substring() {
        // "lactose free milk" contains "milk" (high) but matches its own row first.
        let table = FodmapTable::builtin();
        assert_eq!(table.classify("Lactose free milk!").fodmap, Some(Fodmap::Low));
        assert_eq!(table.classify("Lactose-free milk").fodmap, Some(Fodmap::High));
    }

    #[test]
    fn test_substring_match() {
        let table = FodmapTable::builtin();
        assert_eq!(table.classify("grilled chicken breast").fodmap, Some(Fodmap::Low));
        assert_eq!(table.classify("Oatmeal").fodmap, Some(Fodmap::Low));
    }

    #[test]
    fn test_containment_match_carries_details() {
        let table = FodmapTable::new(vec![FodmapRecord {
            name: "kale".into(),
            fodmap: Fodmap::Low,
            details: Some(json!({"serving": "1 cup"})),
        }]);
        let m = table.classify("kale of the garden");
        assert_eq!(m.fodmap, Some(Fodmap::Low));
        assert_eq!(m.details, Some(json!({"serving": "1 cup"})));
    }

    #[test]
    fn test_miss_and_blank() {
        let table = FodmapTable::builtin();
        assert_eq!(table.classify("zzz").fodmap, None);
        assert_eq!(table.classify("zzz").or_unknown(), Fodmap::Unknown);
        assert_eq!(table.classify("   ").fodmap, None);
    }

    #[test]
    fn test_from_json() {
        let table = FodmapTable::from_json(
            r#"[{"name": "Fennel", "fodmap": "low"}, {"name": "fennel", "fodmap": "high"}]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.classify("fennel").fodmap, Some(Fodmap::High));
        assert!(FodmapTable::from_json("{").is_err());
    }
}
