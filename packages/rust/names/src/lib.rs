//! Contributor name index and fuzzy name → id resolution.
//!
//! The index is a flat map from normalized (trimmed, lowercased) names to
//! contributor ids, built from the contributor table's canonical names and
//! aliases. Lookups try an exact hit first and fall back to the closest
//! name by normalized Levenshtein similarity.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use songbook_shared::types::string_or_seq;
use tracing::{debug, info, warn};

/// Id reserved in the contributor table; it is not a person.
pub const RESERVED_ID: &str = "01";

/// Minimum similarity a fuzzy match must exceed in [`resolve`].
pub const RESOLVE_THRESHOLD: f64 = 0.85;

// ---------------------------------------------------------------------------
// Contributor table
// ---------------------------------------------------------------------------

/// One row of the contributor table.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributorRecord {
    pub id: String,
    pub name: String,
    /// Zero, one, or many alternative spellings.
    #[serde(default, deserialize_with = "string_or_seq")]
    pub alias: Vec<String>,
}

// ---------------------------------------------------------------------------
// NameIndex
// ---------------------------------------------------------------------------

/// Read-only map from normalized names to contributor ids.
///
/// Ordered so fuzzy ties always break the same way.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    names: BTreeMap<String, String>,
}

/// Trim and lowercase a name for lookup.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl NameIndex {
    /// Build the index from contributor records.
    ///
    /// Records with the reserved id are skipped. When two records share a
    /// normalized name the later record wins.
    pub fn from_records(records: &[ContributorRecord]) -> Self {
        let mut names = BTreeMap::new();

        for record in records {
            let id = record.id.trim();
            if id.is_empty() || id == RESERVED_ID {
                continue;
            }

            for name in std::iter::once(&record.name).chain(record.alias.iter()) {
                let key = normalize(name);
                if key.is_empty() {
                    continue;
                }
                if let Some(previous) = names.insert(key, id.to_string()) {
                    if previous != id {
                        debug!(name = %name, previous = %previous, id, "name collision, last record wins");
                    }
                }
            }
        }

        Self { names }
    }

    /// Parse a contributor table from JSON text.
    pub fn from_json(json: &str) -> songbook_shared::Result<Self> {
        let records: Vec<ContributorRecord> = serde_json::from_str(json).map_err(|e| {
            songbook_shared::SongbookError::parse(format!("invalid contributor table: {e}"))
        })?;
        Ok(Self::from_records(&records))
    }

    /// Load the contributor table at `path`.
    ///
    /// A missing or malformed table is logged and yields an empty index, so
    /// every entry falls back to its default contributor.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "contributor table unreadable, using empty index");
                return Self::default();
            }
        };

        match Self::from_json(&content) {
            Ok(index) => {
                info!(path = %path.display(), names = index.len(), "contributor index loaded");
                index
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "contributor table malformed, using empty index");
                Self::default()
            }
        }
    }

    /// Number of distinct names (canonical + aliases).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Exact lookup of an already-normalized name.
    pub fn get(&self, normalized: &str) -> Option<&str> {
        self.names.get(normalized).map(String::as_str)
    }

    /// Closest indexed name to `query` with its id and similarity.
    ///
    /// An exact hit scores 1.0. Returns `None` only for an empty index or a
    /// blank query.
    pub fn best_match(&self, query: &str) -> Option<(&str, f64)> {
        let key = normalize(query);
        if key.is_empty() {
            return None;
        }
        if let Some(id) = self.get(&key) {
            return Some((id, 1.0));
        }

        let mut best: Option<(&str, f64)> = None;
        for (name, id) in &self.names {
            let score = strsim::normalized_levenshtein(&key, name);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((id.as_str(), score));
            }
        }
        best
    }

    /// Id for `query` if it matches exactly or at least `threshold` similar.
    pub fn lookup(&self, query: &str, threshold: f64) -> Option<&str> {
        self.best_match(query)
            .filter(|(_, score)| *score >= threshold)
            .map(|(id, _)| id)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve names to a set of contributor ids.
///
/// Names that neither match exactly nor come closer than
/// [`RESOLVE_THRESHOLD`] are dropped without error.
pub fn resolve<S: AsRef<str>>(names: &[S], index: &NameIndex) -> BTreeSet<String> {
    names
        .iter()
        .filter_map(|name| {
            let (id, score) = index.best_match(name.as_ref())?;
            (score >= 1.0 || score > RESOLVE_THRESHOLD).then(|| id.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str, alias: &[&str]) -> ContributorRecord {
        ContributorRecord {
            id: id.into(),
            name: name.into(),
            alias: alias.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn sample_index() -> NameIndex {
        NameIndex::from_records(&[
            record("RNT01", "রবীন্দ্রনাথ ঠাকুর", &["Rabindranath Tagore"]),
            record("KNI01", "কাজী নজরুল ইসলাম", &["Kazi Nazrul Islam", "নজরুল"]),
            record("01", "বিবিধ", &[]),
        ])
    }

    #[test]
    fn exact_name_resolves() {
        let index = NameIndex::from_records(&[record("RNT01", "রবীন্দ্রনাথ ঠাকুর", &[])]);
        let ids = resolve(&["রবীন্দ্রনাথ ঠাকুর"], &index);
        assert_eq!(ids, BTreeSet::from(["RNT01".to_string()]));
    }

    #[test]
    fn transliterated_near_miss_resolves_to_nothing() {
        let index = NameIndex::from_records(&[record("RNT01", "রবীন্দ্রনাথ ঠাকুর", &[])]);
        assert!(resolve(&["Robindronath Thakur"], &index).is_empty());
    }

    #[test]
    fn lookup_normalizes_case_and_whitespace() {
        let index = sample_index();
        let ids = resolve(&["  KAZI NAZRUL ISLAM "], &index);
        assert_eq!(ids, BTreeSet::from(["KNI01".to_string()]));
    }

    #[test]
    fn fuzzy_match_above_threshold() {
        let index = sample_index();
        // One dropped letter out of 19.
        let ids = resolve(&["Rabindranath Tagor"], &index);
        assert_eq!(ids, BTreeSet::from(["RNT01".to_string()]));
    }

    #[test]
    fn duplicates_collapse_and_empty_input() {
        let index = sample_index();
        let ids = resolve(&["নজরুল", "Kazi Nazrul Islam"], &index);
        assert_eq!(ids.len(), 1);

        let none: [&str; 0] = [];
        assert!(resolve(&none, &index).is_empty());
    }

    #[test]
    fn reserved_id_is_excluded() {
        let index = sample_index();
        assert!(index.get("বিবিধ").is_none());
        assert!(resolve(&["বিবিধ"], &index).is_empty());
    }

    #[test]
    fn later_record_wins_collisions() {
        let index = NameIndex::from_records(&[
            record("AAA01", "Shared Name", &[]),
            record("BBB01", "shared name", &[]),
        ]);
        assert_eq!(index.get("shared name"), Some("BBB01"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn alias_as_string_or_array() {
        let json = r#"[
            {"id": "A01", "name": "Alpha", "alias": "Alef"},
            {"id": "B01", "name": "Beta", "alias": ["Bet", "Vita"]},
            {"id": "C01", "name": "Gamma"}
        ]"#;
        let index = NameIndex::from_json(json).expect("parse table");
        assert_eq!(index.get("alef"), Some("A01"));
        assert_eq!(index.get("vita"), Some("B01"));
        assert_eq!(index.get("gamma"), Some("C01"));
        assert_eq!(index.len(), 6);
    }

    #[test]
    fn lookup_threshold_is_inclusive() {
        let index = sample_index();
        assert_eq!(index.lookup("নজরুল", 0.82), Some("KNI01"));
        assert_eq!(index.lookup("Unrelated Person", 0.82), None);
        assert!(NameIndex::default().best_match("anyone").is_none());
    }

    #[test]
    fn load_missing_or_malformed_table_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");

        let missing = NameIndex::load(&dir.path().join("absent.json"));
        assert!(missing.is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").expect("write");
        assert!(NameIndex::load(&bad).is_empty());

        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"[{"id": "RTS01", "name": "রবীন্দ্রনাথ ঠাকুর"}]"#)
            .expect("write");
        assert_eq!(NameIndex::load(&good).len(), 1);
    }
}
