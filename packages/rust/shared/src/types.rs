//! Core domain types for the Songbook catalog.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// Width of the numeric part of a song id (`S00001`).
const SONG_ID_WIDTH: usize = 5;

/// Format the `n`th accepted song as a catalog id.
pub fn format_song_id(n: usize) -> String {
    format!("S{n:0width$}", width = SONG_ID_WIDTH)
}

// ---------------------------------------------------------------------------
// RawLyricEntry
// ---------------------------------------------------------------------------

/// One `id`/`lyrics` block pulled out of the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLyricEntry {
    /// Lyrics identifier (`L` followed by digits).
    pub id: String,
    /// Lyrics exactly as they appear between the fences.
    pub text: String,
    /// Contributor in effect where the block appears.
    pub contributor_id: String,
}

// ---------------------------------------------------------------------------
// CatalogRecord
// ---------------------------------------------------------------------------

/// A single entry of the output catalog (`songs.json`).
///
/// Field names on the wire follow the format the consuming app reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    /// Sequential id (`S00001`, `S00002`, ...).
    pub song_id: String,
    /// Title derived from the first lyric line.
    pub title: String,
    /// Performing contributors.
    #[serde(rename = "artistId")]
    pub contributor_ids: BTreeSet<String>,
    pub lyricist_id: String,
    pub composer_id: String,
    /// Id of the source lyrics block.
    pub lyrics_id: String,
    /// Song section/category; never filled in by this tool.
    #[serde(rename = "parjaay")]
    pub section: Option<String>,
    #[serde(rename = "genre")]
    pub genres: BTreeSet<String>,
    pub release_year: i32,
    pub tags: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// SongMetadata
// ---------------------------------------------------------------------------

/// Metadata returned by the text-generation service for one song.
///
/// Every key is optional in the reply; missing lists come back empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongMetadata {
    #[serde(default, alias = "genre", deserialize_with = "string_or_seq")]
    pub genres: Vec<String>,
    #[serde(default, alias = "lyricist", deserialize_with = "string_or_seq")]
    pub lyricists: Vec<String>,
    #[serde(default, alias = "composer", deserialize_with = "string_or_seq")]
    pub composers: Vec<String>,
    #[serde(default, alias = "artist", deserialize_with = "string_or_seq")]
    pub artists: Vec<String>,
    #[serde(default, alias = "release_year", deserialize_with = "lenient_year")]
    pub release_year: Option<i32>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub tags: Vec<String>,
}

impl SongMetadata {
    /// True when the reply carried nothing usable.
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
            && self.lyricists.is_empty()
            && self.composers.is_empty()
            && self.artists.is_empty()
            && self.release_year.is_none()
            && self.tags.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Lenient deserializers
// ---------------------------------------------------------------------------

/// Accept `null`, a single string, or an array of strings.
///
/// Blank strings are dropped.
pub fn string_or_seq<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<Option<String>>),
    }

    let values = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v.into_iter().flatten().collect(),
    };

    Ok(values
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Accept a year as a number, a numeric string, or `null`. Zero counts as absent.
fn lenient_year<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let year = match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i32>().ok(),
        _ => None,
    };
    Ok(year.filter(|y| *y != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_id_is_zero_padded() {
        assert_eq!(format_song_id(1), "S00001");
        assert_eq!(format_song_id(4321), "S04321");
        assert_eq!(format_song_id(123456), "S123456");
    }

    #[test]
    fn record_uses_wire_names() {
        let record = CatalogRecord {
            song_id: "S00001".into(),
            title: "আমার সোনার বাংলা".into(),
            contributor_ids: BTreeSet::from(["RTS01".to_string()]),
            lyricist_id: "RTS01".into(),
            composer_id: "RTS01".into(),
            lyrics_id: "L1".into(),
            section: None,
            genres: BTreeSet::from(["রবীন্দ্রসংগীত".to_string()]),
            release_year: 2000,
            tags: BTreeSet::from(["রবীন্দ্রসংগীত".to_string()]),
        };

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["songId"], "S00001");
        assert_eq!(json["artistId"][0], "RTS01");
        assert_eq!(json["lyricsId"], "L1");
        assert!(json["parjaay"].is_null());
        assert_eq!(json["genre"][0], "রবীন্দ্রসংগীত");
        assert_eq!(json["releaseYear"], 2000);
    }

    #[test]
    fn metadata_accepts_loose_shapes() {
        let json = r#"{
            "genre": "Folk",
            "lyricists": ["Lalon Fakir", "", null],
            "composers": null,
            "releaseYear": "1965",
            "tags": ["baul"]
        }"#;
        let meta: SongMetadata = serde_json::from_str(json).expect("deserialize");
        assert_eq!(meta.genres, vec!["Folk"]);
        assert_eq!(meta.lyricists, vec!["Lalon Fakir"]);
        assert!(meta.composers.is_empty());
        assert!(meta.artists.is_empty());
        assert_eq!(meta.release_year, Some(1965));
        assert!(!meta.is_empty());
    }

    #[test]
    fn metadata_zero_year_is_absent() {
        let meta: SongMetadata =
            serde_json::from_str(r#"{"releaseYear": 0}"#).expect("deserialize");
        assert_eq!(meta.release_year, None);
        assert!(meta.is_empty());
    }
}
