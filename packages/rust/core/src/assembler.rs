//! Catalog assembly.
//!
//! Folds parsed lyric entries into catalog records: title derivation,
//! whitespace-insensitive deduplication, sequential song ids, default
//! metadata, and the merge of enrichment results. Also writes the catalog
//! file.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use songbook_names::{NameIndex, resolve};
use songbook_shared::{
    CatalogRecord, DefaultsConfig, RawLyricEntry, Result, SongMetadata, SongbookError,
    format_song_id,
};
use tracing::{debug, info, instrument};

use crate::enrichment::Enrich;
use crate::pipeline::ProgressReporter;

/// Maximum title length in characters before truncation.
const MAX_TITLE_CHARS: usize = 100;

/// Appended to truncated titles.
const ELLIPSIS: &str = "...";

/// A leading label ("১.", "গান ১২।") is at most this many characters.
const MAX_LABEL_CHARS: usize = 16;

/// Punctuation that ends a label prefix.
const TERMINATORS: [char; 5] = ['.', '।', '॥', '?', '!'];

/// Characters removed from titles.
const STRIPPED_CHARS: [char; 3] = ['\\', '"', '—'];

const UTF8_BOM: &str = "\u{feff}";

// ---------------------------------------------------------------------------
// Titles
// ---------------------------------------------------------------------------

/// Title for a lyric: its first line, cleaned up.
///
/// A short leading label ending in sentence punctuation is dropped when
/// something follows it, quote/backslash/em-dash characters are removed, and
/// long titles are cut to 100 characters plus `...`.
pub fn derive_title(text: &str) -> String {
    let first_line = text.trim().lines().next().unwrap_or_default().trim();
    let unlabelled = strip_label(first_line);

    let cleaned: String = unlabelled
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().count() > MAX_TITLE_CHARS {
        let mut truncated: String = cleaned.chars().take(MAX_TITLE_CHARS).collect();
        truncated.push_str(ELLIPSIS);
        truncated
    } else {
        cleaned.to_string()
    }
}

fn strip_label(line: &str) -> &str {
    let Some((pos, terminator)) = line
        .char_indices()
        .take(MAX_LABEL_CHARS)
        .find(|(_, c)| TERMINATORS.contains(c))
    else {
        return line;
    };

    let rest = line[pos + terminator.len_utf8()..].trim_start();
    if rest.is_empty() { line } else { rest }
}

/// Title with all whitespace removed; equal keys mean the same song.
pub fn dedup_key(title: &str) -> String {
    title.chars().filter(|c| !c.is_whitespace()).collect()
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Record for an entry before any enrichment.
pub fn default_record(
    entry: &RawLyricEntry,
    song_id: String,
    title: String,
    defaults: &DefaultsConfig,
) -> CatalogRecord {
    let contributor = entry.contributor_id.clone();
    let genre = defaults.genre_for(&contributor).to_string();

    CatalogRecord {
        song_id,
        title,
        contributor_ids: BTreeSet::from([contributor.clone()]),
        lyricist_id: contributor.clone(),
        composer_id: contributor,
        lyrics_id: entry.id.clone(),
        section: None,
        genres: BTreeSet::from([genre.clone()]),
        release_year: defaults.baseline_year,
        tags: BTreeSet::from([genre]),
    }
}

/// Apply enrichment results on top of the defaults.
///
/// Genres, tags, and year are taken from the reply together, even where the
/// reply left one of them empty. A missing year becomes `baseline_year`.
/// Names are resolved through the index and only replace the defaults when
/// at least one resolves.
pub fn merge_metadata(
    record: &mut CatalogRecord,
    metadata: &SongMetadata,
    index: &NameIndex,
    baseline_year: i32,
) {
    record.genres = metadata.genres.iter().cloned().collect();
    record.tags = metadata.tags.iter().cloned().collect();
    record.release_year = metadata.release_year.unwrap_or(baseline_year);

    if let Some(id) = resolve(&metadata.lyricists, index).into_iter().next() {
        record.lyricist_id = id;
    }
    if let Some(id) = resolve(&metadata.composers, index).into_iter().next() {
        record.composer_id = id;
    }
    let artists = resolve(&metadata.artists, index);
    if !artists.is_empty() {
        record.contributor_ids = artists;
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Output of [`build_catalog`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Accepted records, ids `S00001..` in order.
    pub records: Vec<CatalogRecord>,
    /// Entries dropped for blank text.
    pub skipped: usize,
    /// Entries dropped as repeats of an earlier title.
    pub duplicates: usize,
    /// Records that received enrichment data.
    pub enriched: usize,
}

/// Fold entries into catalog records, one entry at a time.
///
/// Ids are only consumed by entries that survive the blank-text and dedup
/// filters, so accepted records are numbered without gaps.
#[instrument(skip_all, fields(entries = entries.len()))]
pub async fn build_catalog<E: Enrich>(
    entries: &[RawLyricEntry],
    index: &NameIndex,
    defaults: &DefaultsConfig,
    enricher: &E,
    progress: &dyn ProgressReporter,
) -> Catalog {
    let mut catalog = Catalog::default();
    let mut seen: HashSet<String> = HashSet::new();
    let total = entries.len();

    for (i, entry) in entries.iter().enumerate() {
        if entry.text.trim().is_empty() {
            catalog.skipped += 1;
            continue;
        }

        let title = derive_title(&entry.text);
        if !seen.insert(dedup_key(&title)) {
            debug!(lyrics_id = %entry.id, title = %title, "duplicate title, skipping");
            catalog.duplicates += 1;
            continue;
        }

        let song_id = format_song_id(catalog.records.len() + 1);
        let mut record = default_record(entry, song_id, title, defaults);

        if let Some(metadata) = enricher.enrich(&record.title, &entry.text).await {
            if !metadata.is_empty() {
                merge_metadata(&mut record, &metadata, index, defaults.baseline_year);
                catalog.enriched += 1;
            }
        }

        progress.entry_processed(&record.title, i + 1, total);
        catalog.records.push(record);
    }

    info!(
        records = catalog.records.len(),
        duplicates = catalog.duplicates,
        enriched = catalog.enriched,
        "catalog assembled"
    );

    catalog
}

/// Write the catalog as pretty-printed JSON.
///
/// Non-ASCII text is written as-is. The file is written to a temp sibling
/// and renamed into place.
pub fn write_catalog(path: &Path, records: &[CatalogRecord], utf8_bom: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SongbookError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(records)
        .map_err(|e| SongbookError::validation(format!("failed to serialize catalog: {e}")))?;
    let content = if utf8_bom {
        format!("{UTF8_BOM}{json}")
    } else {
        json
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog.json".into());
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    let written = std::fs::write(&temp, content)
        .map_err(|e| SongbookError::io(&temp, e))
        .and_then(|()| std::fs::rename(&temp, path).map_err(|e| SongbookError::io(path, e)));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    info!(path = %path.display(), records = records.len(), "catalog written");
    Ok(())
}

/// Read a catalog written by [`write_catalog`].
#[cfg(test)]
pub(crate) fn read_catalog(path: &Path) -> Result<Vec<CatalogRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| SongbookError::io(path, e))?;
    serde_json::from_str(content.trim_start_matches(UTF8_BOM))
        .map_err(|e| SongbookError::validation(format!("invalid catalog {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::NoEnrichment;
    use crate::pipeline::SilentProgress;
    use songbook_names::ContributorRecord;

    fn entry(id: &str, text: &str) -> RawLyricEntry {
        RawLyricEntry {
            id: id.into(),
            text: text.into(),
            contributor_id: "RTS01".into(),
        }
    }

    /// Always returns the same metadata.
    struct FixedEnricher(SongMetadata);

    impl Enrich for FixedEnricher {
        async fn enrich(&self, _title: &str, _lyrics: &str) -> Option<SongMetadata> {
            Some(self.0.clone())
        }
    }

    fn index() -> NameIndex {
        NameIndex::from_records(&[
            ContributorRecord {
                id: "RTS01".into(),
                name: "রবীন্দ্রনাথ ঠাকুর".into(),
                alias: vec![],
            },
            ContributorRecord {
                id: "HMK01".into(),
                name: "হেমন্ত মুখোপাধ্যায়".into(),
                alias: vec!["Hemanta Mukherjee".into()],
            },
        ])
    }

    #[test]
    fn title_is_first_line() {
        assert_eq!(derive_title("Hello\nWorld"), "Hello");
        assert_eq!(derive_title("\n\n  Hello  \nWorld"), "Hello");
    }

    #[test]
    fn title_strips_label_prefix() {
        assert_eq!(
            derive_title("১. আমার সোনার বাংলা, আমি তোমায় ভালোবাসি।"),
            "আমার সোনার বাংলা, আমি তোমায় ভালোবাসি।"
        );
        assert_eq!(derive_title("গান ১২। আলো আমার"), "আলো আমার");
        // Nothing after the terminator: keep the line.
        assert_eq!(derive_title("Hello?"), "Hello?");
        // Terminator too far in to be a label.
        assert_eq!(
            derive_title("A fairly long opening line. Then more"),
            "A fairly long opening line. Then more"
        );
    }

    #[test]
    fn label_terminator_at_length_limit() {
        // Terminator is the 16th character: still a label.
        assert_eq!(derive_title("abcdefghijklmno. Title"), "Title");
        // Terminator is the 17th character: part of the title.
        assert_eq!(
            derive_title("abcdefghijklmnop. Title"),
            "abcdefghijklmnop. Title"
        );
        assert_eq!(
            derive_title("This is a longer opening label. Real title"),
            "This is a longer opening label. Real title"
        );
    }

    #[test]
    fn title_removes_quotes_backslashes_and_dashes() {
        assert_eq!(
            derive_title(r#""মোর প্রিয়া" — দেব \খোঁপায়"#),
            "মোর প্রিয়া  দেব খোঁপায়"
        );
    }

    #[test]
    fn long_title_is_truncated() {
        let line = "অ".repeat(150);
        let title = derive_title(&line);
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS + ELLIPSIS.len());
        assert!(title.ends_with("..."));

        let exact = "b".repeat(100);
        assert_eq!(derive_title(&exact), exact);
    }

    #[test]
    fn dedup_key_ignores_whitespace() {
        assert_eq!(dedup_key("আমার  সোনার\tবাংলা"), dedup_key("আমার সোনার বাংলা"));
    }

    #[tokio::test]
    async fn single_entry_gets_defaults() {
        let catalog = build_catalog(
            &[entry("L1", "Hello\nWorld")],
            &NameIndex::default(),
            &DefaultsConfig::default(),
            &NoEnrichment,
            &SilentProgress,
        )
        .await;

        assert_eq!(catalog.records.len(), 1);
        let record = &catalog.records[0];
        assert_eq!(record.song_id, "S00001");
        assert_eq!(record.title, "Hello");
        assert_eq!(record.lyrics_id, "L1");
        assert_eq!(record.lyricist_id, "RTS01");
        assert_eq!(record.composer_id, "RTS01");
        assert_eq!(record.contributor_ids, BTreeSet::from(["RTS01".to_string()]));
        assert_eq!(record.genres, BTreeSet::from(["রবীন্দ্রসংগীত".to_string()]));
        assert_eq!(record.tags, record.genres);
        assert_eq!(record.release_year, 2000);
        assert!(record.section.is_none());
    }

    #[tokio::test]
    async fn duplicates_and_blanks_consume_no_ids() {
        let entries = [
            entry("L1", "আমার সোনার বাংলা\nএক"),
            entry("L2", "   "),
            entry("L3", "আমার  সোনার  বাংলা\nদুই"),
            entry("L4", "আগুনের পরশমণি"),
        ];
        let catalog = build_catalog(
            &entries,
            &NameIndex::default(),
            &DefaultsConfig::default(),
            &NoEnrichment,
            &SilentProgress,
        )
        .await;

        let ids: Vec<_> = catalog
            .records
            .iter()
            .map(|r| (r.song_id.as_str(), r.lyrics_id.as_str()))
            .collect();
        assert_eq!(ids, vec![("S00001", "L1"), ("S00002", "L4")]);
        assert_eq!(catalog.duplicates, 1);
        assert_eq!(catalog.skipped, 1);
    }

    #[tokio::test]
    async fn other_contributors_get_their_genre() {
        let mut nazrul = entry("L1", "চল্ চল্ চল্");
        nazrul.contributor_id = "KNI01".into();
        let mut other = entry("L2", "অন্য গান");
        other.contributor_id = "HMK01".into();

        let catalog = build_catalog(
            &[nazrul, other],
            &NameIndex::default(),
            &DefaultsConfig::default(),
            &NoEnrichment,
            &SilentProgress,
        )
        .await;

        assert!(catalog.records[0].genres.contains("নজরুলগীতি"));
        assert!(catalog.records[1].genres.contains("আধুনিক গান"));
        assert_eq!(catalog.records[1].lyricist_id, "HMK01");
    }

    #[tokio::test]
    async fn enrichment_replaces_defaults() {
        let metadata = SongMetadata {
            genres: vec!["Adhunik".into()],
            lyricists: vec!["রবীন্দ্রনাথ ঠাকুর".into()],
            composers: vec!["Nobody We Know".into()],
            artists: vec!["Hemanta Mukherjee".into()],
            release_year: Some(1958),
            tags: vec!["classic".into(), "film".into()],
        };

        let catalog = build_catalog(
            &[entry("L1", "Hello")],
            &index(),
            &DefaultsConfig::default(),
            &FixedEnricher(metadata),
            &SilentProgress,
        )
        .await;

        let record = &catalog.records[0];
        assert_eq!(record.genres, BTreeSet::from(["Adhunik".to_string()]));
        assert_eq!(
            record.tags,
            BTreeSet::from(["classic".to_string(), "film".to_string()])
        );
        assert_eq!(record.release_year, 1958);
        assert_eq!(record.lyricist_id, "RTS01");
        // Unresolved composer keeps the default.
        assert_eq!(record.composer_id, "RTS01");
        assert_eq!(record.contributor_ids, BTreeSet::from(["HMK01".to_string()]));
        assert_eq!(catalog.enriched, 1);
    }

    #[tokio::test]
    async fn empty_enrichment_keeps_defaults() {
        let catalog = build_catalog(
            &[entry("L1", "Hello")],
            &index(),
            &DefaultsConfig::default(),
            &FixedEnricher(SongMetadata::default()),
            &SilentProgress,
        )
        .await;

        let record = &catalog.records[0];
        assert_eq!(record.genres, BTreeSet::from(["রবীন্দ্রসংগীত".to_string()]));
        assert_eq!(record.release_year, 2000);
        assert_eq!(catalog.enriched, 0);
    }

    #[test]
    fn missing_year_falls_back_to_baseline() {
        let mut record = default_record(
            &entry("L1", "x"),
            "S00001".into(),
            "x".into(),
            &DefaultsConfig::default(),
        );
        record.release_year = 1999;
        let metadata = SongMetadata {
            genres: vec!["Folk".into()],
            ..SongMetadata::default()
        };
        merge_metadata(&mut record, &metadata, &NameIndex::default(), 2000);
        assert_eq!(record.release_year, 2000);
        assert_eq!(record.genres, BTreeSet::from(["Folk".to_string()]));
    }

    #[test]
    fn reply_replaces_genre_tags_and_year_together() {
        let mut record = default_record(
            &entry("L1", "x"),
            "S00001".into(),
            "x".into(),
            &DefaultsConfig::default(),
        );
        let metadata = SongMetadata {
            artists: vec!["Hemanta Mukherjee".into()],
            ..SongMetadata::default()
        };
        merge_metadata(&mut record, &metadata, &index(), 2000);

        assert!(record.genres.is_empty());
        assert!(record.tags.is_empty());
        assert_eq!(record.release_year, 2000);
        assert_eq!(record.contributor_ids, BTreeSet::from(["HMK01".to_string()]));
        assert_eq!(record.lyricist_id, "RTS01");
    }

    #[test]
    fn write_and_read_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out").join("songs.json");
        let record = default_record(
            &entry("L1", "আমার সোনার বাংলা"),
            "S00001".into(),
            "আমার সোনার বাংলা".into(),
            &DefaultsConfig::default(),
        );

        write_catalog(&path, std::slice::from_ref(&record), true).expect("write");

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.starts_with(UTF8_BOM));
        assert!(raw.contains("আমার সোনার বাংলা"));
        assert!(raw.contains("\n  {\n    \"songId\": \"S00001\""));
        assert!(!dir.path().join("out").join(".songs.json.tmp").exists());

        assert_eq!(read_catalog(&path).expect("parse"), vec![record]);
    }

    #[test]
    fn write_without_bom() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("songs.json");
        write_catalog(&path, &[], false).expect("write");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("songs.json");
        std::fs::create_dir(&path).expect("mkdir");
        std::fs::write(path.join("keep.txt"), "occupied").expect("write");

        let err = write_catalog(&path, &[], false).unwrap_err();
        assert!(matches!(err, SongbookError::Io { .. }));
        assert!(!dir.path().join(".songs.json.tmp").exists());
        assert!(path.join("keep.txt").exists());
    }
}
