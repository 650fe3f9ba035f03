//! Lyric block extraction and contributor attribution.
//!
//! Pulls `id`/`lyrics` blocks out of the source file in order. With
//! attribution enabled, comments between blocks name the contributor of the
//! blocks that follow them:
//!
//! ```text
//! // রবীন্দ্রনাথ ঠাকুর
//! { id: "L1", lyrics: `...` },   <- RTS01
//! // কাজী নজরুল ইসলাম
//! { id: "L2", lyrics: `...` },   <- KNI01
//! // (unknown name, context unchanged)
//! { id: "L3", lyrics: `...` },   <- KNI01
//! ```

mod scanner;

use songbook_names::NameIndex;
use songbook_shared::{AttributionConfig, RawLyricEntry};
use tracing::{debug, info, instrument};

use scanner::Token;

// ---------------------------------------------------------------------------
// Options & output
// ---------------------------------------------------------------------------

/// How entries are attributed to contributors.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Let comments switch the current contributor.
    pub attribution: bool,
    /// Contributor before the first matching comment (or always, without attribution).
    pub default_contributor: String,
    /// Minimum similarity for a fuzzy comment match.
    pub threshold: f64,
}

impl From<&AttributionConfig> for ParseOptions {
    fn from(config: &AttributionConfig) -> Self {
        Self {
            attribution: config.enabled,
            default_contributor: config.default_contributor.clone(),
            threshold: config.threshold,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from(&AttributionConfig::default())
    }
}

/// Result of parsing a lyrics source.
#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    /// Non-empty entries in source order.
    pub entries: Vec<RawLyricEntry>,
    /// Blocks matched, including empty ones.
    pub matched: usize,
    /// Blocks dropped because their text was blank.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Extract lyric entries from the source text.
#[instrument(skip_all, fields(bytes = content.len(), attribution = options.attribution))]
pub fn parse_source(content: &str, options: &ParseOptions, index: &NameIndex) -> ParsedSource {
    let tokens = if options.attribution {
        scanner::scan_tokens(content)
    } else {
        scanner::scan_blocks(content)
    };

    let mut parsed = ParsedSource::default();
    let mut current = options.default_contributor.as_str();

    for token in tokens {
        match token {
            Token::Comment(comment) => {
                if let Some(id) = attribute(comment, index, options.threshold) {
                    if id != current {
                        debug!(comment = comment.trim(), contributor = id, "attribution changed");
                    }
                    current = id;
                }
            }
            Token::Block { id, text } => {
                parsed.matched += 1;
                if text.trim().is_empty() {
                    debug!(lyrics_id = id, "empty lyrics, skipping");
                    parsed.skipped += 1;
                    continue;
                }
                parsed.entries.push(RawLyricEntry {
                    id: id.to_string(),
                    text: text.to_string(),
                    contributor_id: current.to_string(),
                });
            }
        }
    }

    info!(
        matched = parsed.matched,
        entries = parsed.entries.len(),
        skipped = parsed.skipped,
        "lyrics source parsed"
    );

    parsed
}

/// Contributor named by a comment, if any candidate matches the index.
fn attribute<'i>(comment: &str, index: &'i NameIndex, threshold: f64) -> Option<&'i str> {
    scanner::comment_candidates(comment)
        .into_iter()
        .find_map(|candidate| index.lookup(candidate, threshold))
}
