//! Metadata enrichment via an external text-generation service.
//!
//! For each song a fixed prompt (title + lyrics excerpt) is sent to a
//! [`TextGenerator`], the first JSON object in the reply is deserialized into
//! [`SongMetadata`], and failures are retried a bounded number of times.
//! Enrichment is best-effort: exhausting the retries yields `None`, never an
//! error.

use std::future::Future;
use std::time::Duration;

use songbook_shared::{EnrichmentSettings, Result, SongMetadata, SongbookError};
use tracing::{debug, instrument, warn};

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Something that turns a prompt into free text (a hosted model, a stub).
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>>;
}

/// Metadata lookup for one song.
pub trait Enrich {
    /// Metadata for the song, or `None` when nothing could be obtained.
    fn enrich(&self, title: &str, lyrics: &str) -> impl Future<Output = Option<SongMetadata>>;
}

/// Enrichment switched off: every song keeps its defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl Enrich for NoEnrichment {
    async fn enrich(&self, _title: &str, _lyrics: &str) -> Option<SongMetadata> {
        None
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Bounded retry with a fixed pre-request pause and linear failure backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause before every attempt.
    pub request_delay: Duration,
    /// Pause after the n-th failure is `failure_backoff * n`.
    pub failure_backoff: Duration,
}

impl From<&EnrichmentSettings> for RetryPolicy {
    fn from(settings: &EnrichmentSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            request_delay: Duration::from_millis(settings.request_delay_ms),
            failure_backoff: Duration::from_millis(settings.failure_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// No pauses at all.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            request_delay: Duration::ZERO,
            failure_backoff: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Prompt-building, retrying enricher over any [`TextGenerator`].
#[derive(Debug, Clone)]
pub struct Enricher<G> {
    generator: G,
    policy: RetryPolicy,
    snippet_chars: usize,
}

impl<G: TextGenerator> Enricher<G> {
    pub fn new(generator: G, policy: RetryPolicy, snippet_chars: usize) -> Self {
        Self {
            generator,
            policy,
            snippet_chars,
        }
    }

    /// One request/parse round trip.
    async fn attempt(&self, prompt: &str) -> Result<SongMetadata> {
        let reply = self.generator.generate(prompt).await?;
        parse_reply(&reply)
    }
}

impl<G: TextGenerator> Enrich for Enricher<G> {
    #[instrument(skip_all, fields(title = %title))]
    async fn enrich(&self, title: &str, lyrics: &str) -> Option<SongMetadata> {
        let prompt = build_prompt(title, &snippet(lyrics, self.snippet_chars));

        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.request_delay).await;

            match self.attempt(&prompt).await {
                Ok(metadata) => {
                    debug!(attempt, "enrichment succeeded");
                    return Some(metadata);
                }
                Err(e) => {
                    warn!(attempt, max = self.policy.max_attempts, error = %e, "enrichment attempt failed");
                    tokio::time::sleep(self.policy.failure_backoff * attempt).await;
                }
            }
        }

        warn!("enrichment retries exhausted, keeping defaults");
        None
    }
}

// ---------------------------------------------------------------------------
// Prompt & reply handling
// ---------------------------------------------------------------------------

/// First `max_chars` characters of the trimmed lyrics.
pub(crate) fn snippet(lyrics: &str, max_chars: usize) -> String {
    lyrics.trim().chars().take(max_chars).collect()
}

/// The fixed prompt sent for every song.
pub(crate) fn build_prompt(title: &str, snippet: &str) -> String {
    format!(
        r#"You are a music archivist cataloguing Bengali songs.

Song title: {title}
Lyrics (excerpt):
{snippet}

Identify the song and return ONLY a JSON object, with no prose and no markdown, matching this schema:
{{"genres": [string], "lyricists": [string], "composers": [string], "artists": [string], "releaseYear": number or null, "tags": [string]}}

Write names the way they are commonly written in Bengali script. Use [] or null for anything you do not know.

JSON:"#
    )
}

/// Deserialize the metadata object embedded in a model reply.
pub(crate) fn parse_reply(reply: &str) -> Result<SongMetadata> {
    let json = extract_json_object(reply).ok_or_else(|| {
        SongbookError::parse(format!(
            "no JSON object in reply: {}",
            reply.chars().take(200).collect::<String>()
        ))
    })?;

    serde_json::from_str(json)
        .map_err(|e| SongbookError::Enrichment(format!("reply does not match schema: {e}")))
}

/// Locate the first top-level JSON object in free text.
///
/// A fenced code block is searched first when one is present; otherwise the
/// object is brace-matched from the first `{`, ignoring braces in strings.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(fenced) = fenced_block(text) {
        if let Some(object) = balanced_object(fenced) {
            return Some(object);
        }
    }
    balanced_object(text)
}

/// Body of the first ```` ``` ```` fence, language tag dropped.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let rest = &rest[body_start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
