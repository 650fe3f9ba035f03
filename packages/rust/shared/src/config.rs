//! Application configuration for Songbook.
//!
//! User config lives at `~/.songbook/songbook.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SongbookError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "songbook.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".songbook";

/// Allowed range for the attribution comment-match threshold.
const ATTRIBUTION_THRESHOLD_RANGE: std::ops::RangeInclusive<f64> = 0.80..=0.85;

// ---------------------------------------------------------------------------
// Config structs (matching songbook.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Comment-based contributor attribution.
    #[serde(default)]
    pub attribution: AttributionConfig,

    /// Metadata assigned before (or instead of) enrichment.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Text-generation service settings.
    #[serde(default)]
    pub enrichment: EnrichmentSettings,

    /// Catalog file encoding.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Lyrics source (a TypeScript data file).
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// Catalog JSON destination.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Contributor table JSON.
    #[serde(default = "default_contributors")]
    pub contributors: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            contributors: default_contributors(),
        }
    }
}

fn default_input() -> PathBuf {
    "lyrics.ts".into()
}
fn default_output() -> PathBuf {
    "songs.json".into()
}
fn default_contributors() -> PathBuf {
    "contributors.json".into()
}

/// `[attribution]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Whether comments in the source switch the current contributor.
    #[serde(default)]
    pub enabled: bool,

    /// Contributor used for every entry before the first matching comment.
    #[serde(default = "default_contributor")]
    pub default_contributor: String,

    /// Minimum similarity for a fuzzy comment match.
    #[serde(default = "default_attribution_threshold")]
    pub threshold: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_contributor: default_contributor(),
            threshold: default_attribution_threshold(),
        }
    }
}

fn default_contributor() -> String {
    "RTS01".into()
}
fn default_attribution_threshold() -> f64 {
    0.82
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Release year used when nothing better is known.
    #[serde(default = "default_baseline_year")]
    pub baseline_year: i32,

    /// Genre for contributors without an entry in `genres`.
    #[serde(default = "default_fallback_genre")]
    pub fallback_genre: String,

    /// Default genre (and tag) keyed by contributor id.
    #[serde(default = "default_genres")]
    pub genres: BTreeMap<String, String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            baseline_year: default_baseline_year(),
            fallback_genre: default_fallback_genre(),
            genres: default_genres(),
        }
    }
}

impl DefaultsConfig {
    /// Default genre for a contributor.
    pub fn genre_for(&self, contributor_id: &str) -> &str {
        self.genres
            .get(contributor_id)
            .map(String::as_str)
            .unwrap_or(&self.fallback_genre)
    }
}

fn default_baseline_year() -> i32 {
    2000
}
fn default_fallback_genre() -> String {
    "আধুনিক গান".into()
}
fn default_genres() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("RTS01".to_string(), "রবীন্দ্রসংগীত".to_string()),
        ("KNI01".to_string(), "নজরুলগীতি".to_string()),
    ])
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model requested from the service.
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per entry, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause before every attempt.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Pause after a failed attempt, multiplied by the attempt number.
    #[serde(default = "default_failure_backoff_ms")]
    pub failure_backoff_ms: u64,

    /// Characters of lyrics sent along with the title.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            request_delay_ms: default_request_delay_ms(),
            failure_backoff_ms: default_failure_backoff_ms(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_request_delay_ms() -> u64 {
    1_000
}
fn default_failure_backoff_ms() -> u64 {
    2_000
}
fn default_snippet_chars() -> usize {
    200
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Prefix the catalog with a UTF-8 byte order mark.
    #[serde(default = "default_true")]
    pub utf8_bom: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { utf8_bom: true }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !ATTRIBUTION_THRESHOLD_RANGE.contains(&self.attribution.threshold) {
            return Err(SongbookError::config(format!(
                "attribution.threshold must be within {:.2}..={:.2}, got {}",
                ATTRIBUTION_THRESHOLD_RANGE.start(),
                ATTRIBUTION_THRESHOLD_RANGE.end(),
                self.attribution.threshold
            )));
        }
        if self.attribution.default_contributor.trim().is_empty() {
            return Err(SongbookError::config(
                "attribution.default_contributor must not be empty",
            ));
        }
        if self.enrichment.max_attempts == 0 {
            return Err(SongbookError::config(
                "enrichment.max_attempts must be at least 1",
            ));
        }
        Url::parse(&self.enrichment.endpoint).map_err(|e| {
            SongbookError::config(format!(
                "invalid enrichment.endpoint '{}': {e}",
                self.enrichment.endpoint
            ))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.songbook/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SongbookError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.songbook/songbook.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SongbookError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SongbookError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SongbookError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SongbookError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SongbookError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// The enrichment API key, if the configured env var is set and non-empty.
///
/// Its presence is what turns enrichment on.
pub fn api_key(config: &AppConfig) -> Option<String> {
    match std::env::var(&config.enrichment.api_key_env) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("baseline_year"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("রবীন্দ্রসংগীত"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.baseline_year, 2000);
        assert_eq!(parsed.enrichment.max_attempts, 3);
        assert_eq!(parsed.attribution.default_contributor, "RTS01");
        assert!(parsed.output.utf8_bom);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[paths]
input = "data/lyrics.ts"

[attribution]
enabled = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.input, PathBuf::from("data/lyrics.ts"));
        assert_eq!(config.paths.output, PathBuf::from("songs.json"));
        assert!(config.attribution.enabled);
        assert_eq!(config.attribution.threshold, 0.82);
        config.validate().expect("valid");
    }

    #[test]
    fn genre_lookup_falls_back() {
        let defaults = DefaultsConfig::default();
        assert_eq!(defaults.genre_for("RTS01"), "রবীন্দ্রসংগীত");
        assert_eq!(defaults.genre_for("KNI01"), "নজরুলগীতি");
        assert_eq!(defaults.genre_for("XYZ99"), "আধুনিক গান");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.attribution.threshold = 0.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.enrichment.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.enrichment.endpoint = "not a url".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("enrichment.endpoint"));
    }

    #[test]
    fn api_key_absent() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.enrichment.api_key_env = "SONGBOOK_TEST_NONEXISTENT_KEY_12345".into();
        assert!(api_key(&config).is_none());
    }
}
