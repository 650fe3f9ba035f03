//! End-to-end `build` pipeline: lyrics source → parse → assemble (+ enrich) → catalog file.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument, warn};

use songbook_names::NameIndex;
use songbook_parser::{ParseOptions, parse_source};
use songbook_shared::{AppConfig, DefaultsConfig, EnrichmentSettings, Result, SongbookError};

use crate::assembler::{build_catalog, write_catalog};
use crate::enrichment::{Enrich, Enricher, NoEnrichment, RetryPolicy};
use crate::openrouter::OpenRouterClient;

/// Configuration for the `build` pipeline.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Lyrics source file.
    pub input: PathBuf,
    /// Catalog destination.
    pub output: PathBuf,
    /// Contributor table.
    pub contributors: PathBuf,
    /// Attribution settings for the parser.
    pub parse: ParseOptions,
    /// Pre-enrichment metadata.
    pub defaults: DefaultsConfig,
    /// Service settings and API key; `None` disables enrichment.
    pub enrichment: Option<(EnrichmentSettings, String)>,
    /// Prefix the catalog with a UTF-8 BOM.
    pub utf8_bom: bool,
}

impl BuildConfig {
    /// Runtime config from the loaded app config and the resolved API key.
    pub fn from_app(config: &AppConfig, api_key: Option<String>) -> Self {
        Self {
            input: config.paths.input.clone(),
            output: config.paths.output.clone(),
            contributors: config.paths.contributors.clone(),
            parse: ParseOptions::from(&config.attribution),
            defaults: config.defaults.clone(),
            enrichment: api_key.map(|key| (config.enrichment.clone(), key)),
            utf8_bom: config.output.utf8_bom,
        }
    }
}

/// Result of the `build` pipeline.
#[derive(Debug)]
pub struct BuildResult {
    /// Where the catalog was written.
    pub output: PathBuf,
    /// `id`/`lyrics` blocks found in the source.
    pub found: usize,
    /// Blocks dropped for blank lyrics.
    pub skipped: usize,
    /// Entries dropped as duplicate titles.
    pub duplicates: usize,
    /// Records that received enrichment data.
    pub enriched: usize,
    /// Records written.
    pub written: usize,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each accepted entry has been assembled.
    fn entry_processed(&self, title: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn entry_processed(&self, _title: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Run the pipeline, enriching through the configured service if an API key is set.
pub async fn run(config: &BuildConfig, progress: &dyn ProgressReporter) -> Result<BuildResult> {
    match &config.enrichment {
        Some((settings, api_key)) => match OpenRouterClient::new(settings, api_key) {
            Ok(client) => {
                info!(model = %settings.model, "enrichment enabled");
                let enricher =
                    Enricher::new(client, RetryPolicy::from(settings), settings.snippet_chars);
                build(config, &enricher, progress).await
            }
            Err(e) => {
                warn!(error = %e, "enrichment client unavailable, keeping defaults");
                build(config, &NoEnrichment, progress).await
            }
        },
        None => {
            info!("enrichment disabled");
            build(config, &NoEnrichment, progress).await
        }
    }
}

/// Run the full `build` pipeline with the given enricher.
///
/// 1. Read the lyrics source
/// 2. Load the contributor index
/// 3. Parse entries (with attribution if enabled)
/// 4. Assemble records, enriching each one
/// 5. Write the catalog
#[instrument(skip_all, fields(input = %config.input.display(), output = %config.output.display()))]
pub async fn build<E: Enrich>(
    config: &BuildConfig,
    enricher: &E,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();

    // --- Phase 1: Read source ---
    progress.phase("Reading lyrics source");
    if !config.input.exists() {
        return Err(SongbookError::InputNotFound {
            path: config.input.clone(),
        });
    }
    let content = std::fs::read_to_string(&config.input)
        .map_err(|e| SongbookError::io(&config.input, e))?;
    info!(chars = content.chars().count(), "lyrics source read");

    // --- Phase 2: Contributor index ---
    progress.phase("Loading contributor table");
    let index = NameIndex::load(&config.contributors);

    // --- Phase 3: Parse ---
    progress.phase("Extracting lyric entries");
    let parsed = parse_source(&content, &config.parse, &index);
    if parsed.matched == 0 {
        warn!(path = %config.input.display(), "no lyric entries found");
        return Err(SongbookError::NoEntries {
            path: config.input.clone(),
        });
    }

    // --- Phase 4: Assemble ---
    progress.phase("Assembling catalog");
    let catalog = build_catalog(
        &parsed.entries,
        &index,
        &config.defaults,
        enricher,
        progress,
    )
    .await;

    // --- Phase 5: Write ---
    progress.phase("Writing catalog");
    write_catalog(&config.output, &catalog.records, config.utf8_bom)?;

    let result = BuildResult {
        output: config.output.clone(),
        found: parsed.matched,
        skipped: parsed.skipped + catalog.skipped,
        duplicates: catalog.duplicates,
        enriched: catalog.enriched,
        written: catalog.records.len(),
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        found = result.found,
        skipped = result.skipped,
        duplicates = result.duplicates,
        written = result.written,
        elapsed_ms = result.elapsed.as_millis(),
        "build pipeline complete"
    );

    Ok(result)
}
