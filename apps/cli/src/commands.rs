//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use songbook_core::pipeline::{BuildConfig, BuildResult, ProgressReporter};
use songbook_names::{NameIndex, RESOLVE_THRESHOLD};
use songbook_shared::{AppConfig, api_key, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Songbook: turn a lyrics data file into a song catalog.
#[derive(Parser)]
#[command(
    name = "songbook",
    version,
    about = "Extract, deduplicate, and enrich song lyrics into a JSON catalog.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.songbook/songbook.toml.
    #[arg(long, global = true, env = "SONGBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the song catalog from a lyrics source.
    Build {
        /// Lyrics source file (defaults to lyrics.ts).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Catalog output file (defaults to songs.json).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Contributor table JSON (defaults to contributors.json).
        #[arg(short, long)]
        contributors: Option<PathBuf>,

        /// Attribute entries to contributors named in source comments.
        #[arg(long)]
        attribution: bool,

        /// Skip enrichment even if an API key is set.
        #[arg(long)]
        no_enrich: bool,

        /// Model to request for enrichment.
        #[arg(long)]
        model: Option<String>,
    },

    /// Resolve contributor names to ids using the contributor table.
    Resolve {
        /// Names to resolve.
        #[arg(required = true)]
        names: Vec<String>,

        /// Contributor table JSON (defaults to contributors.json).
        #[arg(short, long)]
        contributors: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "songbook=info",
        1 => "songbook=debug",
        _ => "songbook=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Build {
            input,
            output,
            contributors,
            attribution,
            no_enrich,
            model,
        } => {
            let overrides = BuildOverrides {
                input,
                output,
                contributors,
                attribution,
                no_enrich,
                model,
            };
            cmd_build(config, overrides).await
        }
        Command::Resolve {
            names,
            contributors,
        } => cmd_resolve(&config, &names, contributors),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

/// `build` flags layered over the config file.
struct BuildOverrides {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    contributors: Option<PathBuf>,
    attribution: bool,
    no_enrich: bool,
    model: Option<String>,
}

impl BuildOverrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(input) = self.input {
            config.paths.input = input;
        }
        if let Some(output) = self.output {
            config.paths.output = output;
        }
        if let Some(contributors) = self.contributors {
            config.paths.contributors = contributors;
        }
        if self.attribution {
            config.attribution.enabled = true;
        }
        if let Some(model) = self.model {
            config.enrichment.model = model;
        }
    }
}

async fn cmd_build(mut config: AppConfig, overrides: BuildOverrides) -> Result<()> {
    let no_enrich = overrides.no_enrich;
    overrides.apply(&mut config);
    config.validate()?;

    let key = if no_enrich { None } else { api_key(&config) };
    if key.is_none() && !no_enrich {
        info!(
            env = %config.enrichment.api_key_env,
            "no API key set, metadata enrichment disabled"
        );
    }

    let build_config = BuildConfig::from_app(&config, key);

    info!(
        input = %build_config.input.display(),
        output = %build_config.output.display(),
        attribution = build_config.parse.attribution,
        enrich = build_config.enrichment.is_some(),
        "building catalog"
    );

    let reporter = CliProgress::new();
    let result = songbook_core::pipeline::run(&build_config, &reporter).await;
    reporter.finish();
    let result = result?;

    let output_path = std::fs::canonicalize(&result.output).unwrap_or(result.output.clone());

    println!();
    println!("  Catalog written successfully!");
    println!("  Found:      {}", result.found);
    println!("  Skipped:    {} (empty lyrics)", result.skipped);
    println!("  Duplicates: {}", result.duplicates);
    println!("  Enriched:   {}", result.enriched);
    println!("  Written:    {}", result.written);
    println!("  Path:       {}", output_path.display());
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn entry_processed(&self, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Assembling [{current}/{total}] {title}"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

fn cmd_resolve(config: &AppConfig, names: &[String], contributors: Option<PathBuf>) -> Result<()> {
    let path = contributors.unwrap_or_else(|| config.paths.contributors.clone());
    let index = NameIndex::load(&path);
    if index.is_empty() {
        return Err(eyre!(
            "contributor table '{}' is missing, malformed, or empty",
            path.display()
        ));
    }

    for name in names {
        let resolved = songbook_names::resolve(std::slice::from_ref(name), &index);
        let score = index.best_match(name).map(|(_, score)| score).unwrap_or(0.0);
        match resolved.first() {
            Some(id) => println!("{name}\t{id}\t{score:.2}"),
            None => println!("{name}\t-\t{score:.2} (below {RESOLVE_THRESHOLD})"),
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
