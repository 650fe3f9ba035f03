//! Shared types, error model, and configuration for Songbook.
//!
//! This crate is the foundation depended on by all other Songbook crates.
//! It provides:
//! - [`SongbookError`]: the unified error type
//! - Domain types ([`RawLyricEntry`], [`CatalogRecord`], [`SongMetadata`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AttributionConfig, DefaultsConfig, EnrichmentSettings, OutputConfig, PathsConfig,
    api_key, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SongbookError};
pub use types::{CatalogRecord, RawLyricEntry, SongMetadata, format_song_id};
