//! Shared types, error model, and configuration for docqa.
//!
//! This crate is the foundation depended on by all other docqa crates.
//! It provides:
//! - [`DocqaError`] — the unified error type
//! - Domain types ([`Manifest`], [`DocumentChunk`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, EmbeddingConfig, PipelineConfig, RefineMode, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DocqaError, Result};
pub use types::{DocumentChunk, INDEX_FILE, MANIFEST_FILE, Manifest, QUESTIONS_DIR};
