//! Application configuration for docqa.
//!
//! User config lives at `~/.docqa/docqa.toml`. CLI flags override config
//! file values, which override defaults. The TOML-facing [`AppConfig`] is
//! validated into the runtime [`PipelineConfig`] consumed by the core.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DocqaError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docqa.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docqa";

// ---------------------------------------------------------------------------
// Config structs (matching docqa.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Documentation site settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Chunking settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding collaborator settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Completion collaborator settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Chunk refinement settings.
    #[serde(default)]
    pub refine: RefineConfig,

    /// On-disk storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[site]` section — the crawl target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the documentation site (e.g. `https://docs.example.com`).
    #[serde(default)]
    pub base_url: String,

    /// Path prefix links must start with to be crawled.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// CSS selector for the primary content container. Falls back to the
    /// whole document when it matches nothing.
    #[serde(default = "default_content_selector")]
    pub content_selector: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            base_path: default_base_path(),
            content_selector: default_content_selector(),
        }
    }
}

fn default_base_path() -> String {
    "/".into()
}
fn default_content_selector() -> String {
    "div.theme-doc-markdown".into()
}

/// `[chunking]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Size threshold in bytes; chunks never exceed 1.2× this value.
    #[serde(default = "default_chunk_size")]
    pub size_threshold: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size_threshold: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider: `ollama` (HTTP endpoint) or `hash` (deterministic offline).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Base URL of the embedding endpoint (Ollama-style `/api/embed`).
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    /// Embedding model identity. Must match between index build and query.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimensionality for the `hash` provider.
    #[serde(default = "default_hash_dims")]
    pub dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            endpoint: default_ollama_endpoint(),
            model: default_embedding_model(),
            dims: default_hash_dims(),
        }
    }
}

fn default_embedding_provider() -> String {
    "ollama".into()
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_hash_dims() -> usize {
    256
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of the completion endpoint (Ollama-style `/api/generate`).
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    /// Completion model identity sent with every request.
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// When set, every completion returns the contents of this file instead
    /// of contacting the model. Keeps pipeline runs deterministic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_answer: Option<PathBuf>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_completion_model(),
            sample_answer: None,
        }
    }
}

fn default_completion_model() -> String {
    "llama3.1".into()
}

/// `[refine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Refinement mode: `disabled`, `sample`, or `model`.
    #[serde(default = "default_refine_mode")]
    pub mode: String,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            mode: default_refine_mode(),
        }
    }
}

fn default_refine_mode() -> String {
    "disabled".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Working directory holding chunk files, manifest, and index blob.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.docqa/site".into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

// ---------------------------------------------------------------------------
// Runtime pipeline config (validated, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Chunk refinement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineMode {
    /// Skip the refinement chain entirely.
    Disabled,
    /// Run the chain as the identity (deterministic, no model calls).
    Sample,
    /// Run every pass against the completion collaborator.
    Model,
}

impl FromStr for RefineMode {
    type Err = DocqaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "disabled" | "off" => Ok(Self::Disabled),
            "sample" => Ok(Self::Sample),
            "model" => Ok(Self::Model),
            other => Err(DocqaError::config(format!(
                "unknown refine mode `{other}` (expected disabled, sample, or model)"
            ))),
        }
    }
}

/// Validated runtime configuration consumed by the pipeline core.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL of the documentation site (no trailing slash).
    pub base_url: Url,
    /// Path prefix links must start with.
    pub base_path: String,
    /// CSS selector for the primary content container.
    pub content_selector: String,
    /// Chunk size threshold in bytes.
    pub chunk_size: usize,
    /// Working directory for chunk files, manifest, and index blob.
    pub working_dir: PathBuf,
    /// Embedding collaborator settings.
    pub embedding: EmbeddingConfig,
    /// Completion collaborator settings.
    pub completion: CompletionConfig,
    /// Chunk refinement mode.
    pub refine: RefineMode,
}

impl PipelineConfig {
    /// Validate an [`AppConfig`] into a runtime pipeline configuration.
    pub fn from_app(config: &AppConfig) -> Result<Self> {
        if config.site.base_url.is_empty() {
            return Err(DocqaError::config(
                "site base_url is not set; run `docqa config init` and edit the config file",
            ));
        }

        let base_url = Url::parse(config.site.base_url.trim_end_matches('/'))
            .map_err(|e| DocqaError::config(format!("invalid site base_url: {e}")))?;

        if !config.site.base_path.starts_with('/') {
            return Err(DocqaError::config(format!(
                "site base_path must start with `/`, got `{}`",
                config.site.base_path
            )));
        }

        if config.chunking.size_threshold == 0 {
            return Err(DocqaError::config("chunking size_threshold must be > 0"));
        }

        let refine = config.refine.mode.parse()?;

        Ok(Self {
            base_url,
            base_path: config.site.base_path.clone(),
            content_selector: config.site.content_selector.clone(),
            chunk_size: config.chunking.size_threshold,
            working_dir: expand_tilde(&config.storage.data_dir),
            embedding: config.embedding.clone(),
            completion: config.completion.clone(),
            refine,
        })
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docqa/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocqaError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docqa/docqa.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| DocqaError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocqaError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocqaError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocqaError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocqaError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_path"));
        assert!(toml_str.contains("theme-doc-markdown"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.chunking.size_threshold, 1000);
        assert_eq!(parsed.embedding.provider, "ollama");
        assert_eq!(parsed.server.port, 8080);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[site]
base_url = "https://docs.example.com"
base_path = "/docs"

[chunking]
size_threshold = 500
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.site.base_url, "https://docs.example.com");
        assert_eq!(config.site.content_selector, "div.theme-doc-markdown");
        assert_eq!(config.chunking.size_threshold, 500);
        assert_eq!(config.refine.mode, "disabled");
    }

    #[test]
    fn pipeline_config_requires_base_url() {
        let config = AppConfig::default();
        let result = PipelineConfig::from_app(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("base_url"));
    }

    #[test]
    fn pipeline_config_rejects_bad_base_path() {
        let mut config = AppConfig::default();
        config.site.base_url = "https://docs.example.com".into();
        config.site.base_path = "docs".into();
        assert!(PipelineConfig::from_app(&config).is_err());
    }

    #[test]
    fn pipeline_config_trims_trailing_slash() {
        let mut config = AppConfig::default();
        config.site.base_url = "https://docs.example.com/".into();
        config.site.base_path = "/docs".into();
        let pc = PipelineConfig::from_app(&config).expect("valid config");
        assert_eq!(pc.base_url.as_str(), "https://docs.example.com/");
        assert_eq!(pc.base_path, "/docs");
    }

    #[test]
    fn refine_mode_parsing() {
        assert_eq!(
            "sample".parse::<RefineMode>().unwrap(),
            RefineMode::Sample
        );
        assert_eq!("off".parse::<RefineMode>().unwrap(), RefineMode::Disabled);
        assert!("banana".parse::<RefineMode>().is_err());
    }
}
