//! Embedding providers.
//!
//! An [`Embedder`] turns N texts into N equal-length f32 vectors. The model
//! identity is a configuration string resolved to a concrete provider at
//! call time:
//! - `ollama` — calls an Ollama-style `/api/embed` endpoint over HTTP.
//! - `hash` — deterministic offline bag-of-tokens embedder (FNV-1a token
//!   bucketing, L2-normalized). No network; keeps pipeline runs and tests
//!   reproducible.
//!
//! All vectors for one index build must come from one provider instance so
//! the dimension stays uniform.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docqa_shared::config::EmbeddingConfig;
use docqa_shared::{DocqaError, Result};

/// Timeout for embedding requests in seconds.
const EMBED_TIMEOUT_SECS: u64 = 120;

/// An embedding provider, selected from configuration.
pub enum Embedder {
    /// HTTP provider against an Ollama-style endpoint.
    Ollama(OllamaEmbedder),
    /// Deterministic offline provider.
    Hash(HashEmbedder),
}

impl Embedder {
    /// Build the provider named by the configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        match config.provider.as_str() {
            "ollama" => Ok(Self::Ollama(OllamaEmbedder::new(
                &config.endpoint,
                &config.model,
            )?)),
            "hash" => Ok(Self::Hash(HashEmbedder::new(config.dims))),
            other => Err(DocqaError::config(format!(
                "unknown embedding provider `{other}` (expected ollama or hash)"
            ))),
        }
    }

    /// The model identity string recorded with every index build.
    pub fn model_id(&self) -> &str {
        match self {
            Self::Ollama(e) => &e.model,
            Self::Hash(_) => "hash",
        }
    }

    /// Embed a batch of texts, one equal-length vector per input, in input
    /// order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            Self::Ollama(e) => e.embed(texts).await,
            Self::Hash(e) => Ok(texts.iter().map(|t| e.embed_one(t)).collect()),
        }
    }

    /// Embed a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| DocqaError::ExternalService("empty embedding response".into()))
    }
}

// ---------------------------------------------------------------------------
// Ollama provider
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding provider calling an Ollama-style `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbedder {
    /// Create a provider for `endpoint` (base URL) and `model`.
    pub fn new(endpoint: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(EMBED_TIMEOUT_SECS))
            .build()
            .map_err(|e| DocqaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.endpoint);
        debug!(%url, model = %self.model, batch = texts.len(), "requesting embeddings");

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| DocqaError::ExternalService(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocqaError::ExternalService(format!(
                "embedding endpoint returned HTTP {status}"
            )));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            DocqaError::ExternalService(format!("malformed embedding response: {e}"))
        })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(DocqaError::ExternalService(format!(
                "embedding count mismatch: sent {} texts, got {} vectors",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(parsed.embeddings)
    }
}

// ---------------------------------------------------------------------------
// Hash provider
// ---------------------------------------------------------------------------

/// Deterministic bag-of-tokens embedder.
///
/// Tokens are lowercased alphanumeric runs, hashed with FNV-1a into one of
/// `dims` buckets; the bucket-count vector is L2-normalized. Texts sharing
/// tokens land near each other, which is enough structure for deterministic
/// retrieval without a live embedding collaborator.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    /// Create a hash embedder with the given dimensionality.
    pub fn new(dims: usize) -> Self {
        Self {
            dims: dims.max(1),
        }
    }

    /// Embed one text.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];

        for token in tokens(text) {
            let bucket = (fnv1a64(token.as_bytes()) % self.dims as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

/// Lowercased alphanumeric token runs.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// FNV-1a 64-bit hash.
fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
