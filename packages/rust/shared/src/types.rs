//! Core domain types for the docqa pipeline.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DocqaError, Result};

/// File name of the chunk manifest inside the working directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of the binary similarity-index blob inside the working directory.
pub const INDEX_FILE: &str = "index.bin";

/// Subdirectory holding generated question sets, one file per chunk.
pub const QUESTIONS_DIR: &str = "questions";

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// The `manifest.json` structure stored in the working directory.
///
/// `links[i]` is the chunk file whose text was embedded into row `i` of the
/// vector index. The pairing is written as one unit by the index builder and
/// must never desynchronize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Chunk file paths, relative to the working directory, in index-row order.
    pub links: Vec<String>,

    /// Embedding model identity used for the build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// When the index build completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
}

impl Manifest {
    /// Number of chunk entries (equals the index row count).
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the manifest holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Load a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DocqaError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            DocqaError::validation(format!("malformed manifest {}: {e}", path.display()))
        })
    }

    /// Write the manifest as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| DocqaError::validation(format!("failed to serialize manifest: {e}")))?;
        std::fs::write(path, content).map_err(|e| DocqaError::io(path, e))
    }
}

// ---------------------------------------------------------------------------
// DocumentChunk
// ---------------------------------------------------------------------------

/// A bounded-size unit of page text, stored and embedded independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// The page link this chunk was generated from.
    pub source_link: String,
    /// Index of the header section within the page.
    pub section: usize,
    /// Index of the overlap window within the section segment.
    pub window: usize,
    /// Chunk text.
    pub text: String,
    /// Deterministic file name derived from (link, section, window).
    pub file_name: String,
}
