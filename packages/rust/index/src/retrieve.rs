//! Query-time retrieval over a persisted index.
//!
//! A [`Retriever`] opens a working directory containing the chunk manifest
//! and index file, checks they agree row-for-row, and answers queries with
//! the nearest chunk texts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use docqa_shared::types::{INDEX_FILE, MANIFEST_FILE};
use docqa_shared::{DocqaError, Manifest, Result};

use crate::embed::Embedder;
use crate::flat::FlatIndex;

/// A chunk returned from retrieval, closest first.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// The chunk text read from disk.
    pub text: String,
    /// Squared Euclidean distance from the query vector.
    pub distance: f32,
    /// Path of the chunk file the text came from.
    pub path: PathBuf,
}

/// Read-side handle over a built working directory.
#[derive(Debug)]
pub struct Retriever {
    working_dir: PathBuf,
    manifest: Manifest,
    index: FlatIndex,
}

impl Retriever {
    /// Open the manifest and index under `working_dir`, verifying they
    /// describe the same number of chunks.
    pub fn open(working_dir: &Path) -> Result<Self> {
        let manifest = Manifest::load(&working_dir.join(MANIFEST_FILE))?;
        let index = FlatIndex::load(&working_dir.join(INDEX_FILE))?;

        if manifest.len() != index.len() {
            return Err(DocqaError::Index(format!(
                "manifest lists {} chunks but index has {} rows",
                manifest.len(),
                index.len()
            )));
        }

        debug!(
            dir = %working_dir.display(),
            chunks = manifest.len(),
            model = index.model_id(),
            "opened retriever"
        );

        Ok(Self {
            working_dir: working_dir.to_path_buf(),
            manifest,
            index,
        })
    }

    /// Number of retrievable chunks.
    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// The manifest backing this retriever.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Model identity recorded in the index file.
    pub fn model_id(&self) -> &str {
        self.index.model_id()
    }

    /// Embed `query` and return the `k` nearest chunks, closest first.
    /// `k` larger than the corpus returns the whole corpus.
    ///
    /// A query embedder whose model differs from the one the index was
    /// built with is allowed but logged, since distances across models are
    /// not meaningful.
    pub async fn retrieve(
        &self,
        embedder: &Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if embedder.model_id() != self.index.model_id() {
            warn!(
                index_model = self.index.model_id(),
                query_model = embedder.model_id(),
                "query embedding model differs from the index's"
            );
        }

        let vector = embedder.embed_query(query).await?;
        let hits = self.index.search(&vector, k)?;

        let mut chunks = Vec::with_capacity(hits.len());
        for (row, distance) in hits {
            let path = self.working_dir.join(&self.manifest.links[row]);
            let text = fs::read_to_string(&path).map_err(|e| DocqaError::io(&path, e))?;
            chunks.push(RetrievedChunk {
                text,
                distance,
                path,
            });
        }

        Ok(chunks)
    }
}
