//! Flat squared-Euclidean similarity index.
//!
//! Vectors are stored row-major in one contiguous buffer and searched by
//! exhaustive scan. Squared L2 distance orders results identically to L2
//! while skipping the square root. The index persists to a small binary
//! file that records its dimensionality and the embedding model identity
//! it was built with.

use std::fs;
use std::path::Path;

use tracing::debug;

use docqa_shared::{DocqaError, Result};

/// File magic for persisted indexes.
const MAGIC: &[u8; 4] = b"DQIX";

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// An in-memory flat vector index with exhaustive nearest-neighbor search.
#[derive(Debug)]
pub struct FlatIndex {
    dims: usize,
    model_id: String,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from row vectors. Every vector must have the same
    /// nonzero length.
    pub fn from_vectors(vectors: Vec<Vec<f32>>, model_id: &str) -> Result<Self> {
        let dims = match vectors.first() {
            Some(first) if !first.is_empty() => first.len(),
            Some(_) => return Err(DocqaError::Index("zero-dimensional vectors".into())),
            None => return Err(DocqaError::Index("cannot build an empty index".into())),
        };

        let mut data = Vec::with_capacity(dims * vectors.len());
        for (row, vector) in vectors.iter().enumerate() {
            if vector.len() != dims {
                return Err(DocqaError::Index(format!(
                    "vector {row} has {} dimensions, expected {dims}",
                    vector.len()
                )));
            }
            data.extend_from_slice(vector);
        }

        Ok(Self {
            dims,
            model_id: model_id.to_string(),
            data,
        })
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Vector dimensionality.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Identity of the embedding model the index was built with.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The stored vector at row `i`.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }

    /// Exhaustive nearest-neighbor search: the `k` rows closest to `query`
    /// by squared Euclidean distance, ascending. `k` is capped at the row
    /// count.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dims {
            return Err(DocqaError::Index(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dims
            )));
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|i| {
                let dist = self
                    .row(i)
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (i, dist)
            })
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k.min(self.len()));
        Ok(scored)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serialize to the on-disk format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let model = self.model_id.as_bytes();
        let mut out = Vec::with_capacity(20 + model.len() + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dims as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        out.extend_from_slice(&(model.len() as u32).to_le_bytes());
        out.extend_from_slice(model);
        for value in &self.data {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Parse the on-disk format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { bytes, pos: 0 };

        let magic = cursor.take(4)?;
        if magic != MAGIC {
            return Err(DocqaError::Index("not an index file (bad magic)".into()));
        }
        let version = cursor.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(DocqaError::Index(format!(
                "unsupported index format version {version}"
            )));
        }

        let dims = cursor.read_u32()? as usize;
        let rows = cursor.read_u32()? as usize;
        let model_len = cursor.read_u32()? as usize;
        let model_id = String::from_utf8(cursor.take(model_len)?.to_vec())
            .map_err(|_| DocqaError::Index("model id is not valid UTF-8".into()))?;

        if dims == 0 || rows == 0 {
            return Err(DocqaError::Index("index file declares no data".into()));
        }

        let mut data = Vec::with_capacity(dims * rows);
        for _ in 0..dims * rows {
            let raw = cursor.take(4)?;
            data.push(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]));
        }

        Ok(Self {
            dims,
            model_id,
            data,
        })
    }

    /// Write the index to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), rows = self.len(), dims = self.dims, "saving index");
        fs::write(path, self.to_bytes()).map_err(|e| DocqaError::io(path, e))
    }

    /// Load an index from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| DocqaError::io(path, e))?;
        Self::from_bytes(&bytes)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| DocqaError::Index("truncated index file".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}
