//! Embedding, flat similarity index, and retrieval for docqa.
//!
//! The write path embeds chunk texts and persists a flat squared-Euclidean
//! index next to the chunk manifest; the read path embeds a query with the
//! same model identity and returns the nearest chunks.

pub mod embed;
pub mod flat;
pub mod retrieve;

pub use embed::{Embedder, HashEmbedder, OllamaEmbedder};
pub use flat::FlatIndex;
pub use retrieve::{RetrievedChunk, Retriever};
