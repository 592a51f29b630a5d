//! Pipeline orchestration for docqa.
//!
//! Ties the discovery, extraction, chunking, and index crates together into
//! a [`Pipeline`] object: the write path (rebuild, reindex, question
//! generation) runs as single-slot background jobs; the read path (ask)
//! retrieves context and issues one completion request.

pub mod completion;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod refine;

pub use completion::{CompletionClient, CompletionOutcome};
pub use pipeline::{JobKind, JobStatus, Pipeline};
pub use progress::ProgressEvent;
pub use refine::Refiner;
