//! Progress events emitted by running jobs.
//!
//! Delivery is best-effort over a broadcast channel: lagging subscribers
//! miss events, and nothing in the pipeline depends on anyone listening.

use serde::Serialize;

/// A checkpoint reached by a running job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A job entered the running state.
    JobStarted { job: String },

    /// Discovery finished; the total crawl size is now known.
    CrawlSizeKnown { links: usize },

    /// One page was fetched and extracted.
    LinkFetched {
        link: String,
        position: usize,
        total: usize,
    },

    /// One chunk file was written to the staging directory.
    ChunkPersisted { file_name: String, count: usize },

    /// The vector index was built and swapped into place.
    IndexBuilt { chunks: usize },

    /// One question-set file was generated.
    QuestionGenerated {
        file_name: String,
        position: usize,
        total: usize,
    },

    /// A job left the running state.
    JobFinished { job: String, success: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = ProgressEvent::CrawlSizeKnown { links: 12 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"crawl_size_known","links":12}"#);
    }
}
