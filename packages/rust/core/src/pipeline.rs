//! The pipeline object and its job state machine.
//!
//! A [`Pipeline`] is constructed once by the process entry point and shared
//! by reference. It holds the validated configuration, a cached manifest,
//! and a single job slot: at most one background job (rebuild, reindex,
//! question generation) runs at a time, tracked by an explicit
//! `Idle → Running → {Completed, Failed}` state machine on a watch channel
//! rather than by task liveness. A second start attempt while a job runs is
//! rejected with an informational error, never queued.
//!
//! The write path stages the whole working directory (chunk files,
//! manifest, index blob) in a sibling directory and renames it into place
//! on success, so a failed build leaves the previous artifacts intact.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, instrument};

use docqa_chunker::chunk_page;
use docqa_discovery::{DiscoveryOptions, LinkDiscoverer};
use docqa_extract::{ExtractOptions, TextExtractor};
use docqa_index::{Embedder, FlatIndex, Retriever};
use docqa_shared::config::{PipelineConfig, RefineMode};
use docqa_shared::types::{INDEX_FILE, MANIFEST_FILE, QUESTIONS_DIR};
use docqa_shared::{DocqaError, Manifest, Result};

use crate::completion::{CompletionClient, CompletionOutcome};
use crate::progress::ProgressEvent;
use crate::prompt::{compose_prompt, compose_question_prompt};
use crate::refine::Refiner;

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 10;

/// Capacity of the progress broadcast channel. Lagging subscribers miss
/// events; delivery is best-effort by contract.
const PROGRESS_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// The long-running job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Crawl the site, chunk, embed, and swap in a fresh working directory.
    Rebuild,
    /// Re-embed existing chunk files and rebuild the index blob only.
    Reindex,
    /// Generate a question-set file per chunk.
    Questions,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rebuild => "rebuild",
            Self::Reindex => "reindex",
            Self::Questions => "questions",
        }
    }
}

/// Observable state of the job slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running { job: String },
    Completed { job: String },
    Failed { job: String, error: String },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

struct State {
    config: Option<PipelineConfig>,
    manifest: Option<Manifest>,
}

/// The orchestrator shared between front ends.
pub struct Pipeline {
    state: Mutex<State>,
    status_tx: watch::Sender<JobStatus>,
    progress_tx: broadcast::Sender<ProgressEvent>,
    cancel_tx: watch::Sender<bool>,
}

impl Pipeline {
    /// Create an unconfigured pipeline. Jobs and queries fail with a
    /// configuration error until [`Pipeline::configure`] is called.
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(JobStatus::Idle);
        let (progress_tx, _) = broadcast::channel(PROGRESS_CAPACITY);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(State {
                config: None,
                manifest: None,
            }),
            status_tx,
            progress_tx,
            cancel_tx,
        }
    }

    /// Create a pipeline that is configured from the start.
    pub fn configured(config: PipelineConfig) -> Self {
        let pipeline = Self::new();
        pipeline.configure(config);
        pipeline
    }

    /// Install (or replace) the pipeline configuration. Clears the cached
    /// manifest. Not safe to call while a job is running; callers must
    /// serialize configuration against jobs.
    pub fn configure(&self, config: PipelineConfig) {
        let mut state = self.state.lock().unwrap();
        state.config = Some(config);
        state.manifest = None;
    }

    /// Snapshot the configuration, or fail if none was installed.
    fn config_snapshot(&self) -> Result<PipelineConfig> {
        self.state.lock().unwrap().config.clone().ok_or_else(|| {
            DocqaError::config("pipeline is not configured; call configure first")
        })
    }

    /// The manifest cached by the most recent successful write-path job,
    /// if any.
    pub fn cached_manifest(&self) -> Option<Manifest> {
        self.state.lock().unwrap().manifest.clone()
    }

    /// Current job slot state.
    pub fn status(&self) -> JobStatus {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to job slot transitions.
    pub fn watch_status(&self) -> watch::Receiver<JobStatus> {
        self.status_tx.subscribe()
    }

    /// Subscribe to progress events. Best-effort: a slow subscriber lags
    /// and misses events.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    /// Cancellation signal wired into the job slot. Jobs do not yet
    /// observe it; the receiver exists so front ends can plumb a cancel
    /// control before jobs learn to stop.
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    fn emit(&self, event: ProgressEvent) {
        let _ = self.progress_tx.send(event);
    }

    // -----------------------------------------------------------------------
    // Job slot
    // -----------------------------------------------------------------------

    /// Claim the job slot. The state lock makes check-and-set atomic.
    fn begin(&self, kind: JobKind) -> Result<()> {
        let _guard = self.state.lock().unwrap();
        let current = self.status_tx.borrow().clone();
        if let JobStatus::Running { job } = current {
            return Err(DocqaError::AlreadyRunning { job });
        }
        self.status_tx.send_replace(JobStatus::Running {
            job: kind.as_str().to_string(),
        });
        self.emit(ProgressEvent::JobStarted {
            job: kind.as_str().to_string(),
        });
        Ok(())
    }

    fn finish(&self, kind: JobKind, result: &Result<()>) {
        let status = match result {
            Ok(()) => JobStatus::Completed {
                job: kind.as_str().to_string(),
            },
            Err(e) => JobStatus::Failed {
                job: kind.as_str().to_string(),
                error: e.to_string(),
            },
        };
        self.status_tx.send_replace(status);
        self.emit(ProgressEvent::JobFinished {
            job: kind.as_str().to_string(),
            success: result.is_ok(),
        });
    }

    /// Run a job to completion on the current task.
    #[instrument(skip(self), fields(job = kind.as_str()))]
    pub async fn run_job(&self, kind: JobKind) -> Result<()> {
        let config = self.config_snapshot()?;
        self.begin(kind)?;
        let result = self.execute(kind, &config).await;
        if let Err(e) = &result {
            error!(job = kind.as_str(), error = %e, "job failed");
        }
        self.finish(kind, &result);
        result
    }

    /// Start a job on a background task. Returns as soon as the slot is
    /// claimed; the job outcome is observable through [`Pipeline::watch_status`].
    pub fn spawn_job(self: &Arc<Self>, kind: JobKind) -> Result<()> {
        let config = self.config_snapshot()?;
        self.begin(kind)?;
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let result = pipeline.execute(kind, &config).await;
            if let Err(e) = &result {
                error!(job = kind.as_str(), error = %e, "background job failed");
            }
            pipeline.finish(kind, &result);
        });
        Ok(())
    }

    async fn execute(&self, kind: JobKind, config: &PipelineConfig) -> Result<()> {
        match kind {
            JobKind::Rebuild => self.rebuild(config).await,
            JobKind::Reindex => self.reindex(config).await,
            JobKind::Questions => self.generate_questions(config).await,
        }
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    /// Crawl, extract, chunk, refine, embed, and swap in a fresh working
    /// directory.
    async fn rebuild(&self, config: &PipelineConfig) -> Result<()> {
        let discoverer = LinkDiscoverer::new(
            &config.base_url,
            config.base_path.clone(),
            &DiscoveryOptions::default(),
        )?;
        let links = discoverer.discover().await?;
        self.emit(ProgressEvent::CrawlSizeKnown { links: links.len() });
        info!(links = links.len(), "crawl complete");

        let extractor = TextExtractor::new(ExtractOptions {
            content_selector: config.content_selector.clone(),
            ..Default::default()
        })?;
        let refiner = Refiner::new(
            config.refine,
            match config.refine {
                RefineMode::Model => Some(CompletionClient::from_config(&config.completion)?),
                _ => None,
            },
        );

        let staging = staging_dir(&config.working_dir);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| DocqaError::io(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| DocqaError::io(&staging, e))?;

        let site_root = config.base_url.as_str().trim_end_matches('/').to_string();
        let mut manifest = Manifest::default();
        let mut texts: Vec<String> = Vec::new();

        for (position, link) in links.iter().enumerate() {
            let text = extractor.extract(&format!("{site_root}{link}")).await?;
            self.emit(ProgressEvent::LinkFetched {
                link: link.clone(),
                position: position + 1,
                total: links.len(),
            });

            for chunk in chunk_page(link, &text, config.chunk_size) {
                let refined = refiner.refine(&chunk.text).await?;
                let path = staging.join(&chunk.file_name);
                fs::write(&path, &refined).map_err(|e| DocqaError::io(&path, e))?;
                manifest.links.push(chunk.file_name.clone());
                texts.push(refined);
                self.emit(ProgressEvent::ChunkPersisted {
                    file_name: chunk.file_name,
                    count: manifest.len(),
                });
            }
        }

        let embedder = Embedder::from_config(&config.embedding)?;
        let vectors = embedder.embed(&texts).await?;
        let index = FlatIndex::from_vectors(vectors, embedder.model_id())?;
        index.save(&staging.join(INDEX_FILE))?;

        manifest.embedding_model = Some(embedder.model_id().to_string());
        manifest.built_at = Some(Utc::now());
        manifest.save(&staging.join(MANIFEST_FILE))?;

        swap_into_place(&staging, &config.working_dir)?;
        self.emit(ProgressEvent::IndexBuilt {
            chunks: manifest.len(),
        });
        info!(chunks = manifest.len(), dir = %config.working_dir.display(), "index built");

        self.state.lock().unwrap().manifest = Some(manifest);
        Ok(())
    }

    /// Re-embed the chunk files listed by the existing manifest and rebuild
    /// the index blob, without re-crawling.
    async fn reindex(&self, config: &PipelineConfig) -> Result<()> {
        let working = &config.working_dir;
        let mut manifest = Manifest::load(&working.join(MANIFEST_FILE))?;

        let mut texts = Vec::with_capacity(manifest.len());
        for link in &manifest.links {
            let path = working.join(link);
            texts.push(fs::read_to_string(&path).map_err(|e| DocqaError::io(&path, e))?);
        }

        let embedder = Embedder::from_config(&config.embedding)?;
        let vectors = embedder.embed(&texts).await?;
        let index = FlatIndex::from_vectors(vectors, embedder.model_id())?;

        // Write beside the live blob, then rename over it.
        let tmp = working.join(format!("{INDEX_FILE}.tmp"));
        index.save(&tmp)?;
        fs::rename(&tmp, working.join(INDEX_FILE)).map_err(|e| DocqaError::io(&tmp, e))?;

        manifest.embedding_model = Some(embedder.model_id().to_string());
        manifest.built_at = Some(Utc::now());
        manifest.save(&working.join(MANIFEST_FILE))?;

        self.emit(ProgressEvent::IndexBuilt {
            chunks: manifest.len(),
        });
        self.state.lock().unwrap().manifest = Some(manifest);
        Ok(())
    }

    /// Generate one question-set file per manifest chunk under
    /// `questions/`, reusing the chunk's base file name.
    async fn generate_questions(&self, config: &PipelineConfig) -> Result<()> {
        let working = &config.working_dir;
        let manifest = Manifest::load(&working.join(MANIFEST_FILE))?;
        let client = CompletionClient::from_config(&config.completion)?;

        let questions_dir = working.join(QUESTIONS_DIR);
        fs::create_dir_all(&questions_dir).map_err(|e| DocqaError::io(&questions_dir, e))?;

        let total = manifest.len();
        for (position, link) in manifest.links.iter().enumerate() {
            let chunk_path = working.join(link);
            let text =
                fs::read_to_string(&chunk_path).map_err(|e| DocqaError::io(&chunk_path, e))?;

            let questions = client
                .complete(&compose_question_prompt(&text))
                .await?
                .require_answer()?;

            let out_path = questions_dir.join(link);
            fs::write(&out_path, questions).map_err(|e| DocqaError::io(&out_path, e))?;
            self.emit(ProgressEvent::QuestionGenerated {
                file_name: link.clone(),
                position: position + 1,
                total,
            });
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    /// Retrieve the `top_k` nearest chunks for `question`, compose the
    /// grounded prompt, and issue one completion request. Read-only; safe
    /// to call concurrently with itself.
    #[instrument(skip(self, question))]
    pub async fn ask(&self, question: &str, top_k: usize) -> Result<CompletionOutcome> {
        let config = self.config_snapshot()?;

        let retriever = Retriever::open(&config.working_dir)?;
        let embedder = Embedder::from_config(&config.embedding)?;
        let retrieved = retriever.retrieve(&embedder, question, top_k).await?;

        let contexts: Vec<String> = retrieved.into_iter().map(|c| c.text).collect();
        let prompt = compose_prompt(&contexts, question);

        let client = CompletionClient::from_config(&config.completion)?;
        client.complete(&prompt).await
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Sibling of a working directory carrying the given suffix.
fn sibling_dir(working_dir: &Path, suffix: &str) -> PathBuf {
    let mut name = working_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "site".to_string());
    name.push('.');
    name.push_str(suffix);
    working_dir.with_file_name(name)
}

/// Sibling staging directory for a working directory.
fn staging_dir(working_dir: &Path) -> PathBuf {
    sibling_dir(working_dir, "staging")
}

/// Replace `working_dir` with the staged directory. The previous directory
/// is renamed aside first and deleted only after the staged tree is in
/// place, so both trees stay on disk through the swap; a crash mid-swap
/// leaves one of them under its sibling name, never neither. Stale
/// siblings from an interrupted swap are cleaned here on the next build.
fn swap_into_place(staging: &Path, working_dir: &Path) -> Result<()> {
    if let Some(parent) = working_dir.parent() {
        fs::create_dir_all(parent).map_err(|e| DocqaError::io(parent, e))?;
    }

    let old = sibling_dir(working_dir, "old");
    if old.exists() {
        fs::remove_dir_all(&old).map_err(|e| DocqaError::io(&old, e))?;
    }

    let had_previous = working_dir.exists();
    if had_previous {
        fs::rename(working_dir, &old).map_err(|e| DocqaError::io(working_dir, e))?;
    }
    fs::rename(staging, working_dir).map_err(|e| DocqaError::io(staging, e))?;
    if had_previous {
        fs::remove_dir_all(&old).map_err(|e| DocqaError::io(&old, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use docqa_index::HashEmbedder;
    use docqa_shared::config::{CompletionConfig, EmbeddingConfig};

    fn test_config(site: &str, completion: &str, working_dir: PathBuf) -> PipelineConfig {
        PipelineConfig {
            base_url: Url::parse(site).unwrap(),
            base_path: "/docs".into(),
            content_selector: "div.theme-doc-markdown".into(),
            chunk_size: 1000,
            working_dir,
            embedding: EmbeddingConfig {
                provider: "hash".into(),
                ..EmbeddingConfig::default()
            },
            completion: CompletionConfig {
                endpoint: completion.into(),
                model: "test-llm".into(),
                sample_answer: None,
            },
            refine: RefineMode::Disabled,
        }
    }

    fn page(content: &str, anchors: &[&str]) -> String {
        let links: String = anchors
            .iter()
            .map(|a| format!("<a href=\"{a}\">link</a>"))
            .collect();
        format!(
            "<html><body><div class=\"theme-doc-markdown\">{content}</div>{links}</body></html>"
        )
    }

    async fn mock_site(delay: Duration) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page(
                        "<h1>Guide</h1><p>Apples are fruit.</p>",
                        &["/docs/a", "/other"],
                    ))
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page("<h1>A</h1><p>Oranges are citrus.</p>", &[]))
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        server
    }

    /// Write a working directory with chunk files, manifest, and index,
    /// the way a completed rebuild would.
    fn seed_working_dir(working_dir: &Path, chunks: &[(&str, &str)]) {
        fs::create_dir_all(working_dir).unwrap();
        let embedder = HashEmbedder::new(256);

        let mut manifest = Manifest::default();
        let mut vectors = Vec::new();
        for (name, text) in chunks {
            fs::write(working_dir.join(name), text).unwrap();
            manifest.links.push((*name).to_string());
            vectors.push(embedder.embed_one(text));
        }
        manifest.embedding_model = Some("hash".into());
        manifest.save(&working_dir.join(MANIFEST_FILE)).unwrap();

        FlatIndex::from_vectors(vectors, "hash")
            .unwrap()
            .save(&working_dir.join(INDEX_FILE))
            .unwrap();
    }

    #[tokio::test]
    async fn rebuild_produces_consistent_artifacts() {
        let site = mock_site(Duration::ZERO).await;
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("site");

        let pipeline = Pipeline::configured(test_config(
            &site.uri(),
            "http://127.0.0.1:1",
            working_dir.clone(),
        ));
        pipeline.run_job(JobKind::Rebuild).await.unwrap();

        let manifest = Manifest::load(&working_dir.join(MANIFEST_FILE)).unwrap();
        let index = FlatIndex::load(&working_dir.join(INDEX_FILE)).unwrap();
        assert_eq!(manifest.len(), index.len());
        assert_eq!(manifest.embedding_model.as_deref(), Some("hash"));
        for link in &manifest.links {
            assert!(working_dir.join(link).exists(), "missing chunk file {link}");
        }

        // The staged sibling is gone and the retriever opens cleanly.
        assert!(!staging_dir(&working_dir).exists());
        Retriever::open(&working_dir).unwrap();

        assert_eq!(
            pipeline.status(),
            JobStatus::Completed {
                job: "rebuild".into()
            }
        );
        assert_eq!(pipeline.cached_manifest().unwrap().len(), manifest.len());
    }

    #[tokio::test]
    async fn rebuild_emits_progress_checkpoints() {
        let site = mock_site(Duration::ZERO).await;
        let dir = tempfile::tempdir().unwrap();

        let pipeline = Pipeline::configured(test_config(
            &site.uri(),
            "http://127.0.0.1:1",
            dir.path().join("site"),
        ));
        let mut rx = pipeline.subscribe_progress();
        pipeline.run_job(JobKind::Rebuild).await.unwrap();

        let mut saw_size = false;
        let mut saw_built = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProgressEvent::CrawlSizeKnown { links } => {
                    saw_size = true;
                    assert_eq!(links, 2);
                }
                ProgressEvent::IndexBuilt { chunks } => {
                    saw_built = true;
                    assert!(chunks >= 2);
                }
                _ => {}
            }
        }
        assert!(saw_size && saw_built);
    }

    #[test]
    fn swap_replaces_previous_directory_and_cleans_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("site");
        let staging = staging_dir(&working_dir);

        fs::create_dir_all(&working_dir).unwrap();
        fs::write(working_dir.join("stale.0.0.txt"), "old").unwrap();
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("fresh.0.0.txt"), "new").unwrap();

        swap_into_place(&staging, &working_dir).unwrap();

        assert!(working_dir.join("fresh.0.0.txt").exists());
        assert!(!working_dir.join("stale.0.0.txt").exists());
        assert!(!staging.exists());
        assert!(!sibling_dir(&working_dir, "old").exists());
    }

    #[tokio::test]
    async fn rebuild_over_existing_directory_replaces_it() {
        let site = mock_site(Duration::ZERO).await;
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("site");
        seed_working_dir(&working_dir, &[("stale.0.0.txt", "superseded content")]);

        let pipeline = Pipeline::configured(test_config(
            &site.uri(),
            "http://127.0.0.1:1",
            working_dir.clone(),
        ));
        pipeline.run_job(JobKind::Rebuild).await.unwrap();

        assert!(!working_dir.join("stale.0.0.txt").exists());
        assert!(!sibling_dir(&working_dir, "old").exists());
        assert!(!staging_dir(&working_dir).exists());
        Retriever::open(&working_dir).unwrap();
    }

    #[tokio::test]
    async fn second_job_is_rejected_while_one_runs() {
        let site = mock_site(Duration::from_millis(200)).await;
        let dir = tempfile::tempdir().unwrap();

        let pipeline = Arc::new(Pipeline::configured(test_config(
            &site.uri(),
            "http://127.0.0.1:1",
            dir.path().join("site"),
        )));
        pipeline.spawn_job(JobKind::Rebuild).unwrap();

        let err = pipeline.run_job(JobKind::Rebuild).await.unwrap_err();
        assert!(matches!(err, DocqaError::AlreadyRunning { ref job } if job == "rebuild"));

        // After the first job finishes, the slot frees up.
        let mut status = pipeline.watch_status();
        let settled = status
            .wait_for(|s| !matches!(s, JobStatus::Running { .. }))
            .await
            .unwrap()
            .clone();
        assert_eq!(
            settled,
            JobStatus::Completed {
                job: "rebuild".into()
            }
        );
        pipeline.run_job(JobKind::Rebuild).await.unwrap();
    }

    #[tokio::test]
    async fn unconfigured_pipeline_rejects_everything() {
        let pipeline = Pipeline::new();
        assert!(matches!(
            pipeline.run_job(JobKind::Rebuild).await.unwrap_err(),
            DocqaError::Config { .. }
        ));
        assert!(matches!(
            pipeline.ask("anything", DEFAULT_TOP_K).await.unwrap_err(),
            DocqaError::Config { .. }
        ));
    }

    #[tokio::test]
    async fn failed_rebuild_leaves_previous_directory_intact() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("site");
        seed_working_dir(&working_dir, &[("a.0.0.txt", "apples are fruit")]);

        // No server listens here, so discovery fails immediately.
        let pipeline = Pipeline::configured(test_config(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
            working_dir.clone(),
        ));
        let err = pipeline.run_job(JobKind::Rebuild).await.unwrap_err();
        assert!(matches!(err, DocqaError::Network(_)));

        assert!(working_dir.join("a.0.0.txt").exists());
        Retriever::open(&working_dir).unwrap();
        assert!(matches!(pipeline.status(), JobStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn ask_grounds_the_prompt_in_retrieved_chunks() {
        let completion = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_string_contains("oranges are citrus"))
            .and(body_string_contains("Question: what fruit is citrus?"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "oranges"})),
            )
            .mount(&completion)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("site");
        seed_working_dir(
            &working_dir,
            &[
                ("a.0.0.txt", "apples are fruit"),
                ("b.0.0.txt", "cars have engines"),
                ("c.0.0.txt", "oranges are citrus"),
            ],
        );

        let pipeline = Pipeline::configured(test_config(
            "http://127.0.0.1:1",
            &completion.uri(),
            working_dir,
        ));
        let outcome = pipeline
            .ask("what fruit is citrus?", DEFAULT_TOP_K)
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::Answer("oranges".into()));
    }

    #[tokio::test]
    async fn reindex_rebuilds_the_blob_from_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("site");
        seed_working_dir(
            &working_dir,
            &[
                ("a.0.0.txt", "apples are fruit"),
                ("b.0.0.txt", "cars have engines"),
            ],
        );
        // Stale blob from an older build.
        fs::remove_file(working_dir.join(INDEX_FILE)).unwrap();

        let pipeline = Pipeline::configured(test_config(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
            working_dir.clone(),
        ));
        pipeline.run_job(JobKind::Reindex).await.unwrap();

        let index = FlatIndex::load(&working_dir.join(INDEX_FILE)).unwrap();
        assert_eq!(index.len(), 2);
        assert!(!working_dir.join(format!("{INDEX_FILE}.tmp")).exists());
    }

    #[tokio::test]
    async fn questions_job_writes_one_file_per_chunk() {
        let completion = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "What is this about?"})),
            )
            .expect(2)
            .mount(&completion)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let working_dir = dir.path().join("site");
        seed_working_dir(
            &working_dir,
            &[
                ("a.0.0.txt", "apples are fruit"),
                ("b.0.0.txt", "cars have engines"),
            ],
        );

        let pipeline = Pipeline::configured(test_config(
            "http://127.0.0.1:1",
            &completion.uri(),
            working_dir.clone(),
        ));
        pipeline.run_job(JobKind::Questions).await.unwrap();

        for name in ["a.0.0.txt", "b.0.0.txt"] {
            let content =
                fs::read_to_string(working_dir.join(QUESTIONS_DIR).join(name)).unwrap();
            assert_eq!(content, "What is this about?");
        }
    }
}
