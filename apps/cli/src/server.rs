//! HTTP server exposing the pipeline.
//!
//! Routes:
//! - `GET /health` — current job slot status as JSON.
//! - `GET /update`, `GET /reindex`, `GET /questions` — start the
//!   corresponding background job; an already-running job yields an
//!   informational 200, never a queue.
//! - `POST /chat` — `{question}` in, `{question, answer}` or
//!   `{question, error}` out. 400 on malformed payloads, 500 on pipeline
//!   failures.
//! - `GET /events` — server-sent events forwarding progress checkpoints to
//!   live connections; best-effort only.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use color_eyre::eyre::Result;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tracing::info;

use docqa_core::pipeline::DEFAULT_TOP_K;
use docqa_core::{CompletionOutcome, JobKind, JobStatus, Pipeline};
use docqa_shared::DocqaError;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Bind and serve until the process is stopped.
pub(crate) async fn serve(pipeline: Arc<Pipeline>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "docqa server listening");
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/update", get(start_update))
        .route("/reindex", get(start_reindex))
        .route("/questions", get(start_questions))
        .route("/chat", post(chat))
        .route("/events", get(events))
        .layer(CorsLayer::permissive())
        .with_state(AppState { pipeline })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(state): State<AppState>) -> Json<JobStatus> {
    Json(state.pipeline.status())
}

async fn start_update(State(state): State<AppState>) -> Response {
    start_job(&state, JobKind::Rebuild)
}

async fn start_reindex(State(state): State<AppState>) -> Response {
    start_job(&state, JobKind::Reindex)
}

async fn start_questions(State(state): State<AppState>) -> Response {
    start_job(&state, JobKind::Questions)
}

fn start_job(state: &AppState, kind: JobKind) -> Response {
    match state.pipeline.spawn_job(kind) {
        Ok(()) => (StatusCode::OK, format!("{} started", kind.as_str())).into_response(),
        Err(DocqaError::AlreadyRunning { job }) => {
            (StatusCode::OK, format!("a {job} job is already running")).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let Ok(Json(payload)) = payload else {
        return bad_request("no JSON payload provided");
    };
    let Some(question) = payload.get("question").and_then(|q| q.as_str()) else {
        return bad_request("payload is missing `question`");
    };

    match state.pipeline.ask(question, DEFAULT_TOP_K).await {
        Ok(CompletionOutcome::Answer(answer)) => {
            Json(json!({"question": question, "answer": answer})).into_response()
        }
        Ok(CompletionOutcome::Error(error)) => {
            Json(json!({"question": question, "error": error})).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.pipeline.subscribe_progress();
    let stream = BroadcastStream::new(rx).filter_map(|event| {
        // Lagged subscribers and serialization misses drop silently;
        // progress delivery is best-effort.
        event.ok().and_then(|e| Event::default().json_data(&e).ok().map(Ok))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;

    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use docqa_shared::config::{CompletionConfig, EmbeddingConfig, PipelineConfig, RefineMode};

    async fn spawn_server(pipeline: Pipeline) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::new(pipeline));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn health_reports_idle_slot() {
        let addr = spawn_server(Pipeline::new()).await;

        let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"state": "idle"}));
    }

    #[tokio::test]
    async fn chat_rejects_malformed_payloads() {
        let addr = spawn_server(Pipeline::new()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{addr}/chat"))
            .header("content-type", "application/json")
            .body("not json at all")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let response = client
            .post(format!("http://{addr}/chat"))
            .json(&json!({"prompt": "wrong field"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn chat_on_unconfigured_pipeline_is_a_server_error() {
        let addr = spawn_server(Pipeline::new()).await;

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/chat"))
            .json(&json!({"question": "anything?"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn update_on_unconfigured_pipeline_is_a_server_error() {
        let addr = spawn_server(Pipeline::new()).await;

        let response = reqwest::get(format!("http://{addr}/update")).await.unwrap();
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn second_update_reports_already_running() {
        // A slow crawl target keeps the first rebuild in the job slot
        // while the second request arrives.
        let site = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(
                        "<html><body><div class=\"theme-doc-markdown\">\
                         <h1>Guide</h1><p>Apples are fruit.</p>\
                         </div></body></html>",
                    )
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&site)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            base_url: Url::parse(&site.uri()).unwrap(),
            base_path: "/docs".into(),
            content_selector: "div.theme-doc-markdown".into(),
            chunk_size: 1000,
            working_dir: dir.path().join("site"),
            embedding: EmbeddingConfig {
                provider: "hash".into(),
                ..EmbeddingConfig::default()
            },
            completion: CompletionConfig::default(),
            refine: RefineMode::Disabled,
        };
        let addr = spawn_server(Pipeline::configured(config)).await;

        let first = reqwest::get(format!("http://{addr}/update")).await.unwrap();
        assert_eq!(first.status(), 200);
        assert_eq!(first.text().await.unwrap(), "rebuild started");

        let second = reqwest::get(format!("http://{addr}/update")).await.unwrap();
        assert_eq!(second.status(), 200);
        assert_eq!(
            second.text().await.unwrap(),
            "a rebuild job is already running"
        );
    }
}
