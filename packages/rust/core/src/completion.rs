//! Completion collaborator client.
//!
//! One synchronous, non-streaming request shape: `{prompt, model,
//! stream: false}` POSTed to an Ollama-style `/api/generate` endpoint. A
//! connection failure or non-JSON body is converted into a structured
//! error *outcome* rather than raised, since the read path must always
//! hand the caller something presentable. A configured sample-answer file
//! short-circuits the request entirely for deterministic runs.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docqa_shared::config::CompletionConfig;
use docqa_shared::{DocqaError, Result};

/// Timeout for completion requests in seconds. Generation is slow.
const COMPLETION_TIMEOUT_SECS: u64 = 300;

/// The result of one completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionOutcome {
    /// The generated text.
    Answer(String),
    /// What went wrong, as a presentable string.
    Error(String),
}

impl CompletionOutcome {
    /// Treat an error outcome as a hard failure. The refinement chain and
    /// question generation use this; the read path does not.
    pub fn require_answer(self) -> Result<String> {
        match self {
            Self::Answer(text) => Ok(text),
            Self::Error(message) => Err(DocqaError::ExternalService(message)),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Client for the completion collaborator.
pub struct CompletionClient {
    client: Client,
    endpoint: String,
    model: String,
    sample_answer: Option<std::path::PathBuf>,
}

impl CompletionClient {
    /// Build a client from the `[completion]` config section.
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(COMPLETION_TIMEOUT_SECS))
            .build()
            .map_err(|e| DocqaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            sample_answer: config.sample_answer.clone(),
        })
    }

    /// The completion model identity sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Issue one completion request and classify the outcome.
    pub async fn complete(&self, prompt: &str) -> Result<CompletionOutcome> {
        if let Some(path) = &self.sample_answer {
            let text = std::fs::read_to_string(path).map_err(|e| DocqaError::io(path, e))?;
            return Ok(CompletionOutcome::Answer(text));
        }

        let url = format!("{}/api/generate", self.endpoint);
        debug!(%url, model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let response = match self
            .client
            .post(&url)
            .json(&GenerateRequest {
                prompt,
                model: &self.model,
                stream: false,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "completion request failed");
                return Ok(CompletionOutcome::Error(format!(
                    "completion request failed: {e}"
                )));
            }
        };

        match response.json::<GenerateResponse>().await {
            Ok(GenerateResponse {
                response: Some(text),
            }) => Ok(CompletionOutcome::Answer(text)),
            Ok(GenerateResponse { response: None }) => {
                Ok(CompletionOutcome::Error("completion response had no text".into()))
            }
            Err(e) => {
                warn!(error = %e, "completion response was not valid JSON");
                Ok(CompletionOutcome::Error("invalid JSON completion response".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> CompletionConfig {
        CompletionConfig {
            endpoint: endpoint.to_string(),
            model: "test-llm".to_string(),
            sample_answer: None,
        }
    }

    #[tokio::test]
    async fn successful_generation_is_an_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(
                serde_json::json!({"model": "test-llm", "stream": false}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"response": "chunks are size-bounded"}),
            ))
            .mount(&server)
            .await;

        let client = CompletionClient::from_config(&config(&server.uri())).unwrap();
        let outcome = client.complete("what bounds chunk sizes?").await.unwrap();
        assert_eq!(
            outcome,
            CompletionOutcome::Answer("chunks are size-bounded".into())
        );
    }

    #[tokio::test]
    async fn non_json_body_becomes_error_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = CompletionClient::from_config(&config(&server.uri())).unwrap();
        let outcome = client.complete("anything").await.unwrap();
        assert_eq!(
            outcome,
            CompletionOutcome::Error("invalid JSON completion response".into())
        );
    }

    #[tokio::test]
    async fn connection_failure_becomes_error_outcome() {
        // Nothing listens on this port.
        let client =
            CompletionClient::from_config(&config("http://127.0.0.1:1")).unwrap();
        let outcome = client.complete("anything").await.unwrap();
        assert!(matches!(outcome, CompletionOutcome::Error(_)));
    }

    #[tokio::test]
    async fn missing_response_field_becomes_error_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"done": true})),
            )
            .mount(&server)
            .await;

        let client = CompletionClient::from_config(&config(&server.uri())).unwrap();
        let outcome = client.complete("anything").await.unwrap();
        assert!(matches!(outcome, CompletionOutcome::Error(_)));
    }

    #[tokio::test]
    async fn sample_answer_file_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let sample = dir.path().join("sample_answer.md");
        std::fs::write(&sample, "canned answer").unwrap();

        let mut config = config("http://127.0.0.1:1");
        config.sample_answer = Some(sample);

        let client = CompletionClient::from_config(&config).unwrap();
        let outcome = client.complete("anything").await.unwrap();
        assert_eq!(outcome, CompletionOutcome::Answer("canned answer".into()));
    }

    #[test]
    fn require_answer_raises_on_error_outcome() {
        let err = CompletionOutcome::Error("boom".into())
            .require_answer()
            .unwrap_err();
        assert!(matches!(err, DocqaError::ExternalService(_)));
    }
}
