//! Grading service backed by an HTTP endpoint.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use gradestream_core::error::GradingError;
use gradestream_core::ingest::{ingest_batch, ingest_stream, IngestOptions};
use gradestream_core::submission::Submission;
use gradestream_core::traits::{Delivery, GradingService, ResultSink, ServiceOutcome};

use crate::config::GradestreamConfig;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const GENERIC_FAILURE: &str = "An error occurred during grading";

/// How to interpret a successful response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Stream when the content type says NDJSON, otherwise expect a batch.
    #[default]
    Auto,
    /// Always read the body as newline-delimited JSON.
    Stream,
    /// Always read the body as `{ "results": [...] }`.
    Batch,
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Auto => write!(f, "auto"),
            ResponseMode::Stream => write!(f, "stream"),
            ResponseMode::Batch => write!(f, "batch"),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ResponseMode::Auto),
            "stream" | "ndjson" => Ok(ResponseMode::Stream),
            "batch" | "json" => Ok(ResponseMode::Batch),
            other => Err(format!("unknown response mode: {other}")),
        }
    }
}

/// Grading backend reached through a multipart POST.
pub struct HttpGradingService {
    endpoint: String,
    mode: ResponseMode,
    ingest: IngestOptions,
    request_timeout_secs: Option<u64>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct BatchResponse {
    results: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

impl HttpGradingService {
    /// Service with default options and no overall request timeout.
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::build(endpoint, None)
    }

    /// Service configured from a loaded [`GradestreamConfig`].
    pub fn from_config(config: &GradestreamConfig) -> Result<Self> {
        let mut service = Self::build(&config.endpoint, config.request_timeout_secs)?;
        service.mode = config.mode;
        service.ingest = IngestOptions {
            trailing_line: config.trailing_line,
            chunk_timeout: config
                .chunk_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };
        Ok(service)
    }

    fn build(endpoint: &str, request_timeout_secs: Option<u64>) -> Result<Self> {
        let request_timeout_secs = request_timeout_secs.filter(|secs| *secs > 0);
        anyhow::ensure!(
            endpoint.starts_with("http://") || endpoint.starts_with("https://"),
            "grading endpoint must be an http(s) URL, got '{endpoint}'"
        );

        let mut builder =
            reqwest::Client::builder().connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));
        if let Some(secs) = request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            mode: ResponseMode::Auto,
            ingest: IngestOptions::default(),
            request_timeout_secs,
            client,
        })
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ingest_options(mut self, options: IngestOptions) -> Self {
        self.ingest = options;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn delivery_for(&self, response: &reqwest::Response) -> Delivery {
        match self.mode {
            ResponseMode::Stream => Delivery::Streamed,
            ResponseMode::Batch => Delivery::Batch,
            ResponseMode::Auto => {
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if content_type.contains("ndjson") || content_type.contains("jsonl") {
                    Delivery::Streamed
                } else {
                    Delivery::Batch
                }
            }
        }
    }

    fn classify(&self, err: reqwest::Error) -> GradingError {
        if err.is_timeout() {
            GradingError::Timeout(self.request_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS))
        } else {
            GradingError::Network(err.to_string())
        }
    }
}

/// Message for a rejected request: the body's `error` field when present.
fn failure_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

#[async_trait]
impl GradingService for HttpGradingService {
    fn name(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint, mode = %self.mode))]
    async fn grade(
        &self,
        submission: &Submission,
        sink: &mut (dyn ResultSink + Send),
        cancel: &CancellationToken,
    ) -> Result<ServiceOutcome, GradingError> {
        let rubric = submission.validate()?;

        let rubric_part =
            Part::bytes(rubric.content.clone()).file_name(rubric.file_name.clone());
        let form = Form::new()
            .text("folder_path", submission.folder_path.clone())
            .part("rubric_file", rubric_part);

        let send = self.client.post(&self.endpoint).multipart(form).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GradingError::Cancelled),
            response = send => response.map_err(|e| self.classify(e))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = failure_message(&body);
            tracing::warn!(status = status.as_u16(), %message, "grading request rejected");
            return Err(GradingError::Request {
                status: status.as_u16(),
                message,
            });
        }

        let delivery = self.delivery_for(&response);
        tracing::debug!(?delivery, status = status.as_u16(), "reading grading response");

        let aggregate = match delivery {
            Delivery::Streamed => {
                ingest_stream(response.bytes_stream(), sink, &self.ingest, cancel).await?
            }
            Delivery::Batch => {
                let body = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(GradingError::Cancelled),
                    body = response.bytes() => body.map_err(|e| self.classify(e))?,
                };
                let batch: BatchResponse = serde_json::from_slice(&body).map_err(|e| {
                    GradingError::Protocol(format!("failed to parse results: {e}"))
                })?;
                ingest_batch(&batch.results, sink)
            }
        };

        Ok(ServiceOutcome {
            delivery,
            aggregate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradestream_core::model::ResultRecord;
    use futures::StreamExt;
    use gradestream_core::submission::RubricFile;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn submission() -> Submission {
        Submission::new(
            "/srv/papers/quiz3",
            Some(RubricFile::new("rubric.txt", "Q1: factor x^2-1 (5 pts)")),
        )
    }

    fn service(server: &MockServer) -> HttpGradingService {
        HttpGradingService::new(&format!("{}/grade", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn sends_multipart_form() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/grade"))
            .and(body_string_contains("name=\"folder_path\""))
            .and(body_string_contains("/srv/papers/quiz3"))
            .and(body_string_contains("filename=\"rubric.txt\""))
            .and(body_string_contains("Q1: factor x^2-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let mut records: Vec<ResultRecord> = Vec::new();
        let outcome = service(&server)
            .grade(&submission(), &mut records, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.delivery, Delivery::Batch);
        assert_eq!(outcome.aggregate.processed_count, 0);
        assert_eq!(outcome.aggregate.average_percentage(), None);
    }

    #[tokio::test]
    async fn batch_response() {
        let server = MockServer::start().await;

        let body = serde_json::json!({"results": [
            {"filename": "a.pdf", "total_score": 10, "max_score": 10},
            {"filename": "b.pdf", "error": "File processing failed by Gemini", "file": "b.pdf"},
            {"filename": "c.pdf", "total_score": 0, "max_score": 10}
        ]});
        Mock::given(method("POST"))
            .and(path("/grade"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let mut records: Vec<ResultRecord> = Vec::new();
        let outcome = service(&server)
            .grade(&submission(), &mut records, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert!(records[1].is_error());
        assert_eq!(outcome.aggregate.processed_count, 3);
        assert_eq!(outcome.aggregate.average_percentage(), Some(50));
    }

    #[tokio::test]
    async fn ndjson_response_is_streamed() {
        let server = MockServer::start().await;

        let body = "{\"filename\":\"a.pdf\",\"total_score\":8,\"max_score\":10}\n\
                    not-json\n\
                    {\"filename\":\"b.pdf\",\"total_score\":4,\"max_score\":5}";
        Mock::given(method("POST"))
            .and(path("/grade"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"),
            )
            .mount(&server)
            .await;

        let mut records: Vec<ResultRecord> = Vec::new();
        let outcome = service(&server)
            .grade(&submission(), &mut records, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.delivery, Delivery::Streamed);
        assert_eq!(records.len(), 2, "unterminated last line is flushed");
        assert_eq!(outcome.aggregate.processed_count, 3);
        assert_eq!(outcome.aggregate.malformed_count, 1);
        assert_eq!(outcome.aggregate.average_percentage(), Some(80));
    }

    #[tokio::test]
    async fn forced_stream_mode_ignores_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("{\"total_score\":1,\"max_score\":4}\n"),
            )
            .mount(&server)
            .await;

        let mut records: Vec<ResultRecord> = Vec::new();
        let outcome = service(&server)
            .with_mode(ResponseMode::Stream)
            .grade(&submission(), &mut records, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.delivery, Delivery::Streamed);
        assert_eq!(outcome.aggregate.average_percentage(), Some(25));
    }

    #[tokio::test]
    async fn error_body_message_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "Invalid folder path"})),
            )
            .mount(&server)
            .await;

        let mut records: Vec<ResultRecord> = Vec::new();
        let err = service(&server)
            .grade(&submission(), &mut records, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            GradingError::Request { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid folder path");
            }
            other => panic!("expected request error, got {other:?}"),
        }
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn error_without_body_uses_generic_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let mut records: Vec<ResultRecord> = Vec::new();
        let err = service(&server)
            .grade(&submission(), &mut records, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains(GENERIC_FAILURE));
    }

    #[tokio::test]
    async fn unexpected_batch_shape_is_a_protocol_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let mut records: Vec<ResultRecord> = Vec::new();
        let err = service(&server)
            .grade(&submission(), &mut records, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GradingError::Protocol(_)));
    }

    #[tokio::test]
    async fn missing_rubric_sends_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut records: Vec<ResultRecord> = Vec::new();
        let err = service(&server)
            .grade(
                &Submission::new("/srv/papers", None),
                &mut records,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_setup());
    }

    #[tokio::test]
    async fn cancelled_before_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut records: Vec<ResultRecord> = Vec::new();
        let err = service(&server)
            .grade(&submission(), &mut records, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        // Port 9 (discard) is closed on test hosts.
        let service = HttpGradingService::new("http://127.0.0.1:9/grade").unwrap();
        let mut records: Vec<ResultRecord> = Vec::new();
        let err = service
            .grade(&submission(), &mut records, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GradingError::Network(_)), "got {err:?}");
    }

    #[test]
    fn rejects_non_http_endpoint() {
        assert!(HttpGradingService::new("ftp://example.com/grade").is_err());
    }

    #[test]
    fn response_mode_parse() {
        assert_eq!("STREAM".parse::<ResponseMode>().unwrap(), ResponseMode::Stream);
        assert_eq!("json".parse::<ResponseMode>().unwrap(), ResponseMode::Batch);
        assert!("xml".parse::<ResponseMode>().is_err());
        assert_eq!(ResponseMode::default().to_string(), "auto");
    }

    #[test]
    fn failure_message_falls_back() {
        assert_eq!(failure_message(r#"{"error":"No PDF files found"}"#), "No PDF files found");
        assert_eq!(failure_message(r#"{"error":""}"#), GENERIC_FAILURE);
        assert_eq!(failure_message("<html>502</html>"), GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn zero_timeouts_mean_no_limit() {
        let config = GradestreamConfig {
            chunk_timeout_secs: Some(0),
            request_timeout_secs: Some(0),
            ..Default::default()
        };
        let service = HttpGradingService::from_config(&config).unwrap();
        assert_eq!(service.ingest.chunk_timeout, None);
        assert_eq!(service.request_timeout_secs, None);

        let default = HttpGradingService::from_config(&GradestreamConfig::default()).unwrap();
        assert_eq!(default.ingest.chunk_timeout, Some(Duration::from_secs(600)));
    }

    #[tokio::test]
    async fn zero_chunk_timeout_lets_slow_streams_finish() {
        let config = GradestreamConfig {
            chunk_timeout_secs: Some(0),
            ..Default::default()
        };
        let service = HttpGradingService::from_config(&config).unwrap();

        let chunks: Vec<&'static [u8]> = vec![
            b"{\"total_score\":8,\"max_score\":10}\n",
            b"{\"total_score\":6,\"max_score\":10}\n",
        ];
        let slow = futures::stream::iter(chunks).then(|chunk| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, String>(chunk)
        });

        let mut records: Vec<ResultRecord> = Vec::new();
        let aggregate = ingest_stream(slow, &mut records, &service.ingest, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(aggregate.average_percentage(), Some(70));
    }
}
