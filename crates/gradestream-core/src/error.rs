//! Error types for grading submissions.
//!
//! Setup and request failures abort a submission. Malformed lines and
//! per-file grading failures never show up here: they are isolated to their
//! record and handled by the ingestor.

use thiserror::Error;

/// A submission rejected before any network call.
#[derive(Debug, Error)]
pub enum SetupError {
    /// No rubric file was attached.
    #[error("a rubric file is required")]
    MissingRubric,

    /// The folder path was empty or blank.
    #[error("a folder path is required")]
    MissingFolderPath,

    /// The rubric file could not be read from disk.
    #[error("failed to read rubric file {path}: {reason}")]
    UnreadableRubric { path: String, reason: String },
}

/// A JSON object that cannot be interpreted as a result record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("max_score must be positive, got {0}")]
    InvalidMaxScore(f64),

    #[error("total_score must be finite, got {0}")]
    InvalidTotalScore(f64),
}

/// Failures while reading a streamed response body.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The byte source reported an error mid-stream.
    #[error("response stream failed: {0}")]
    Source(String),

    /// No chunk arrived within the configured idle timeout.
    #[error("no data received for {0}s")]
    ChunkTimeout(u64),

    /// The caller aborted the submission.
    #[error("ingestion cancelled")]
    Cancelled,
}

/// Errors that abort a whole grading submission.
#[derive(Debug, Error)]
pub enum GradingError {
    #[error("invalid submission: {0}")]
    Setup(#[from] SetupError),

    /// The grading endpoint answered with a non-2xx status.
    #[error("grading request failed (HTTP {status}): {message}")]
    Request { status: u16, message: String },

    /// The endpoint could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A successful response had an unexpected shape.
    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error(transparent)]
    Ingest(IngestError),

    #[error("grading cancelled")]
    Cancelled,
}

impl From<IngestError> for GradingError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Cancelled => GradingError::Cancelled,
            other => GradingError::Ingest(other),
        }
    }
}

impl GradingError {
    /// Returns `true` if the submission was rejected before any request was sent.
    pub fn is_setup(&self) -> bool {
        matches!(self, GradingError::Setup(_))
    }

    /// Returns `true` if the caller aborted the submission.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GradingError::Cancelled)
    }

    /// HTTP status of a rejected request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GradingError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}
