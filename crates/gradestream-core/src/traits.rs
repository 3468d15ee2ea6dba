//! Core trait definitions for grading services, result sinks, and idle
//! prevention.
//!
//! `GradingService` is implemented by `gradestream-client`; sinks are
//! implemented by whatever presents results (console, report writers, tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::aggregate::{AggregateSnapshot, RunningAggregate};
use crate::error::GradingError;
use crate::model::ResultRecord;
use crate::submission::Submission;

// ---------------------------------------------------------------------------
// Result sink
// ---------------------------------------------------------------------------

/// Receives records synchronously, in arrival order, as they are ingested.
pub trait ResultSink {
    /// Called once per parsed record with the aggregate after applying it.
    fn on_record(&mut self, record: &ResultRecord, snapshot: &AggregateSnapshot);

    /// Called for a non-blank line that could not be parsed.
    fn on_malformed(&mut self, _line: &str, _snapshot: &AggregateSnapshot) {}
}

impl ResultSink for Vec<ResultRecord> {
    fn on_record(&mut self, record: &ResultRecord, _snapshot: &AggregateSnapshot) {
        self.push(record.clone());
    }
}

// ---------------------------------------------------------------------------
// Grading service trait
// ---------------------------------------------------------------------------

/// How a grading response delivered its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Newline-delimited JSON, one record per line.
    Streamed,
    /// One JSON body carrying a `results` array.
    Batch,
}

impl std::fmt::Display for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streamed => write!(f, "streamed"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// What a grading service hands back once a response is fully consumed.
#[derive(Debug, Clone)]
pub struct ServiceOutcome {
    pub delivery: Delivery,
    pub aggregate: RunningAggregate,
}

/// A backend that grades a folder of submissions against a rubric.
#[async_trait]
pub trait GradingService: Send + Sync {
    /// Human-readable service name (e.g. the endpoint URL).
    fn name(&self) -> &str;

    /// Send the submission and feed every returned record into `sink`.
    async fn grade(
        &self,
        submission: &Submission,
        sink: &mut (dyn ResultSink + Send),
        cancel: &CancellationToken,
    ) -> Result<ServiceOutcome, GradingError>;
}

// ---------------------------------------------------------------------------
// Idle prevention
// ---------------------------------------------------------------------------

/// Best-effort request that the machine stays awake during a run.
pub trait IdleInhibitor: Send + Sync {
    /// Returns `None` when the environment cannot honour the request.
    fn acquire(&self, reason: &str) -> Option<InhibitGuard>;
}

/// Holds an idle inhibition until dropped.
pub struct InhibitGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl InhibitGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release explicitly. Equivalent to dropping the guard.
    pub fn release(self) {}
}

impl Drop for InhibitGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for InhibitGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InhibitGuard")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Inhibitor that never inhibits.
pub struct NoopInhibitor;

impl IdleInhibitor for NoopInhibitor {
    fn acquire(&self, _reason: &str) -> Option<InhibitGuard> {
        None
    }
}
