//! Runs one grading submission end to end.
//!
//! The session validates the submission, holds an idle inhibition for the
//! duration of the request, and hands every record to the caller's sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::aggregate::RunningAggregate;
use crate::error::GradingError;
use crate::submission::Submission;
use crate::traits::{Delivery, GradingService, IdleInhibitor, NoopInhibitor, ResultSink};

/// Outcome of a completed submission.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub delivery: Delivery,
    pub aggregate: RunningAggregate,
    pub duration: Duration,
}

/// Drives a [`GradingService`] for one submission at a time.
pub struct GradingSession {
    service: Arc<dyn GradingService>,
    inhibitor: Arc<dyn IdleInhibitor>,
}

impl GradingSession {
    pub fn new(service: Arc<dyn GradingService>) -> Self {
        Self {
            service,
            inhibitor: Arc::new(NoopInhibitor),
        }
    }

    /// Keep the machine awake while a submission runs.
    pub fn with_inhibitor(mut self, inhibitor: Arc<dyn IdleInhibitor>) -> Self {
        self.inhibitor = inhibitor;
        self
    }

    /// Grade `submission`, streaming records into `sink`.
    ///
    /// Setup errors are returned before the service is contacted. The idle
    /// inhibition is released on every exit path, including when this future
    /// is dropped.
    pub async fn run(
        &self,
        submission: &Submission,
        sink: &mut (dyn ResultSink + Send),
        cancel: &CancellationToken,
    ) -> Result<RunSummary, GradingError> {
        let rubric = submission.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(
            %run_id,
            service = self.service.name(),
            folder = %submission.folder_path,
            rubric = %rubric.file_name,
            "starting grading run"
        );

        let _inhibit = self.inhibitor.acquire("grading submissions");

        let outcome = self.service.grade(submission, sink, cancel).await;
        let duration = start.elapsed();

        match outcome {
            Ok(outcome) => {
                tracing::info!(
                    %run_id,
                    delivery = ?outcome.delivery,
                    processed = outcome.aggregate.processed_count,
                    average = ?outcome.aggregate.average_percentage(),
                    elapsed_ms = duration.as_millis() as u64,
                    "grading run complete"
                );
                Ok(RunSummary {
                    run_id,
                    started_at,
                    delivery: outcome.delivery,
                    aggregate: outcome.aggregate,
                    duration,
                })
            }
            Err(e) => {
                tracing::error!(%run_id, "grading run failed: {e}");
                Err(e)
            }
        }
    }
}
