//! Grading report types with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::AggregateSnapshot;
use crate::model::ResultRecord;
use crate::session::RunSummary;
use crate::submission::Submission;
use crate::traits::Delivery;

/// A complete grading run, as saved to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingReport {
    /// Run identifier.
    pub id: Uuid,
    /// When the run started.
    pub created_at: DateTime<Utc>,
    /// Grading service that produced the results.
    pub service: String,
    /// Folder that was graded.
    pub folder_path: String,
    /// Rubric file name.
    #[serde(default)]
    pub rubric_file: Option<String>,
    pub delivery: Delivery,
    /// Records in arrival order.
    pub records: Vec<ResultRecord>,
    /// Aggregate after the last record.
    pub summary: AggregateSnapshot,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl GradingReport {
    /// Assemble a report from a finished run and the records its sink collected.
    pub fn from_run(
        run: &RunSummary,
        service: &str,
        submission: &Submission,
        records: Vec<ResultRecord>,
    ) -> Self {
        Self {
            id: run.run_id,
            created_at: run.started_at,
            service: service.to_string(),
            folder_path: submission.folder_path.clone(),
            rubric_file: submission.rubric.as_ref().map(|r| r.file_name.clone()),
            delivery: run.delivery,
            records,
            summary: run.aggregate.snapshot(),
            duration_ms: run.duration.as_millis() as u64,
        }
    }

    /// Scored records only.
    pub fn scored(&self) -> impl Iterator<Item = &crate::model::ScoredResult> {
        self.records.iter().filter_map(ResultRecord::as_scored)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: GradingReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::aggregate::RunningAggregate;
    use crate::submission::RubricFile;

    fn make_report() -> GradingReport {
        let records: Vec<ResultRecord> = [
            r#"{"filename":"a.pdf","student_name":"Ada","total_score":9,"max_score":10}"#,
            r#"{"error":"File processing failed by Gemini","file":"b.pdf"}"#,
        ]
        .iter()
        .map(|l| ResultRecord::parse_line(l).unwrap())
        .collect();

        let mut aggregate = RunningAggregate::new();
        for r in &records {
            aggregate.record(r);
        }

        let run = RunSummary {
            run_id: Uuid::nil(),
            started_at: Utc::now(),
            delivery: Delivery::Streamed,
            aggregate,
            duration: Duration::from_millis(1500),
        };
        let submission = Submission::new("/papers", Some(RubricFile::new("rubric.docx", "")));
        GradingReport::from_run(&run, "http://localhost:5001/grade", &submission, records)
    }

    #[test]
    fn from_run_captures_summary() {
        let report = make_report();
        assert_eq!(report.summary.processed_count, 2);
        assert_eq!(report.summary.error_count, 1);
        assert_eq!(report.summary.average_percentage, Some(90));
        assert_eq!(report.rubric_file.as_deref(), Some("rubric.docx"));
        assert_eq!(report.duration_ms, 1500);
        assert_eq!(report.scored().count(), 1);
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = GradingReport::load_json(&path).unwrap();

        assert_eq!(loaded.folder_path, "/papers");
        assert_eq!(loaded.records, report.records);
        assert_eq!(loaded.summary, report.summary);
        assert_eq!(loaded.delivery, Delivery::Streamed);
    }

    #[test]
    fn load_missing_file_fails_with_context() {
        let err = GradingReport::load_json(Path::new("/nonexistent/report.json")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read report"));
    }
}
