//! Running statistics over the records of one grading submission.
//!
//! The average is always recomputed from the accumulated percentage sum and
//! the count of scored records. It is never re-derived from a previously
//! rounded average.

use serde::{Deserialize, Serialize};

use crate::model::ResultRecord;

/// Counters accumulated while a submission's records arrive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningAggregate {
    /// Every consumed record or malformed line.
    pub processed_count: u64,
    /// Sum of `100 * total_score / max_score` over scored records.
    pub total_percentage_sum: f64,
    /// Number of scored records contributing to the sum.
    pub valid_score_count: u64,
    /// Lines that could not be parsed as a record.
    #[serde(default)]
    pub malformed_count: u64,
}

/// Point-in-time view of a [`RunningAggregate`] handed to sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub processed_count: u64,
    pub valid_score_count: u64,
    /// Records that carried a backend grading error.
    pub error_count: u64,
    pub malformed_count: u64,
    /// Rounded average percentage; `None` until a scored record arrives.
    pub average_percentage: Option<i64>,
}

impl RunningAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one parsed record. Returns the record's percentage when it was a
    /// scored record.
    pub fn record(&mut self, record: &ResultRecord) -> Option<f64> {
        self.processed_count += 1;
        let scored = record.as_scored()?;
        let percentage = scored.percentage();
        self.total_percentage_sum += percentage;
        self.valid_score_count += 1;
        Some(percentage)
    }

    /// Count a line that failed to parse. The sum and scored count are untouched.
    pub fn record_malformed(&mut self) {
        self.processed_count += 1;
        self.malformed_count += 1;
    }

    /// Exact running mean, rounded to the nearest whole percent.
    pub fn average_percentage(&self) -> Option<i64> {
        if self.valid_score_count == 0 {
            return None;
        }
        let mean = self.total_percentage_sum / self.valid_score_count as f64;
        Some(mean.round() as i64)
    }

    /// Records that parsed but carried a backend grading error.
    pub fn error_count(&self) -> u64 {
        self.processed_count - self.valid_score_count - self.malformed_count
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            processed_count: self.processed_count,
            valid_score_count: self.valid_score_count,
            error_count: self.error_count(),
            malformed_count: self.malformed_count,
            average_percentage: self.average_percentage(),
        }
    }
}

impl AggregateSnapshot {
    /// Average formatted the way result pages show it, e.g. `80%` or `N/A`.
    pub fn average_label(&self) -> String {
        match self.average_percentage {
            Some(avg) => format!("{avg}%"),
            None => "N/A".to_string(),
        }
    }
}
