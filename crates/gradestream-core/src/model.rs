//! Result record types returned by a grading backend.
//!
//! The backend emits one loosely-typed JSON object per graded file. Whether an
//! object is a scored result or a per-file grading failure is decided once,
//! while deserializing, so the rest of the system works with a tagged enum.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RecordError;

/// The grading outcome for one submitted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRecord", into = "WireRecord")]
pub enum ResultRecord {
    /// The backend graded the file against the rubric.
    Scored(ScoredResult),
    /// The backend failed to grade this one file.
    Error(GradingFailure),
}

/// A successfully graded submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    /// Name of the graded file, as reported by the backend.
    pub filename: String,
    /// Student name found on the paper, if any.
    pub student_name: Option<String>,
    /// Quiz title found on the paper, if any.
    pub quiz_name: Option<String>,
    pub total_score: f64,
    /// Always strictly positive.
    pub max_score: f64,
    /// Per-question breakdown, in the order the backend reported it.
    pub questions: Vec<QuestionResult>,
    pub overall_feedback: Option<String>,
    /// Set when the backend graded the file but could not write its
    /// feedback document.
    pub pdf_error: Option<String>,
}

/// A file the backend could not grade.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingFailure {
    /// The file the failure refers to.
    pub file: String,
    /// Failure message from the backend.
    pub message: String,
    pub filename: Option<String>,
}

/// Score and feedback for a single rubric question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// Question label. Backends send either a number or a string.
    #[serde(default, deserialize_with = "question_label")]
    pub question_number: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub max_points: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub partial_credit_awarded: bool,
}

impl ResultRecord {
    /// Parse one NDJSON line into a record.
    pub fn parse_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Convert an already-parsed JSON value (e.g. one element of a batch
    /// `results` array) into a record.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResultRecord::Error(_))
    }

    /// Name of the file this record refers to.
    pub fn filename(&self) -> &str {
        match self {
            ResultRecord::Scored(s) => &s.filename,
            ResultRecord::Error(e) => e.filename.as_deref().unwrap_or(&e.file),
        }
    }

    pub fn as_scored(&self) -> Option<&ScoredResult> {
        match self {
            ResultRecord::Scored(s) => Some(s),
            ResultRecord::Error(_) => None,
        }
    }
}

impl ScoredResult {
    /// Score as a percentage of the maximum, unrounded.
    pub fn percentage(&self) -> f64 {
        100.0 * self.total_score / self.max_score
    }

    /// Student name when the backend found one, otherwise the filename.
    pub fn display_name(&self) -> &str {
        match self.student_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.filename,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

/// The duck-typed object exactly as it appears on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quiz_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    questions: Option<Vec<QuestionResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    overall_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pdf_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

impl TryFrom<WireRecord> for ResultRecord {
    type Error = RecordError;

    fn try_from(wire: WireRecord) -> Result<Self, RecordError> {
        // An empty error string does not mark a failure.
        if let Some(message) = wire.error.filter(|m| !m.is_empty()) {
            return Ok(ResultRecord::Error(GradingFailure {
                file: wire
                    .file
                    .or_else(|| wire.filename.clone())
                    .unwrap_or_default(),
                message,
                filename: wire.filename,
            }));
        }

        let total_score = wire.total_score.ok_or(RecordError::MissingField("total_score"))?;
        let max_score = wire.max_score.ok_or(RecordError::MissingField("max_score"))?;
        if max_score <= 0.0 || !max_score.is_finite() {
            return Err(RecordError::InvalidMaxScore(max_score));
        }
        if !total_score.is_finite() {
            return Err(RecordError::InvalidTotalScore(total_score));
        }

        Ok(ResultRecord::Scored(ScoredResult {
            filename: wire.filename.unwrap_or_default(),
            student_name: wire.student_name,
            quiz_name: wire.quiz_name,
            total_score,
            max_score,
            questions: wire.questions.unwrap_or_default(),
            overall_feedback: wire.overall_feedback,
            pdf_error: wire.pdf_error,
        }))
    }
}

impl From<ResultRecord> for WireRecord {
    fn from(record: ResultRecord) -> Self {
        match record {
            ResultRecord::Scored(s) => WireRecord {
                filename: Some(s.filename),
                student_name: s.student_name,
                quiz_name: s.quiz_name,
                total_score: Some(s.total_score),
                max_score: Some(s.max_score),
                questions: (!s.questions.is_empty()).then_some(s.questions),
                overall_feedback: s.overall_feedback,
                pdf_error: s.pdf_error,
                ..Default::default()
            },
            ResultRecord::Error(e) => WireRecord {
                filename: e.filename,
                error: Some(e.message),
                file: Some(e.file),
                ..Default::default()
            },
        }
    }
}

fn question_label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Label {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Label::deserialize(deserializer)? {
        Label::Int(n) => n.to_string(),
        Label::Float(f) => f.to_string(),
        Label::Text(s) => s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scored_record() {
        let line = r#"{"filename":"a.pdf","student_name":"Ada","total_score":8,"max_score":10,
            "questions":[{"question_number":1,"score":4,"max_points":5,"feedback":"ok","partial_credit_awarded":true}],
            "overall_feedback":"Good work"}"#;
        let record = ResultRecord::parse_line(line).unwrap();
        let scored = record.as_scored().expect("scored record");
        assert_eq!(scored.display_name(), "Ada");
        assert_eq!(scored.percentage(), 80.0);
        assert_eq!(scored.questions.len(), 1);
        assert_eq!(scored.questions[0].question_number, "1");
        assert!(scored.questions[0].partial_credit_awarded);
    }

    #[test]
    fn question_number_accepts_strings() {
        let line = r#"{"total_score":1,"max_score":2,"questions":[{"question_number":"2b","score":1,"max_points":2}]}"#;
        let record = ResultRecord::parse_line(line).unwrap();
        let q = &record.as_scored().unwrap().questions[0];
        assert_eq!(q.question_number, "2b");
        assert_eq!(q.feedback, "");
        assert!(!q.partial_credit_awarded);
    }

    #[test]
    fn error_field_wins_over_scores() {
        let line = r#"{"error":"File processing failed","file":"b.pdf","filename":"b.pdf","total_score":3,"max_score":10}"#;
        let record = ResultRecord::parse_line(line).unwrap();
        match record {
            ResultRecord::Error(e) => {
                assert_eq!(e.file, "b.pdf");
                assert_eq!(e.message, "File processing failed");
            }
            other => panic!("expected error record, got {other:?}"),
        }
    }

    #[test]
    fn empty_error_string_is_not_a_failure() {
        let record = ResultRecord::parse_line(r#"{"error":"","total_score":5,"max_score":5}"#).unwrap();
        assert!(!record.is_error());
    }

    #[test]
    fn scored_record_requires_totals() {
        let err = ResultRecord::parse_line(r#"{"filename":"c.pdf","total_score":3}"#).unwrap_err();
        assert!(err.to_string().contains("max_score"), "got: {err}");
    }

    #[test]
    fn zero_max_score_is_rejected() {
        assert!(ResultRecord::parse_line(r#"{"total_score":0,"max_score":0}"#).is_err());
        assert!(ResultRecord::parse_line(r#"{"total_score":1,"max_score":-4}"#).is_err());
    }

    #[test]
    fn filename_falls_back_for_errors() {
        let record = ResultRecord::parse_line(r#"{"error":"boom","file":"x.pdf"}"#).unwrap();
        assert_eq!(record.filename(), "x.pdf");
    }

    #[test]
    fn serializes_back_to_wire_shape() {
        let record = ResultRecord::parse_line(r#"{"error":"boom","file":"x.pdf"}"#).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, serde_json::json!({"error": "boom", "file": "x.pdf"}));
    }
}
