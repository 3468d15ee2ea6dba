//! Per-student feedback documents.
//!
//! One Markdown file per scored record, named `"<student> Feedback <quiz>.md"`,
//! suitable for handing back to the student.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use gradestream_core::model::ScoredResult;
use gradestream_core::report::GradingReport;

/// File name for a student's feedback document.
pub fn feedback_file_name(result: &ScoredResult) -> String {
    let student = sanitize(result.student_name.as_deref().unwrap_or("Student"));
    let quiz = sanitize(result.quiz_name.as_deref().unwrap_or("Quiz"));
    format!("{student} Feedback {quiz}.md")
}

fn sanitize(part: &str) -> String {
    let cleaned = part.trim().replace(['/', '\\'], "-");
    if cleaned.is_empty() {
        "Unknown".to_string()
    } else {
        cleaned
    }
}

/// Render one feedback document.
pub fn generate_feedback(result: &ScoredResult) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# {} Feedback {}\n\n",
        result.student_name.as_deref().unwrap_or("Unknown Student"),
        result.quiz_name.as_deref().unwrap_or("Quiz")
    ));
    md.push_str(&format!(
        "**Total Score:** {} / {}\n\n",
        result.total_score, result.max_score
    ));

    if let Some(overall) = result.overall_feedback.as_deref().filter(|f| !f.is_empty()) {
        md.push_str("## Overall Feedback\n\n");
        md.push_str(overall);
        md.push_str("\n\n");
    }

    if !result.questions.is_empty() {
        md.push_str("## Question Details\n\n");
        for q in &result.questions {
            md.push_str(&format!(
                "### Question {} ({}/{})",
                q.question_number, q.score, q.max_points
            ));
            if q.partial_credit_awarded {
                md.push_str(" *(Partial Credit Awarded)*");
            }
            md.push_str("\n\n");
            if !q.feedback.is_empty() {
                md.push_str(&q.feedback);
                md.push_str("\n\n");
            }
        }
    }

    md
}

/// Write a feedback document for every scored record into `dir`.
///
/// Returns the paths written, in record order.
pub fn write_feedback_files(report: &GradingReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create feedback folder {}", dir.display()))?;

    let mut written = Vec::new();
    for result in report.scored() {
        let path = dir.join(feedback_file_name(result));
        std::fs::write(&path, generate_feedback(result))
            .with_context(|| format!("failed to write feedback to {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
