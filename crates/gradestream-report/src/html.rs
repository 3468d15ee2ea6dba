//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS inlined: a summary bar
//! followed by one card per graded file.

use anyhow::Result;
use std::path::Path;

use gradestream_core::model::{GradingFailure, ResultRecord, ScoredResult};
use gradestream_core::report::GradingReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML report from a grading report.
pub fn generate_html(report: &GradingReport) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>Grading results: {}</title>\n",
        html_escape(&report.folder_path)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>Grading results</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Folder: <strong>{}</strong> | Rubric: {} | {} | {}</p>\n",
        html_escape(&report.folder_path),
        html_escape(report.rubric_file.as_deref().unwrap_or("-")),
        html_escape(&report.service),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary
    html.push_str("<section class=\"stats\">\n");
    html.push_str(&format!(
        "<div class=\"stat\"><span class=\"stat-value\" id=\"processedCount\">{}</span><span class=\"stat-label\">Processed</span></div>\n",
        report.summary.processed_count
    ));
    html.push_str(&format!(
        "<div class=\"stat\"><span class=\"stat-value\" id=\"avgScore\">{}</span><span class=\"stat-label\">Average</span></div>\n",
        report.summary.average_label()
    ));
    if report.summary.error_count > 0 {
        html.push_str(&format!(
            "<div class=\"stat\"><span class=\"stat-value\">{}</span><span class=\"stat-label\">Errors</span></div>\n",
            report.summary.error_count
        ));
    }
    html.push_str("</section>\n");

    // Cards
    html.push_str("<section class=\"results-grid\" id=\"resultsGrid\">\n");
    for record in &report.records {
        match record {
            ResultRecord::Scored(s) => html.push_str(&scored_card(s)),
            ResultRecord::Error(e) => html.push_str(&error_card(e)),
        }
    }
    html.push_str("</section>\n");

    html.push_str("</body>\n</html>");
    html
}

fn scored_card(result: &ScoredResult) -> String {
    let mut card = String::from("<div class=\"result-card\">\n");

    card.push_str("<div class=\"result-header\">\n<div>\n");
    card.push_str(&format!(
        "<div class=\"student-name\">{}</div>\n",
        html_escape(result.display_name())
    ));
    card.push_str(&format!(
        "<div class=\"filename\">{}</div>\n",
        html_escape(&result.filename)
    ));
    if let Some(quiz) = &result.quiz_name {
        card.push_str(&format!("<div class=\"filename\">{}</div>\n", html_escape(quiz)));
    }
    card.push_str("</div>\n<div>\n");
    card.push_str(&format!(
        "<div class=\"total-score\">{}/{}</div>\n",
        result.total_score, result.max_score
    ));
    card.push_str(&format!(
        "<span class=\"score-label\">{}%</span>\n",
        result.percentage().round() as i64
    ));
    card.push_str("</div>\n</div>\n");

    card.push_str("<div class=\"questions-list\">\n");
    for q in &result.questions {
        card.push_str("<div class=\"question-item\">\n<div class=\"q-header\">");
        card.push_str(&format!(
            "<span class=\"q-number\">Q{}</span><span class=\"q-score\">{}/{}</span>",
            html_escape(&q.question_number),
            q.score,
            q.max_points
        ));
        card.push_str("</div>\n<div class=\"q-feedback\">");
        card.push_str(&html_escape(&q.feedback));
        if q.partial_credit_awarded {
            card.push_str(" <span class=\"partial-badge\">Partial Credit</span>");
        }
        card.push_str("</div>\n</div>\n");
    }
    card.push_str("</div>\n");

    let feedback = result
        .overall_feedback
        .as_deref()
        .filter(|f| !f.is_empty())
        .unwrap_or("No feedback provided.");
    card.push_str(&format!(
        "<div class=\"overall-feedback\">\"{}\"</div>\n",
        html_escape(feedback)
    ));
    if let Some(pdf_error) = &result.pdf_error {
        card.push_str(&format!(
            "<p class=\"warning\">Feedback document not written: {}</p>\n",
            html_escape(pdf_error)
        ));
    }

    card.push_str("</div>\n");
    card
}

fn error_card(failure: &GradingFailure) -> String {
    format!(
        "<div class=\"result-card error-card\">\n\
         <div class=\"result-header\"><div class=\"student-name\">Error</div></div>\n\
         <p class=\"error-file\">{}</p>\n\
         <p class=\"error-message\">{}</p>\n\
         </div>\n",
        html_escape(&failure.file),
        html_escape(&failure.message)
    )
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &GradingReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

const CSS: &str = r#"
:root { --bg: #0f172a; --card: rgba(255,255,255,0.05); --fg: #f8fafc; --muted: #94a3b8; --border: rgba(255,255,255,0.1); --accent: #818cf8; --error: #ef4444; }
@media (prefers-color-scheme: light) {
  :root { --bg: #f8fafc; --card: #fff; --fg: #0f172a; --muted: #64748b; --border: #e2e8f0; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
.meta { color: var(--muted); }
.stats { display: flex; gap: 2rem; margin: 1.5rem 0; }
.stat { display: flex; flex-direction: column; }
.stat-value { font-size: 2rem; font-weight: 700; color: var(--accent); }
.stat-label { color: var(--muted); font-size: 0.85rem; }
.results-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(360px, 1fr)); gap: 1.5rem; }
.result-card { background: var(--card); border: 1px solid var(--border); border-radius: 12px; padding: 1.25rem; }
.error-card { border-color: var(--error); }
.error-card .student-name { color: var(--error); }
.error-file { color: var(--muted); }
.error-message { color: #fca5a5; }
.result-header { display: flex; justify-content: space-between; align-items: flex-start; margin-bottom: 1rem; }
.student-name { font-weight: 600; font-size: 1.1rem; }
.filename { font-size: 0.8rem; color: var(--muted); }
.total-score { font-size: 1.5rem; font-weight: 700; text-align: right; }
.score-label { display: block; text-align: right; color: var(--accent); }
.question-item { border-top: 1px solid var(--border); padding: 0.5rem 0; }
.q-header { display: flex; justify-content: space-between; font-weight: 600; }
.q-feedback { color: var(--muted); font-size: 0.9rem; }
.partial-badge { background: #facc15; color: #1f2937; border-radius: 4px; padding: 0 0.4rem; font-size: 0.75rem; margin-left: 0.25rem; }
.overall-feedback { font-style: italic; margin-top: 1rem; }
.warning { color: #fbbf24; font-size: 0.85rem; }
"#;
