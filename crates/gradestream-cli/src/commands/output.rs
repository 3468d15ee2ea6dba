//! Report files shared by `grade` and `render`.

use std::path::Path;

use anyhow::Result;

use gradestream_core::report::GradingReport;
use gradestream_report::feedback::write_feedback_files;
use gradestream_report::html::write_html_report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Html,
    Feedback,
}

/// Parse a comma-separated format list. `all` selects everything, `none` nothing.
pub fn parse_formats(list: &str) -> Result<Vec<OutputFormat>> {
    let mut formats = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let format = match part.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "html" => OutputFormat::Html,
            "feedback" => OutputFormat::Feedback,
            "all" => {
                formats = vec![OutputFormat::Json, OutputFormat::Html, OutputFormat::Feedback];
                continue;
            }
            "none" => {
                formats.clear();
                continue;
            }
            other => anyhow::bail!("unknown output format: '{other}'"),
        };
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}

/// Write `report` in each requested format under `output`.
pub fn write_outputs(report: &GradingReport, formats: &[OutputFormat], output: &Path) -> Result<()> {
    if formats.is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(output)?;
    let timestamp = report.created_at.format("%Y-%m-%dT%H%M%S");

    for fmt in formats {
        match fmt {
            OutputFormat::Json => {
                let path = output.join(format!("report-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            OutputFormat::Html => {
                let path = output.join(format!("report-{timestamp}.html"));
                write_html_report(report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            OutputFormat::Feedback => {
                let dir = output.join("feedback");
                let written = write_feedback_files(report, &dir)?;
                eprintln!("Feedback: {} file(s) in {}", written.len(), dir.display());
            }
        }
    }
    Ok(())
}
