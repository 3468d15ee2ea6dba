//! The `gradestream render` command.

use std::path::PathBuf;

use anyhow::Result;

use gradestream_core::report::GradingReport;

use super::output::{parse_formats, write_outputs, OutputFormat};

pub fn execute(report_path: PathBuf, format: String, output: PathBuf) -> Result<()> {
    let report = GradingReport::load_json(&report_path)?;

    // The JSON report already exists.
    let formats: Vec<OutputFormat> = parse_formats(&format)?
        .into_iter()
        .filter(|f| *f != OutputFormat::Json)
        .collect();
    anyhow::ensure!(
        !formats.is_empty(),
        "nothing to render: choose html and/or feedback"
    );

    eprintln!(
        "Rendering {} record(s) from {}",
        report.records.len(),
        report_path.display()
    );
    write_outputs(&report, &formats, &output)
}
