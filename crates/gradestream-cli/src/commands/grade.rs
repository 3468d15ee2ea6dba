//! The `gradestream grade` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use gradestream_client::config::load_config_from;
use gradestream_client::{HttpGradingService, SystemdInhibitor};
use gradestream_core::aggregate::AggregateSnapshot;
use gradestream_core::model::ResultRecord;
use gradestream_core::report::GradingReport;
use gradestream_core::session::{GradingSession, RunSummary};
use gradestream_core::submission::{RubricFile, Submission};
use gradestream_core::traits::{IdleInhibitor, NoopInhibitor, ResultSink};

use super::output::{parse_formats, write_outputs};

/// Prints each record as it arrives and keeps them for the saved report.
#[derive(Default)]
struct ConsoleSink {
    records: Vec<ResultRecord>,
}

impl ResultSink for ConsoleSink {
    fn on_record(&mut self, record: &ResultRecord, aggregate: &AggregateSnapshot) {
        match record {
            ResultRecord::Scored(s) => eprintln!(
                "  [{}] {} ({}): {}/{} ({}%) | avg {}",
                aggregate.processed_count,
                s.display_name(),
                s.filename,
                s.total_score,
                s.max_score,
                s.percentage().round() as i64,
                aggregate.average_label(),
            ),
            ResultRecord::Error(e) => eprintln!(
                "  [{}] ERROR {}: {} | avg {}",
                aggregate.processed_count,
                e.file,
                e.message,
                aggregate.average_label(),
            ),
        }
        self.records.push(record.clone());
    }

    fn on_malformed(&mut self, _line: &str, aggregate: &AggregateSnapshot) {
        eprintln!(
            "  [{}] skipped unreadable result line",
            aggregate.processed_count
        );
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    folder: String,
    rubric_path: Option<PathBuf>,
    endpoint: Option<String>,
    mode: Option<String>,
    trailing: Option<String>,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
    no_inhibit: bool,
) -> Result<()> {
    let formats = parse_formats(&format)?;

    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }
    if let Some(mode) = mode {
        config.mode = mode.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(trailing) = trailing {
        config.trailing_line = trailing.parse().map_err(anyhow::Error::msg)?;
    }
    let output = output.unwrap_or_else(|| config.output_dir.clone());
    tracing::debug!(
        endpoint = %config.endpoint,
        mode = %config.mode,
        trailing = %config.trailing_line,
        "resolved grading config"
    );

    let rubric = match &rubric_path {
        Some(path) => Some(RubricFile::from_path(path).await?),
        None => None,
    };
    let submission = Submission::new(folder, rubric);

    let service = HttpGradingService::from_config(&config)?;
    let service_name = service.endpoint().to_string();
    let inhibitor: Arc<dyn IdleInhibitor> = if config.inhibit_idle && !no_inhibit {
        Arc::new(SystemdInhibitor::new())
    } else {
        Arc::new(NoopInhibitor)
    };
    let session = GradingSession::new(Arc::new(service)).with_inhibitor(inhibitor);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, cancelling submission...");
                cancel.cancel();
            }
        })
    };

    eprintln!(
        "gradestream v{} - Grading {} via {}",
        env!("CARGO_PKG_VERSION"),
        submission.folder_path,
        service_name
    );
    eprintln!();

    let mut sink = ConsoleSink::default();
    let result = session.run(&submission, &mut sink, &cancel).await;
    ctrl_c.abort();
    let summary = result?;

    print_summary(&summary, &sink.records);

    let report = GradingReport::from_run(&summary, &service_name, &submission, sink.records);
    write_outputs(&report, &formats, &output)?;

    Ok(())
}

fn print_summary(summary: &RunSummary, records: &[ResultRecord]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Student", "File", "Score", "Percent"]);

    for record in records {
        match record {
            ResultRecord::Scored(s) => table.add_row(vec![
                Cell::new(s.display_name()),
                Cell::new(&s.filename),
                Cell::new(format!("{}/{}", s.total_score, s.max_score)),
                Cell::new(format!("{:.1}%", s.percentage())),
            ]),
            ResultRecord::Error(e) => table.add_row(vec![
                Cell::new("Error"),
                Cell::new(&e.file),
                Cell::new("-"),
                Cell::new(&e.message),
            ]),
        };
    }

    let snapshot = summary.aggregate.snapshot();
    eprintln!("\n{table}");
    eprintln!(
        "\nProcessed {} | Scored {} | Errors {} | Average {} ({:.1}s, {})",
        snapshot.processed_count,
        snapshot.valid_score_count,
        snapshot.error_count,
        snapshot.average_label(),
        summary.duration.as_secs_f64(),
        summary.delivery,
    );
    if snapshot.malformed_count > 0 {
        eprintln!("Skipped {} unreadable line(s)", snapshot.malformed_count);
    }
}
