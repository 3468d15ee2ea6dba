//! gradestream command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "gradestream",
    version,
    about = "Grade a folder of papers against a rubric and stream the results"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a folder and rubric to the grading service
    Grade {
        /// Folder of papers, as seen by the grading host
        #[arg(long)]
        folder: String,

        /// Rubric file (.txt, .docx or .pdf)
        #[arg(long)]
        rubric: Option<PathBuf>,

        /// Grading endpoint URL (overrides config)
        #[arg(long)]
        endpoint: Option<String>,

        /// Response handling: auto, stream, batch
        #[arg(long)]
        mode: Option<String>,

        /// Unterminated last line of a stream: flush, discard
        #[arg(long)]
        trailing: Option<String>,

        /// Output directory (overrides config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output formats: json, html, feedback, all, none
        #[arg(long, default_value = "json,html")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Do not ask the OS to stay awake during the run
        #[arg(long)]
        no_inhibit: bool,
    },

    /// Re-render a saved JSON report
    Render {
        /// Report JSON produced by `gradestream grade`
        #[arg(long)]
        report: PathBuf,

        /// Output formats: html, feedback, all
        #[arg(long, default_value = "html")]
        format: String,

        /// Output directory
        #[arg(long, default_value = "./gradestream-results")]
        output: PathBuf,
    },

    /// Create a starter config file
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gradestream=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Grade {
            folder,
            rubric,
            endpoint,
            mode,
            trailing,
            output,
            format,
            config,
            no_inhibit,
        } => {
            commands::grade::execute(
                folder, rubric, endpoint, mode, trailing, output, format, config, no_inhibit,
            )
            .await
        }
        Commands::Render {
            report,
            format,
            output,
        } => commands::render::execute(report, format, output),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
