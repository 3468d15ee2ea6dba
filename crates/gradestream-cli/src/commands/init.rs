//! The `gradestream init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("gradestream.toml").exists() {
        println!("gradestream.toml already exists, skipping.");
    } else {
        std::fs::write("gradestream.toml", SAMPLE_CONFIG)?;
        println!("Created gradestream.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point `endpoint` in gradestream.toml at your grading service");
    println!("  2. Run: gradestream grade --folder /path/to/papers --rubric rubric.docx");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# gradestream configuration

# Grading service URL. GRADESTREAM_ENDPOINT overrides this.
endpoint = "http://127.0.0.1:5001/grade"

# auto | stream | batch
mode = "auto"

# What to do with an unterminated last line of a stream: flush | discard
trailing_line = "flush"

# Give up if the stream goes quiet for this long (0 disables).
chunk_timeout_secs = 600

# Ask the OS to stay awake while grading.
inhibit_idle = true

output_dir = "./gradestream-results"
"#;
