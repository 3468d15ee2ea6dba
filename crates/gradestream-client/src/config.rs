//! gradestream configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gradestream_core::ingest::TrailingLine;

use crate::http::ResponseMode;

/// Top-level gradestream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradestreamConfig {
    /// Grading endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// How to read a successful response.
    #[serde(default)]
    pub mode: ResponseMode,
    /// What to do with an unterminated last line of a streamed response.
    #[serde(default)]
    pub trailing_line: TrailingLine,
    /// Overall request timeout. Unset or `0` means no limit.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Fail a streamed response that stays silent this long. `0` disables it.
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout_secs: Option<u64>,
    /// Ask the OS not to idle-sleep while a run is in progress.
    #[serde(default = "default_true")]
    pub inhibit_idle: bool,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:5001/grade".to_string()
}
fn default_chunk_timeout() -> Option<u64> {
    Some(600)
}
fn default_true() -> bool {
    true
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./gradestream-results")
}

impl Default for GradestreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            mode: ResponseMode::default(),
            trailing_line: TrailingLine::default(),
            request_timeout_secs: None,
            chunk_timeout_secs: default_chunk_timeout(),
            inhibit_idle: true,
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `gradestream.toml` in the current directory
/// 2. `~/.config/gradestream/config.toml`
///
/// `GRADESTREAM_ENDPOINT` overrides the endpoint from any file.
pub fn load_config() -> Result<GradestreamConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<GradestreamConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("gradestream.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            parse_config_file(&path)?
        }
        None => GradestreamConfig::default(),
    };

    if let Ok(endpoint) = std::env::var("GRADESTREAM_ENDPOINT") {
        config.endpoint = endpoint;
    }
    config.endpoint = resolve_env_vars(&config.endpoint);

    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<GradestreamConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<GradestreamConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gradestream"))
}
