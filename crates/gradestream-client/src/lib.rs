//! gradestream-client: talks to a grading backend over HTTP.
//!
//! Implements the `GradingService` trait with a multipart upload that accepts
//! either a batch JSON body or a newline-delimited JSON stream, plus the
//! configuration loader and an idle inhibitor for long runs.

pub mod config;
pub mod http;
pub mod inhibit;

pub use config::{load_config, load_config_from, GradestreamConfig};
pub use http::{HttpGradingService, ResponseMode};
pub use inhibit::SystemdInhibitor;
