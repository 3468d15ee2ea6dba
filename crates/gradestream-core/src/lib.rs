//! gradestream-core: result model, streaming ingestion, and running aggregates.
//!
//! This crate defines the record types a grading backend returns, the
//! incremental NDJSON ingestor that turns a chunked byte stream into those
//! records, and the submission session that drives a grading service.

pub mod aggregate;
pub mod error;
pub mod ingest;
pub mod model;
pub mod report;
pub mod session;
pub mod submission;
pub mod traits;
