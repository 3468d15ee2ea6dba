//! gradestream-report: HTML and per-student feedback output for grading runs.

pub mod feedback;
pub mod html;
