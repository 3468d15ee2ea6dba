//! The inputs of one grading run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// A folder of student papers to grade against a rubric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Folder on the grading host that holds the papers.
    pub folder_path: String,
    /// The rubric to grade against. Required.
    #[serde(default)]
    pub rubric: Option<RubricFile>,
}

/// A rubric document uploaded alongside the folder path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricFile {
    /// File name reported to the backend; its extension selects the parser
    /// (`.pdf`, `.docx`, anything else is read as text).
    pub file_name: String,
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl RubricFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Read a rubric from disk.
    pub async fn from_path(path: &Path) -> Result<Self, SetupError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| SetupError::UnreadableRubric {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rubric.txt".to_string());
        Ok(Self { file_name, content })
    }
}

impl Submission {
    pub fn new(folder_path: impl Into<String>, rubric: Option<RubricFile>) -> Self {
        Self {
            folder_path: folder_path.into(),
            rubric,
        }
    }

    /// Reject a submission that is missing required inputs.
    pub fn validate(&self) -> Result<&RubricFile, SetupError> {
        if self.folder_path.trim().is_empty() {
            return Err(SetupError::MissingFolderPath);
        }
        self.rubric.as_ref().ok_or(SetupError::MissingRubric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rubric_is_required() {
        let submission = Submission::new("/papers", None);
        assert!(matches!(
            submission.validate(),
            Err(SetupError::MissingRubric)
        ));
    }

    #[test]
    fn folder_path_is_required() {
        let submission = Submission::new("  ", Some(RubricFile::new("r.txt", "Q1: 5 pts")));
        assert!(matches!(
            submission.validate(),
            Err(SetupError::MissingFolderPath)
        ));
    }

    #[test]
    fn valid_submission_returns_rubric() {
        let submission = Submission::new("/papers", Some(RubricFile::new("r.txt", "Q1: 5 pts")));
        assert_eq!(submission.validate().unwrap().file_name, "r.txt");
    }

    #[tokio::test]
    async fn rubric_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rubric.txt");
        std::fs::write(&path, "Q1: factor x^2 - 1").unwrap();

        let rubric = RubricFile::from_path(&path).await.unwrap();
        assert_eq!(rubric.file_name, "rubric.txt");
        assert_eq!(rubric.content, b"Q1: factor x^2 - 1");

        let missing = RubricFile::from_path(&dir.path().join("nope.txt")).await;
        assert!(matches!(missing, Err(SetupError::UnreadableRubric { .. })));
    }
}
