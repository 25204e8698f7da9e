//! Run reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ExportError, LoadError, ThumbnailError};
use crate::model::{LoadWarning, OutputArtifact, Validity};

/// Aggregate status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every selected page produced both artifacts from a valid document.
    Success,
    /// Some artifacts failed, or the document needed repair.
    PartialSuccess,
    /// The document could not be loaded.
    Failure,
}

/// Why an artifact is missing.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error(transparent)]
    Export(ExportError),

    #[error(transparent)]
    Thumbnail(ThumbnailError),

    /// The run was cancelled before the page started.
    #[error("Cancelled")]
    Cancelled,

    /// The artifact was produced but could not be written out.
    #[error("Write failed: {0}")]
    Write(String),
}

impl From<ExportError> for FailureReason {
    fn from(err: ExportError) -> Self {
        FailureReason::Export(err)
    }
}

impl From<ThumbnailError> for FailureReason {
    fn from(err: ThumbnailError) -> Self {
        FailureReason::Thumbnail(err)
    }
}

/// Result for one artifact of one page.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success(OutputArtifact),
    Failure(FailureReason),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn artifact(&self) -> Option<&OutputArtifact> {
        match self {
            Outcome::Success(artifact) => Some(artifact),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(reason) => Some(reason),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Failure(FailureReason::Cancelled))
    }
}

/// Both outcomes for one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    /// Zero-based page index
    pub page_index: usize,
    pub vector: Outcome,
    pub thumbnail: Outcome,
}

impl PageReport {
    pub(crate) fn cancelled(page_index: usize) -> Self {
        Self {
            page_index,
            vector: Outcome::Failure(FailureReason::Cancelled),
            thumbnail: Outcome::Failure(FailureReason::Cancelled),
        }
    }

    /// Whether both artifacts were produced.
    pub fn is_complete(&self) -> bool {
        self.vector.is_success() && self.thumbnail.is_success()
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &OutputArtifact> {
        self.vector.artifact().into_iter().chain(self.thumbnail.artifact())
    }
}

/// Structured report of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub validity: Validity,
    /// One entry per selected page, ordered by page index.
    pub pages: Vec<PageReport>,
    /// Problems found while loading the document.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<LoadWarning>,
    /// Set when the document failed to load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<LoadError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Report for a document that failed to load.
    pub(crate) fn load_failure(error: LoadError, started_at: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::Failure,
            validity: Validity::Invalid,
            pages: Vec::new(),
            warnings: Vec::new(),
            error: Some(error),
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Aggregate page reports into a run status.
    pub(crate) fn status_for(validity: Validity, pages: &[PageReport]) -> RunStatus {
        match validity {
            Validity::Invalid => RunStatus::Failure,
            Validity::PartiallyCorrupt => RunStatus::PartialSuccess,
            Validity::Valid if pages.iter().all(PageReport::is_complete) => RunStatus::Success,
            Validity::Valid => RunStatus::PartialSuccess,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All produced artifacts in page order, vector before thumbnail.
    pub fn artifacts(&self) -> impl Iterator<Item = &OutputArtifact> {
        self.pages.iter().flat_map(PageReport::artifacts)
    }

    /// Number of artifacts that failed for any reason.
    pub fn failure_count(&self) -> usize {
        self.pages
            .iter()
            .map(|p| usize::from(!p.vector.is_success()) + usize::from(!p.thumbnail.is_success()))
            .sum()
    }

    /// Number of produced artifacts that carry render warnings.
    pub fn degraded_count(&self) -> usize {
        self.artifacts().filter(|a| a.is_degraded()).count()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
