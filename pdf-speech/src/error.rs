use std::path::PathBuf;
use thiserror::Error;

/// Failure conditions of the conversion pipeline.
///
/// Everything except `NoDocuments` is scoped to a single document or unit and
/// is isolated by the orchestrator.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Could not read {}: {reason}", path.display())]
    DocumentUnreadable { path: PathBuf, reason: String },

    #[error("No text found in {}", path.display())]
    EmptyDocument { path: PathBuf },

    #[error("Language could not be determined: {0}")]
    LanguageUndetermined(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Failed to write {}: {reason}", path.display())]
    ArtifactWrite { path: PathBuf, reason: String },

    #[error("Progress ledger {} is unreadable: {reason}", path.display())]
    LedgerCorrupt { path: PathBuf, reason: String },

    #[error("Failed to update progress ledger: {0}")]
    LedgerWrite(#[from] std::io::Error),

    #[error("No PDF documents to process{}", .0.as_ref().map(|d| format!(" in {}", d.display())).unwrap_or_default())]
    NoDocuments(Option<PathBuf>),
}

impl PipelineError {
    /// Short machine-friendly name used in the batch summary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DocumentUnreadable { .. } => "DocumentUnreadable",
            Self::EmptyDocument { .. } => "EmptyDocument",
            Self::LanguageUndetermined(_) => "LanguageUndetermined",
            Self::Synthesis(_) => "SynthesisError",
            Self::ArtifactWrite { .. } => "ArtifactWriteError",
            Self::LedgerCorrupt { .. } => "LedgerCorrupt",
            Self::LedgerWrite(_) => "LedgerWriteError",
            Self::NoDocuments(_) => "NoDocuments",
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DocumentUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
