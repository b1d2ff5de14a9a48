//! Per-document reports and the end-of-batch summary.

use crate::error::PipelineError;
use std::fmt;
use std::path::PathBuf;

/// A failure scoped to one unit or one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: &'static str,
    pub message: String,
}

impl From<&PipelineError> for Failure {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// A segment that did not complete.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub ordinal: usize,
    pub label: String,
    pub failure: Failure,
}

/// Terminal state of one unit in this run.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// Synthesized, written and recorded
    Completed(PathBuf),
    /// Already recorded by an earlier run
    Skipped,
    Failed(Failure),
}

/// What happened to one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub document_id: Option<String>,
    pub title: Option<String>,
    pub completed: usize,
    pub skipped: usize,
    pub failures: Vec<UnitFailure>,
    /// Set when the document was given up on before any unit ran
    pub error: Option<Failure>,
}

impl DocumentReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn record(&mut self, ordinal: usize, label: &str, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Completed(_) => self.completed += 1,
            UnitOutcome::Skipped => self.skipped += 1,
            UnitOutcome::Failed(failure) => self.failures.push(UnitFailure {
                ordinal,
                label: label.to_string(),
                failure,
            }),
        }
    }

    pub fn fail_document(&mut self, err: &PipelineError) {
        self.error = Some(Failure::from(err));
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Reports for every target document, in target order.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub documents: Vec<DocumentReport>,
}

impl BatchSummary {
    pub fn completed(&self) -> usize {
        self.documents.iter().map(|d| d.completed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.documents.iter().map(|d| d.skipped).sum()
    }

    pub fn failed(&self) -> usize {
        self.documents.iter().map(DocumentReport::failed).sum()
    }

    /// True when at least one unit ended the run complete.
    pub fn succeeded(&self) -> bool {
        self.completed() + self.skipped() > 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        for doc in &self.documents {
            match &doc.error {
                Some(err) => writeln!(f, "  {}: {} - {}", doc.display_name(), err.kind, err.message)?,
                None => writeln!(
                    f,
                    "  {}: {} completed, {} skipped, {} failed",
                    doc.display_name(),
                    doc.completed,
                    doc.skipped,
                    doc.failed()
                )?,
            }
            for unit in &doc.failures {
                writeln!(
                    f,
                    "    segment {} ({}): {} - {}",
                    unit.ordinal + 1,
                    unit.label,
                    unit.failure.kind,
                    unit.failure.message
                )?;
            }
        }
        write!(
            f,
            "Total: {} completed, {} skipped, {} failed across {} document(s)",
            self.completed(),
            self.skipped(),
            self.failed(),
            self.documents.len()
        )
    }
}
