//! Source documents, their identity, and the extraction seam.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Author used when a document does not name one.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Metadata read from a document, all optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub pages: usize,
}

/// Raw output of an extractor.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// One source file, ready for segmentation.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable identifier keying the progress ledger
    pub id: String,
    pub path: PathBuf,
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, extracted: ExtractedText) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            text: extracted.text,
            metadata: extracted.metadata,
        }
    }

    /// File name without extension, used for artifact names.
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    /// Title from metadata, falling back to the file stem.
    pub fn title(&self) -> String {
        self.metadata
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.stem())
    }

    /// Author from metadata, falling back to [`UNKNOWN_AUTHOR`].
    pub fn author(&self) -> String {
        self.metadata
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(UNKNOWN_AUTHOR)
            .to_string()
    }
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Produces raw text and metadata from a document file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Fails with `DocumentUnreadable` when the file cannot be read or parsed.
    async fn extract(&self, path: &Path) -> Result<ExtractedText>;
}

/// How a document's ledger key is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentIdentity {
    /// SHA-256 of the file contents; survives renames, changes on edit
    #[default]
    ContentHash,
    /// Canonical path; survives edits, changes on rename
    Path,
}

impl DocumentIdentity {
    /// Compute the identifier for a file.
    pub fn identify(self, path: &Path) -> Result<String> {
        match self {
            Self::ContentHash => content_hash(path),
            Self::Path => {
                let canonical = path
                    .canonicalize()
                    .map_err(|e| PipelineError::unreadable(path, e))?;
                Ok(canonical.to_string_lossy().into_owned())
            }
        }
    }
}

/// First 16 hex characters of the file's SHA-256.
pub fn content_hash(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| PipelineError::unreadable(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| PipelineError::unreadable(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let hash = format!("{:x}", hasher.finalize());
    Ok(hash[..16].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_follows_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("renamed.pdf");
        std::fs::write(&a, b"%PDF-1.4 same bytes").unwrap();
        std::fs::write(&b, b"%PDF-1.4 same bytes").unwrap();

        let id_a = DocumentIdentity::ContentHash.identify(&a).unwrap();
        let id_b = DocumentIdentity::ContentHash.identify(&b).unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(id_a.len(), 16);

        std::fs::write(&b, b"%PDF-1.4 edited bytes").unwrap();
        assert_ne!(DocumentIdentity::ContentHash.identify(&b).unwrap(), id_a);
    }

    #[test]
    fn test_path_identity() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.pdf");
        std::fs::write(&a, b"x").unwrap();
        let id = DocumentIdentity::Path.identify(&a).unwrap();
        assert!(id.ends_with("a.pdf"));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = DocumentIdentity::ContentHash
            .identify(Path::new("/nonexistent/x.pdf"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DocumentUnreadable { .. }));
    }

    #[test]
    fn test_title_and_author_fallbacks() {
        let doc = Document::new("id", "/in/report.pdf", ExtractedText::default());
        assert_eq!(doc.title(), "report");
        assert_eq!(doc.author(), UNKNOWN_AUTHOR);

        let doc = Document::new(
            "id",
            "/in/report.pdf",
            ExtractedText {
                text: String::new(),
                metadata: DocumentMetadata {
                    title: Some("  Annual Report ".into()),
                    author: Some("".into()),
                    pages: 3,
                },
            },
        );
        assert_eq!(doc.title(), "Annual Report");
        assert_eq!(doc.author(), UNKNOWN_AUTHOR);
    }
}
