//! Text processing: segmentation, speech cleanup, and request splitting.

mod boundaries;
pub mod chunker;
mod cleaner;
pub mod headings;
pub mod segmenter;

pub use cleaner::prepare_for_speech;
pub use headings::{BuiltinHeading, HeadingSet};
pub use segmenter::Segmenter;

use std::ops::Range;

/// A contiguous slice of a document's text, synthesized independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Identity of the document this segment was cut from
    pub document_id: String,
    /// Position in synthesis order (0-based, dense)
    pub ordinal: usize,
    /// Heading text, "Preamble", or "Part N"
    pub label: String,
    /// Byte range within the source text
    pub span: Range<usize>,
    /// Raw content, exactly `source[span]`
    pub text: String,
    /// Detected or forced language, filled in by the orchestrator
    pub language: Option<String>,
}

impl Segment {
    /// Create a new segment without a language.
    pub fn new(
        document_id: impl Into<String>,
        ordinal: usize,
        label: impl Into<String>,
        span: Range<usize>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            ordinal,
            label: label.into(),
            span,
            text: text.into(),
            language: None,
        }
    }

    /// Set the language this segment will be spoken in.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}
