//! Split a document's text into ordered, labeled segments.
//!
//! Segments cover the source text exactly once: concatenating their contents
//! in ordinal order gives back the original string byte for byte. Structural
//! segmentation cuts at heading lines; otherwise (or when no heading is
//! found) the text is cut into size-bounded parts at paragraph or sentence
//! breaks. A part is never cut mid-sentence: a paragraph with no internal
//! break is kept whole even if it exceeds the budget.

use super::boundaries::{find_breaks, Break, BreakKind};
use super::headings::HeadingSet;
use super::Segment;
use std::ops::Range;

/// Default maximum characters per size-bounded segment.
pub const DEFAULT_MAX_CHARS: usize = 5000;

/// Default window before the budget in which a break is looked for.
pub const DEFAULT_LOOKBACK_CHARS: usize = 400;

/// Label for text preceding the first heading.
const PREAMBLE_LABEL: &str = "Preamble";

/// Deterministic text segmenter.
pub struct Segmenter {
    headings: HeadingSet,
    max_chars: usize,
    lookback_chars: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(HeadingSet::default(), DEFAULT_MAX_CHARS, DEFAULT_LOOKBACK_CHARS)
    }
}

impl Segmenter {
    /// Create a segmenter. The lookback window is capped at the budget.
    pub fn new(headings: HeadingSet, max_chars: usize, lookback_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            headings,
            max_chars,
            lookback_chars: lookback_chars.min(max_chars),
        }
    }

    /// Segment `text`, optionally by structure.
    ///
    /// Text with no visible characters yields no segments.
    pub fn segment(&self, document_id: &str, text: &str, by_structure: bool) -> Vec<Segment> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let structural = if by_structure {
            self.structural_spans(text)
        } else {
            None
        };

        let spans = match structural {
            Some(spans) => spans,
            None => {
                if by_structure {
                    log::debug!("{}: no headings found, splitting by size", document_id);
                }
                self.sized_spans(text)
                    .into_iter()
                    .enumerate()
                    .map(|(i, span)| (span, format!("Part {}", i + 1)))
                    .collect()
            }
        };

        spans
            .into_iter()
            .enumerate()
            .map(|(ordinal, (span, label))| {
                let content = text[span.clone()].to_string();
                Segment::new(document_id, ordinal, label, span, content)
            })
            .collect()
    }

    /// Spans starting at each heading line, plus a preamble when the text
    /// before the first heading has content. `None` when no heading matched.
    fn structural_spans(&self, text: &str) -> Option<Vec<(Range<usize>, String)>> {
        let mut markers: Vec<(usize, String)> = Vec::new();
        let mut offset = 0;
        let mut prev_blank = true;
        // End of the last heading line and whether it may take a subtitle
        let mut last_heading: Option<(usize, bool)> = None;

        for raw in text.split_inclusive('\n') {
            let line = raw.trim_end_matches(['\n', '\r']);

            if let Some(heading) = self.headings.match_line(line, prev_blank) {
                // "CHAPTER ONE\n\nTHE START" is one heading; a second chapter
                // or section heading always opens its own segment
                let is_subtitle = heading.subtitle
                    && last_heading
                        .map(|(end, takes_subtitle)| {
                            takes_subtitle && text[end..offset].trim().is_empty()
                        })
                        .unwrap_or(false);

                if !is_subtitle {
                    markers.push((offset, heading.label));
                }
                last_heading = Some((offset + raw.len(), !heading.subtitle));
            }

            prev_blank = line.trim().is_empty();
            offset += raw.len();
        }

        let first = markers.first()?.0;
        let mut spans = Vec::with_capacity(markers.len() + 1);

        if text[..first].trim().is_empty() {
            // Leading blank lines belong to the first heading's segment
            markers[0].0 = 0;
        } else {
            spans.push((0..first, PREAMBLE_LABEL.to_string()));
        }

        for (i, (start, label)) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map(|m| m.0).unwrap_or(text.len());
            spans.push((*start..end, label.clone()));
        }

        Some(spans)
    }

    /// Size-bounded spans covering the whole text.
    fn sized_spans(&self, text: &str) -> Vec<Range<usize>> {
        let breaks = find_breaks(text);
        let mut spans = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let end = self.next_cut(text, start, &breaks);
            spans.push(start..end);
            start = end;
        }

        spans
    }

    /// Where the part starting at `start` ends.
    ///
    /// Preference: the last paragraph break inside the lookback window, then
    /// the last sentence break inside it, then any earlier break, then the
    /// first break past the budget, then the end of the text.
    fn next_cut(&self, text: &str, start: usize, breaks: &[Break]) -> usize {
        let Some(limit) = offset_after_chars(text, start, self.max_chars) else {
            return text.len();
        };
        let window_start = offset_after_chars(text, start, self.max_chars - self.lookback_chars)
            .unwrap_or(start);

        let candidates: Vec<&Break> = breaks
            .iter()
            .filter(|b| b.offset > start && b.offset <= limit)
            .collect();

        let in_window: Vec<&Break> = candidates
            .iter()
            .copied()
            .filter(|b| b.offset >= window_start)
            .collect();

        in_window
            .iter()
            .rfind(|b| b.kind == BreakKind::Paragraph)
            .or_else(|| in_window.last())
            .or_else(|| candidates.last())
            .map(|b| b.offset)
            .or_else(|| breaks.iter().find(|b| b.offset > limit).map(|b| b.offset))
            .unwrap_or(text.len())
    }
}

/// Byte offset reached after `n` characters from `start`, or `None` when no
/// more than `n` characters remain.
fn offset_after_chars(text: &str, start: usize, n: usize) -> Option<usize> {
    text[start..].char_indices().nth(n).map(|(i, _)| start + i)
}
