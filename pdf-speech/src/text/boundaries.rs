//! Paragraph and sentence break detection over byte offsets.

use once_cell::sync::Lazy;
use regex::Regex;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n\s*").expect("paragraph break pattern is valid"));

static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:[.!?…]+["'”’)\]]*\s+|[。！？]+\s*)"#)
        .expect("sentence break pattern is valid")
});

/// What kind of boundary a break sits on. Paragraphs sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BreakKind {
    Paragraph,
    Sentence,
}

/// Offset where a new paragraph or sentence begins.
///
/// Whitespace before the offset belongs to the preceding text, so the text
/// starting at `offset` never begins with whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Break {
    pub offset: usize,
    pub kind: BreakKind,
}

/// Find all breaks in ascending order. Offsets are always inside
/// `1..text.len()`, one break per offset, paragraph winning over sentence.
pub fn find_breaks(text: &str) -> Vec<Break> {
    let paragraphs = PARAGRAPH_BREAK.find_iter(text).map(|m| Break {
        offset: m.end(),
        kind: BreakKind::Paragraph,
    });
    let sentences = SENTENCE_BREAK.find_iter(text).map(|m| Break {
        offset: m.end(),
        kind: BreakKind::Sentence,
    });

    let mut breaks: Vec<Break> = paragraphs
        .chain(sentences)
        .filter(|b| b.offset > 0 && b.offset < text.len())
        .collect();

    breaks.sort_by_key(|b| (b.offset, b.kind));
    breaks.dedup_by_key(|b| b.offset);
    breaks
}

/// Split text into trimmed, non-empty sentences.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for brk in find_breaks(text) {
        push_trimmed(&mut sentences, &text[start..brk.offset]);
        start = brk.offset;
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_breaks() {
        let text = "One. Two! Three? Four";
        let offsets: Vec<usize> = find_breaks(text).iter().map(|b| b.offset).collect();
        assert_eq!(offsets, vec![5, 10, 17]);
        assert!(find_breaks(text)
            .iter()
            .all(|b| b.kind == BreakKind::Sentence));
    }

    #[test]
    fn test_paragraph_wins_over_sentence() {
        let text = "End of paragraph.\n\nNext paragraph";
        let breaks = find_breaks(text);
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].kind, BreakKind::Paragraph);
        assert_eq!(&text[breaks[0].offset..], "Next paragraph");
    }

    #[test]
    fn test_no_break_at_end() {
        let text = "Only sentence.   ";
        assert!(find_breaks(text).is_empty());
    }

    #[test]
    fn test_quote_after_period() {
        let text = "\"Stop.\" She left.";
        let breaks = find_breaks(text);
        assert_eq!(&text[breaks[0].offset..], "She left.");
    }

    #[test]
    fn test_decimal_is_not_a_break() {
        assert!(find_breaks("Pi is 3.14 roughly").is_empty());
    }

    #[test]
    fn test_split_into_sentences() {
        let sentences = split_into_sentences("First sentence. Second sentence.\n\nThird.");
        assert_eq!(
            sentences,
            vec!["First sentence.", "Second sentence.", "Third."]
        );
    }
}
