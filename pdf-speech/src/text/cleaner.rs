//! Turn raw extracted PDF text into text suitable for speech.
//!
//! Segment contents stay byte-exact; this produces the copy that is actually
//! sent to the synthesizer.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that read badly through TTS and their replacements.
const PROBLEMATIC_CHARS: &[(char, &str)] = &[
    ('\u{2018}', "'"),  // Left single quote
    ('\u{2019}', "'"),  // Right single quote
    ('\u{201c}', "\""), // Left double quote
    ('\u{201d}', "\""), // Right double quote
    ('\u{2013}', "-"),  // En dash
    ('\u{2014}', "-"),  // Em dash
    ('\u{2026}', "..."), // Ellipsis
    ('\u{00a0}', " "),  // Non-breaking space
    ('\u{00ad}', ""),   // Soft hyphen
    ('\u{200b}', ""),   // Zero-width space
    ('\u{feff}', ""),   // BOM
    ('\u{fb01}', "fi"), // Ligatures are common in PDF text layers
    ('\u{fb02}', "fl"),
    ('\u{fb00}', "ff"),
    ('\u{fb03}', "ffi"),
    ('\u{fb04}', "ffl"),
];

/// "exam-\nple" split across a line end.
static LINE_END_HYPHEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").expect("hyphenation pattern is valid")
});

/// Lines holding nothing but a page number.
static PAGE_NUMBER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:page[ \t]+)?\d{1,4}[ \t]*(?:\n|$)").expect("page number pattern is valid")
});

static PARAGRAPH_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("paragraph pattern is valid"));

/// Prepare extracted text for speech.
///
/// - Replaces typographic characters and ligatures
/// - Removes control characters
/// - Rejoins words hyphenated across line ends
/// - Drops page-number-only lines
/// - Joins hard-wrapped lines inside a paragraph
/// - Collapses runs of periods
pub fn prepare_for_speech(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        let replacement = PROBLEMATIC_CHARS
            .iter()
            .find(|(ch, _)| *ch == c)
            .map(|(_, r)| *r);

        if let Some(r) = replacement {
            result.push_str(r);
        } else if c == '\r' {
            continue;
        } else if is_allowed_char(c) {
            result.push(c);
        }
    }

    let result = LINE_END_HYPHEN.replace_all(&result, "$1$2");
    let result = PAGE_NUMBER_LINE.replace_all(&result, "");
    let result = join_wrapped_lines(&result);
    fix_multiple_periods(&result)
}

/// Printable characters plus newline and tab.
fn is_allowed_char(c: char) -> bool {
    c == '\n' || c == '\t' || !c.is_control()
}

/// Join the lines of each paragraph with single spaces, keep paragraphs
/// apart with a blank line.
fn join_wrapped_lines(text: &str) -> String {
    PARAGRAPH_SPLIT
        .split(text)
        .map(|paragraph| paragraph.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Replace runs of periods with one; "..." makes some voices stall.
fn fix_multiple_periods(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_period = false;

    for c in text.chars() {
        if c == '.' {
            if !prev_period {
                result.push('.');
            }
            prev_period = true;
        } else {
            prev_period = false;
            result.push(c);
        }
    }

    result
}
