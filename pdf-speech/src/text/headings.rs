//! Heading recognition for structural segmentation.
//!
//! A heading matcher looks at one line of extracted text and decides whether
//! that line opens a new chapter or section. Matchers are kept in an ordered
//! [`HeadingSet`] and tried in priority order, so custom patterns from the
//! configuration can be put ahead of the built-in ones.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Longest line (in characters) that is still considered a heading.
const MAX_HEADING_CHARS: usize = 80;

/// Longest label kept for a segment.
const MAX_LABEL_CHARS: usize = 80;

const CHAPTER_PATTERN: &str = r"(?i)^\s*(?:chapter|chap\.)\s+(?:\d+|[ivxlcdm]+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty)\b";

const SECTION_PATTERN: &str = r"(?i)^\s*(?:section|§)\s*\d+(?:\.\d+)*\b";

/// A strategy that recognises heading lines.
pub trait HeadingMatcher: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Span of the heading label within `line`, if the line is a heading.
    ///
    /// `at_paragraph_start` is true when the line is the first line of the
    /// text or follows a blank line.
    fn match_line(&self, line: &str, at_paragraph_start: bool) -> Option<Range<usize>>;

    /// True for strategies that also recognise a title line printed under a
    /// chapter heading, such as "THE BEGINNING" below "CHAPTER ONE".
    fn matches_subtitles(&self) -> bool {
        false
    }
}

/// A heading line recognised by a [`HeadingSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    pub label: String,
    /// Matched by a strategy that also accepts subtitle lines
    pub subtitle: bool,
}

/// Heading matcher backed by a regular expression anchored on the line.
pub struct RegexHeading {
    name: String,
    regex: Regex,
}

impl RegexHeading {
    /// Create a matcher from a user-supplied pattern.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
        })
    }

    /// "Chapter 3", "CHAPTER IV", "Chap. twelve".
    pub fn chapter() -> Self {
        Self::new("chapter", CHAPTER_PATTERN).expect("built-in chapter pattern is valid")
    }

    /// "Section 2", "Section 4.1.3", "§ 7".
    pub fn section() -> Self {
        Self::new("section", SECTION_PATTERN).expect("built-in section pattern is valid")
    }
}

impl HeadingMatcher for RegexHeading {
    fn name(&self) -> &str {
        &self.name
    }

    fn match_line(&self, line: &str, _at_paragraph_start: bool) -> Option<Range<usize>> {
        if line.trim().chars().count() > MAX_HEADING_CHARS {
            return None;
        }
        // The label is the whole line once the pattern fires
        self.regex.find(line).map(|_| trimmed_range(line))
    }
}

/// Short all-caps lines that open a paragraph, e.g. "THE LONG WINTER".
pub struct AllCapsHeading {
    min_letters: usize,
    max_chars: usize,
}

impl Default for AllCapsHeading {
    fn default() -> Self {
        Self {
            min_letters: 3,
            max_chars: 60,
        }
    }
}

impl HeadingMatcher for AllCapsHeading {
    fn name(&self) -> &str {
        "all-caps"
    }

    fn match_line(&self, line: &str, at_paragraph_start: bool) -> Option<Range<usize>> {
        if !at_paragraph_start {
            return None;
        }

        let trimmed = line.trim();
        if trimmed.chars().count() > self.max_chars {
            return None;
        }
        if trimmed.ends_with([',', ';', ':']) {
            return None;
        }

        let upper = trimmed.chars().filter(|c| c.is_uppercase()).count();
        let lower = trimmed.chars().filter(|c| c.is_lowercase()).count();

        (upper >= self.min_letters && lower == 0).then(|| trimmed_range(line))
    }

    fn matches_subtitles(&self) -> bool {
        true
    }
}

/// Built-in matchers selectable from the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinHeading {
    Chapter,
    Section,
    AllCaps,
}

impl BuiltinHeading {
    /// Default priority order.
    pub fn defaults() -> Vec<Self> {
        vec![Self::Chapter, Self::Section, Self::AllCaps]
    }

    fn matcher(self) -> Box<dyn HeadingMatcher> {
        match self {
            Self::Chapter => Box::new(RegexHeading::chapter()),
            Self::Section => Box::new(RegexHeading::section()),
            Self::AllCaps => Box::new(AllCapsHeading::default()),
        }
    }
}

/// Ordered set of heading matchers; the first one that fires wins.
pub struct HeadingSet {
    matchers: Vec<Box<dyn HeadingMatcher>>,
}

impl Default for HeadingSet {
    fn default() -> Self {
        Self::from_builtins(&BuiltinHeading::defaults())
    }
}

impl HeadingSet {
    /// Create an empty set that never matches.
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Create a set from built-in matchers, in the given order.
    pub fn from_builtins(builtins: &[BuiltinHeading]) -> Self {
        Self {
            matchers: builtins.iter().map(|b| b.matcher()).collect(),
        }
    }

    /// Custom patterns first, then the listed built-ins.
    pub fn from_config(
        patterns: &[String],
        builtins: &[BuiltinHeading],
    ) -> Result<Self, regex::Error> {
        let mut set = Self::empty();
        for (i, pattern) in patterns.iter().enumerate() {
            set = set.with(RegexHeading::new(format!("custom-{}", i + 1), pattern)?);
        }
        for builtin in builtins {
            set.matchers.push(builtin.matcher());
        }
        Ok(set)
    }

    /// Append a matcher with the lowest priority so far.
    pub fn with(mut self, matcher: impl HeadingMatcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// The heading on this line, if any matcher accepts it.
    pub fn match_line(&self, line: &str, at_paragraph_start: bool) -> Option<HeadingMatch> {
        self.matchers.iter().find_map(|m| {
            let span = m.match_line(line, at_paragraph_start)?;
            let label = normalize_label(&line[span]);
            if label.is_empty() {
                return None;
            }
            log::trace!("heading '{}' matched by {}", label, m.name());
            Some(HeadingMatch {
                label,
                subtitle: m.matches_subtitles(),
            })
        })
    }
}

/// Byte range of `line` without surrounding whitespace.
fn trimmed_range(line: &str) -> Range<usize> {
    let start = line.len() - line.trim_start().len();
    let end = line.trim_end().len();
    start..end.max(start)
}

/// Collapse internal whitespace and cap the length.
fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_LABEL_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_matches() {
        let m = RegexHeading::chapter();
        assert!(m.match_line("Chapter 1", false).is_some());
        assert!(m.match_line("  CHAPTER IV  ", false).is_some());
        assert!(m.match_line("Chap. twelve: The Return", false).is_some());
        assert!(m.match_line("In chapter 1 we saw", false).is_none());
        assert!(m.match_line("Chapters are long", false).is_none());
    }

    #[test]
    fn test_chapter_rejects_long_lines() {
        let m = RegexHeading::chapter();
        let line = format!("Chapter 1 {}", "word ".repeat(30));
        assert!(m.match_line(&line, true).is_none());
    }

    #[test]
    fn test_section_matches() {
        let m = RegexHeading::section();
        assert!(m.match_line("Section 2", false).is_some());
        assert!(m.match_line("SECTION 4.1.3 Results", false).is_some());
        assert!(m.match_line("§ 7", false).is_some());
        assert!(m.match_line("Sections 2 and 3", false).is_none());
    }

    #[test]
    fn test_all_caps_requires_paragraph_start() {
        let m = AllCapsHeading::default();
        assert!(m.match_line("THE LONG WINTER", true).is_some());
        assert!(m.match_line("THE LONG WINTER", false).is_none());
        assert!(m.match_line("The Long Winter", true).is_none());
        assert!(m.match_line("OK", true).is_none());
        assert!(m.match_line("NOTE:", true).is_none());
    }

    #[test]
    fn test_label_is_trimmed_line() {
        let set = HeadingSet::default();
        let heading = set.match_line("   Chapter 3:   The   Storm  ", false).unwrap();
        assert_eq!(heading.label, "Chapter 3: The Storm");
        assert!(!heading.subtitle);
    }

    #[test]
    fn test_priority_order() {
        let set = HeadingSet::from_config(
            &[r"^Book \d+$".to_string()],
            &[BuiltinHeading::Chapter],
        )
        .unwrap();
        let label = |line: &str, start: bool| set.match_line(line, start).map(|m| m.label);
        assert_eq!(label("Book 2", false), Some("Book 2".to_string()));
        assert_eq!(label("Chapter 9", false), Some("Chapter 9".to_string()));
        assert_eq!(label("SHOUTING LINE", true), None);
    }

    #[test]
    fn test_only_all_caps_matches_subtitles() {
        let set = HeadingSet::default();
        assert!(set.match_line("THE BEGINNING", true).unwrap().subtitle);
        assert!(!set.match_line("Chapter 2", true).unwrap().subtitle);
        // Chapter pattern wins over all-caps for "CHAPTER TWO"
        assert!(!set.match_line("CHAPTER TWO", true).unwrap().subtitle);
    }

    #[test]
    fn test_invalid_custom_pattern() {
        assert!(HeadingSet::from_config(&["(unclosed".to_string()], &[]).is_err());
    }

    #[test]
    fn test_empty_set_never_matches() {
        let set = HeadingSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.match_line("Chapter 1", true), None);
    }

    #[test]
    fn test_builtin_heading_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            headings: Vec<BuiltinHeading>,
        }
        let parsed: Wrapper = toml::from_str(r#"headings = ["all-caps", "chapter"]"#).unwrap();
        assert_eq!(
            parsed.headings,
            vec![BuiltinHeading::AllCaps, BuiltinHeading::Chapter]
        );
    }
}
