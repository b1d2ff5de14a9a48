//! Split speech text into pieces small enough for one TTS request.
//!
//! Unlike segmentation this is free to cut long sentences: the pieces of one
//! segment are synthesized back to back into the same artifact, so nothing is
//! lost by a cut, it only costs a small pause.

use super::boundaries::split_into_sentences;

/// Maximum recursion depth for splitting long sentences.
const MAX_SPLIT_DEPTH: usize = 10;

/// Clause delimiters tried in order of preference.
const DELIMITERS: &[&str] = &[";", ":", ",", " - "];

/// Split text into request pieces of at most `max_chars` characters.
///
/// Sentences are packed greedily; a sentence longer than the limit is cut at
/// clause delimiters, then at spaces, then hard.
pub fn split_for_requests(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in split_into_sentences(text) {
        if char_len(&sentence) > max_chars {
            flush(&mut pieces, &mut current);
            pieces.extend(split_long_sentence(&sentence, max_chars, 0));
        } else if current.is_empty() {
            current = sentence;
        } else if char_len(&current) + char_len(&sentence) + 1 <= max_chars {
            current.push(' ');
            current.push_str(&sentence);
        } else {
            flush(&mut pieces, &mut current);
            current = sentence;
        }
    }
    flush(&mut pieces, &mut current);

    pieces
}

fn flush(pieces: &mut Vec<String>, current: &mut String) {
    let piece = std::mem::take(current);
    let piece = piece.trim();
    if !piece.is_empty() {
        pieces.push(piece.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split a long sentence at natural break points.
fn split_long_sentence(sentence: &str, max_chars: usize, depth: usize) -> Vec<String> {
    if depth > MAX_SPLIT_DEPTH {
        return hard_split(sentence, max_chars);
    }

    if char_len(sentence) <= max_chars {
        return vec![sentence.to_string()];
    }

    for delimiter in DELIMITERS {
        if !sentence.contains(delimiter) {
            continue;
        }

        let parts: Vec<&str> = sentence.split(delimiter).collect();
        let chunks = reassemble_parts(&parts, delimiter, max_chars);
        if chunks.len() > 1 {
            return chunks
                .into_iter()
                .flat_map(|chunk| split_long_sentence(&chunk, max_chars, depth + 1))
                .collect();
        }
    }

    let words = split_on_words(sentence, max_chars);
    if words.len() > 1 {
        return words
            .into_iter()
            .flat_map(|w| {
                if char_len(&w) > max_chars {
                    hard_split(&w, max_chars)
                } else {
                    vec![w]
                }
            })
            .collect();
    }

    hard_split(sentence, max_chars)
}

/// Rejoin delimiter-split parts into pieces that fit, keeping the delimiter
/// at the end of the part it followed.
fn reassemble_parts(parts: &[&str], delimiter: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let last = parts.len().saturating_sub(1);

    for (i, part) in parts.iter().enumerate() {
        let mut part = part.trim().to_string();
        if i < last && !delimiter.trim().is_empty() {
            part.push_str(delimiter.trim_end());
        }
        if part.is_empty() {
            continue;
        }

        if current.is_empty() {
            current = part;
        } else if char_len(&current) + char_len(&part) + 1 <= max_chars {
            current.push(' ');
            current.push_str(&part);
        } else {
            chunks.push(std::mem::replace(&mut current, part));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Pack words into pieces that fit.
fn split_on_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if char_len(&current) + char_len(word) + 1 <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            chunks.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Cut at exact character positions (last resort).
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|c| c.iter().collect())
        .collect()
}
