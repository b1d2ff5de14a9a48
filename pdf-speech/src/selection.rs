//! Choosing which documents a run processes.

use crate::error::{PipelineError, Result};
use std::ffi::OsStr;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How target documents are chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Every PDF in the input directory
    All,
    /// Pick from a numbered list of the input directory
    Interactive,
    /// Named files, resolved against the input directory
    Explicit(Vec<PathBuf>),
}

/// Resolve a selection into document paths, reading interactive answers
/// from stdin.
///
/// Fails with `NoDocuments` when nothing is selected.
pub fn resolve_targets(selection: &Selection, input_dir: &Path) -> Result<Vec<PathBuf>> {
    match selection {
        Selection::All => {
            let files = find_pdf_files(input_dir);
            if files.is_empty() {
                return Err(PipelineError::NoDocuments(Some(input_dir.to_path_buf())));
            }
            Ok(files)
        }
        Selection::Interactive => {
            let files = find_pdf_files(input_dir);
            if files.is_empty() {
                return Err(PipelineError::NoDocuments(Some(input_dir.to_path_buf())));
            }
            let stdin = io::stdin();
            let chosen = choose_interactively(&files, &mut stdin.lock(), &mut io::stderr())
                .map_err(|e| {
                    log::warn!("Could not read selection: {}", e);
                    PipelineError::NoDocuments(None)
                })?;
            if chosen.is_empty() {
                return Err(PipelineError::NoDocuments(None));
            }
            Ok(chosen)
        }
        Selection::Explicit(names) => {
            if names.is_empty() {
                return Err(PipelineError::NoDocuments(None));
            }
            Ok(names.iter().map(|n| resolve_name(n, input_dir)).collect())
        }
    }
}

/// PDFs directly inside `dir`, sorted by file name.
pub fn find_pdf_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        log::warn!("Input directory {} does not exist", dir.display());
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_pdf(entry.path()) => {
                files.push(entry.path().to_path_buf());
            }
            Ok(_) => {}
            Err(e) => log::warn!("Skipping directory entry: {}", e),
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

/// Check if a path is a PDF file (case-insensitive)
fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Names that exist as given are used as-is; others are looked up in the
/// input directory. Missing files are kept and fail later as unreadable.
fn resolve_name(name: &Path, input_dir: &Path) -> PathBuf {
    if name.exists() || name.is_absolute() {
        return name.to_path_buf();
    }
    input_dir.join(name)
}

/// Show a numbered list and read a choice like `all` or `1,3-5`.
///
/// Invalid answers are reported and asked again; end of input selects
/// nothing.
pub fn choose_interactively(
    files: &[PathBuf],
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> io::Result<Vec<PathBuf>> {
    writeln!(output, "Available documents:")?;
    for (i, file) in files.iter().enumerate() {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writeln!(output, "  {:>3}) {}", i + 1, name)?;
    }

    loop {
        write!(output, "Select documents (e.g. 1,3-5 or all): ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(Vec::new());
        }

        match parse_selection(&line, files.len()) {
            Ok(indices) => return Ok(indices.into_iter().map(|i| files[i].clone()).collect()),
            Err(msg) => writeln!(output, "  {}", msg)?,
        }
    }
}

/// Parse `all` or a comma-separated list of 1-based numbers and ranges into
/// 0-based indices, in the order given and without duplicates.
pub fn parse_selection(input: &str, count: usize) -> std::result::Result<Vec<usize>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("Nothing selected".to_string());
    }
    if input.eq_ignore_ascii_case("all") || input == "*" {
        return Ok((0..count).collect());
    }

    let parse_number = |s: &str| -> std::result::Result<usize, String> {
        let n: usize = s
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a number", s.trim()))?;
        if n == 0 || n > count {
            return Err(format!("{} is out of range (1-{})", n, count));
        }
        Ok(n - 1)
    };

    let mut indices = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let range = match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_number(start)?;
                let end = parse_number(end)?;
                if start > end {
                    return Err(format!("Invalid range '{}'", part));
                }
                start..=end
            }
            None => {
                let n = parse_number(part)?;
                n..=n
            }
        };
        for i in range {
            if !indices.contains(&i) {
                indices.push(i);
            }
        }
    }

    if indices.is_empty() {
        return Err("Nothing selected".to_string());
    }
    Ok(indices)
}
