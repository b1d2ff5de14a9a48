//! PDF text and metadata extraction.

use crate::document::{DocumentMetadata, ExtractedText, TextExtractor};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use lopdf::Object;
use std::path::{Path, PathBuf};

/// Extracts the text layer with `pdf-extract` and the Info dictionary with
/// `lopdf`.
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedText> {
        let owned: PathBuf = path.to_path_buf();
        // Both libraries are synchronous and can panic on malformed input
        match tokio::task::spawn_blocking(move || extract_blocking(&owned)).await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => Err(PipelineError::unreadable(
                path,
                "PDF parser crashed on this file",
            )),
            Err(join_err) => Err(PipelineError::unreadable(path, join_err)),
        }
    }
}

fn extract_blocking(path: &Path) -> Result<ExtractedText> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::unreadable(path, e))?;

    let mut doc =
        lopdf::Document::load_mem(&bytes).map_err(|e| PipelineError::unreadable(path, e))?;
    let encrypted = doc.is_encrypted();
    // Owner-password-only files open with an empty user password
    let decrypted = !encrypted || doc.decrypt("").is_ok();
    let metadata = if decrypted {
        read_metadata(&doc)
    } else {
        DocumentMetadata {
            pages: doc.get_pages().len(),
            ..Default::default()
        }
    };

    let extracted = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string());
    let text = accept_text(extracted, encrypted)
        .map_err(|reason| PipelineError::unreadable(path, reason))?;

    log::debug!(
        "Extracted {} chars from {} ({} pages{})",
        text.len(),
        path.display(),
        metadata.pages,
        if encrypted { ", encrypted" } else { "" }
    );

    Ok(ExtractedText { text, metadata })
}

/// Outcome of text extraction. Encrypted files are only rejected when
/// nothing readable came out of them.
fn accept_text(
    extracted: std::result::Result<String, String>,
    encrypted: bool,
) -> std::result::Result<String, String> {
    match extracted {
        Ok(text) if encrypted && text.trim().is_empty() => {
            Err("document is encrypted and needs a password".to_string())
        }
        Ok(text) => Ok(text),
        Err(e) if encrypted => Err(format!("document is encrypted: {}", e)),
        Err(e) => Err(e),
    }
}

fn read_metadata(doc: &lopdf::Document) -> DocumentMetadata {
    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_object(*id).ok(),
        Ok(obj) => Some(obj),
        Err(_) => None,
    };
    let dict = info.and_then(|obj| obj.as_dict().ok());

    let field = |key: &[u8]| -> Option<String> {
        match dict?.get(key).ok()? {
            Object::String(raw, _) => {
                let value = decode_pdf_string(raw);
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            _ => None,
        }
    };

    DocumentMetadata {
        title: field(b"Title"),
        author: field(b"Author"),
        pages: doc.get_pages().len(),
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a BOM, otherwise
/// PDFDocEncoding, read here as Latin-1.
fn decode_pdf_string(raw: &[u8]) -> String {
    if let Some(body) = raw.strip_prefix(&[0xfe, 0xff]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(body) = raw.strip_prefix(&[0xef, 0xbb, 0xbf]) {
        return String::from_utf8_lossy(body).into_owned();
    }
    raw.iter().map(|&b| b as char).collect()
}
