// src/pdf_extract.rs

use crate::error::{PipelineError, Result};
use lopdf::Document;
use tracing::{info, warn};

/// Minimum number of non-whitespace characters we expect from a
/// "real" text PDF. Below this threshold the document is likely scanned.
const MIN_TEXT_CHARS: usize = 30;

/// Extract the text of a PDF as one string, pages in order separated by
/// newlines.
///
/// A document that cannot be parsed is an error; a parseable document with
/// no extractable text yields an empty string and is left for downstream
/// validation to reject.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<String> {
    // Structural pass first: a corrupt file fails here, and an image-only
    // document gets flagged before we spend time on text extraction.
    let doc = Document::load_mem(pdf_bytes).map_err(|e| PipelineError::Document {
        message: format!("failed to parse PDF: {e}"),
    })?;

    if looks_like_scanned(&doc) {
        warn!("PDF structural check: likely scanned / image-only — text extraction may come up empty");
    }

    let text = pdf_extract::extract_text_from_mem(pdf_bytes).map_err(|e| {
        PipelineError::Document {
            message: format!("failed to extract text from PDF: {e}"),
        }
    })?;

    let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
    if meaningful < MIN_TEXT_CHARS {
        info!(chars = meaningful, "Extracted text is very short");
    } else {
        info!(chars = meaningful, "Text extracted successfully");
    }

    Ok(text)
}

/// Heuristic: inspect the PDF object tree for signs that every page
/// is just a single image with no text operators.
///
/// A page whose `Resources` dictionary carries XObject images but no Font
/// entries is almost certainly a scanned page.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false; // Can't tell — let text extraction try
    }

    let mut image_only_pages = 0;

    for object_id in pages.values() {
        let Ok(page_obj) = doc.get_object(*object_id) else {
            continue;
        };
        let Ok(page_dict) = page_obj.as_dict() else {
            continue;
        };

        let has_fonts = resources_entry_nonempty(doc, page_dict, b"Font");
        let has_images = resources_entry_nonempty(doc, page_dict, b"XObject");

        if has_images && !has_fonts {
            image_only_pages += 1;
        }
    }

    let total = pages.len();
    let ratio = image_only_pages as f64 / total as f64;
    info!(
        total_pages = total,
        image_only = image_only_pages,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );

    // If ≥80% of pages are image-only, treat the whole PDF as scanned
    ratio >= 0.8
}

/// True if the page's `Resources` dictionary has a non-empty entry under
/// `key`, following indirect references.
fn resources_entry_nonempty(doc: &Document, page_dict: &lopdf::Dictionary, key: &[u8]) -> bool {
    page_dict
        .get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|res| res.get(key).ok())
        .and_then(|entry| doc.dereference(entry).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|dict| !dict.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_document_error() {
        let err = extract_text(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, PipelineError::Document { .. }));
    }

    #[test]
    fn empty_input_is_a_document_error() {
        assert!(extract_text(b"").is_err());
    }
}
