use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    path::Path,
};

use crate::{
    chunking::ChunkingConfig,
    document::Document,
    error::{Error, Result},
};

/// File extensions that can be loaded.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Page separator emitted by `pdf-extract`.
const PAGE_BREAK: char = '\x0C';

/// Raw text pulled out of a file, before chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub pages: usize,
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Turn `pdf-extract` output into line-oriented text and a page count.
///
/// Form feeds become line breaks so the chunker never glues the last line of
/// one page to the first line of the next.
fn pdf_pages(raw: &str) -> ExtractedText {
    let pages = raw
        .split(PAGE_BREAK)
        .filter(|page| !page.trim().is_empty())
        .count()
        .max(1);
    let text = raw.replace(PAGE_BREAK, "\n");
    ExtractedText { text, pages }
}

/// Extract text from PDF bytes.
///
/// `pdf-extract` panics on some malformed files (missing font resources,
/// broken object references); those panics are reported as [`Error::Ingest`].
pub fn extract_pdf(bytes: &[u8]) -> Result<ExtractedText> {
    let raw = match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    })) {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            return Err(Error::Ingest(format!("PDF extraction failed: {e}")));
        }
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            tracing::warn!(%reason, "PDF extractor panicked");
            return Err(Error::Ingest(format!(
                "PDF extraction failed: malformed document ({reason})"
            )));
        }
    };
    Ok(pdf_pages(&raw))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Decode plain text, replacing invalid UTF-8 sequences.
pub fn extract_plain(bytes: Vec<u8>) -> ExtractedText {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };
    ExtractedText { text, pages: 1 }
}

/// Read a supported file into [`ExtractedText`].
pub fn read_text(path: &Path) -> Result<ExtractedText> {
    if !path.is_file() {
        return Err(Error::NotFound {
            kind: "document",
            name: path.display().to_string(),
        });
    }

    let extracted = match extension_of(path).as_deref() {
        Some("pdf") => extract_pdf(&std::fs::read(path)?)?,
        Some("txt" | "md") => extract_plain(std::fs::read(path)?),
        _ => {
            return Err(Error::Ingest(format!(
                "unsupported file type: {} (expected one of: {})",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }
    };

    if extracted.text.trim().is_empty() {
        return Err(Error::Ingest(format!(
            "no text could be extracted from {}",
            path.display()
        )));
    }

    Ok(extracted)
}

/// Read and chunk a document file.
pub fn read_document(
    path: &Path,
    chunking: &ChunkingConfig,
) -> Result<Document> {
    let extracted = read_text(path)?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();

    let document =
        Document::new(name, extracted.pages, extracted.text, chunking);
    tracing::info!(
        name = %document.name,
        pages = document.pages,
        chars = document.text.chars().count(),
        chunks = document.chunks.len(),
        "loaded document"
    );
    Ok(document)
}
