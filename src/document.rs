use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::chunking::{Chunk, ChunkingConfig};

/// A loaded document, chunked and ready for retrieval.
///
/// Documents are immutable once built. A new upload produces a new
/// `Document` that replaces the old one in the [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct Document {
    /// File name the document was loaded from.
    pub name: String,
    /// Page count (1 for plain-text sources).
    pub pages: usize,
    /// Full extracted text.
    pub text: String,
    /// Chunks in document order.
    pub chunks: Vec<Chunk>,
}

impl Document {
    pub fn new(
        name: impl Into<String>,
        pages: usize,
        text: String,
        chunking: &ChunkingConfig,
    ) -> Self {
        let chunks = chunking.chunk(&text);
        Self {
            name: name.into(),
            pages,
            text,
            chunks,
        }
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            name: self.name.clone(),
            pages: self.pages,
            chunks: self.chunks.len(),
            chars: self.text.chars().count(),
        }
    }
}

/// What a client is told after loading a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub pages: usize,
    pub chunks: usize,
    pub chars: usize,
}

/// Holder of the current document.
///
/// Loading swaps the whole document in at once; readers clone the `Arc` and
/// keep working with the version they saw even if a new one is installed
/// meanwhile.
#[derive(Debug, Default)]
pub struct DocumentStore {
    current: RwLock<Option<Arc<Document>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `document`, dropping the previous one.
    pub fn replace(&self, document: Document) -> Arc<Document> {
        let document = Arc::new(document);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::clone(&document));
        document
    }

    pub fn current(&self) -> Option<Arc<Document>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, text: &str) -> Document {
        Document::new(name, 1, text.to_string(), &ChunkingConfig::default())
    }

    #[test]
    fn new_document_is_chunked() {
        let document = doc("manual.txt", "První řádek\nDruhý řádek");
        assert_eq!(document.chunks.len(), 1);
        assert_eq!(document.chunks[0].text, "První řádek\nDruhý řádek");
    }

    #[test]
    fn summary_counts_characters() {
        let summary = doc("návod.txt", "žluťoučký kůň").summary();
        assert_eq!(
            summary,
            DocumentSummary {
                name: "návod.txt".to_string(),
                pages: 1,
                chunks: 1,
                chars: 13,
            }
        );
    }

    #[test]
    fn store_starts_empty() {
        assert!(DocumentStore::new().current().is_none());
    }

    #[test]
    fn replace_swaps_document_for_later_readers() {
        let store = DocumentStore::new();
        store.replace(doc("a.txt", "první"));
        let before = store.current().unwrap();

        store.replace(doc("b.txt", "druhý"));
        let after = store.current().unwrap();

        // Readers holding the old Arc keep a consistent view.
        assert_eq!(before.name, "a.txt");
        assert_eq!(after.name, "b.txt");
    }
}
