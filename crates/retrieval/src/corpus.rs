//! Corpus loading.
//!
//! Flattens heterogeneous sources (CSV records, extracted document
//! text) into one ordered sequence of documents. The resulting ordinal
//! order is the join key between a document, its embedding, and any
//! search result, so loading must be deterministic: tabular sources
//! first in declared order, then text sources in declared order.

use crate::config::RetrievalConfig;
use medrag_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// One retrievable text document and its position in the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Zero-based position in the corpus sequence
    pub ordinal: usize,

    /// The document text
    pub text: String,
}

/// The full ordered set of retrievable documents for one process
/// lifetime. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    /// Build a corpus from texts in ordinal order.
    pub fn from_texts(texts: Vec<String>) -> Self {
        let documents = texts
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Document { ordinal, text })
            .collect();
        Self { documents }
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the corpus holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Text of the document at `ordinal`, or `None` when the ordinal
    /// falls outside the corpus. Search results are mapped through
    /// this accessor so that a desynced index degrades to fewer
    /// results instead of a panic.
    pub fn get(&self, ordinal: usize) -> Option<&str> {
        self.documents.get(ordinal).map(|doc| doc.text.as_str())
    }

    /// Iterate over documents in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    /// Content fingerprint of the corpus.
    ///
    /// SHA-256 over the document texts in ordinal order, each prefixed
    /// with its byte length so document boundaries are unambiguous.
    /// Persisted alongside the index artifact to detect a corpus that
    /// changed since the index was built.
    pub fn fingerprint(&self) -> CorpusFingerprint {
        let mut hasher = Sha256::new();
        for doc in &self.documents {
            hasher.update((doc.text.len() as u64).to_le_bytes());
            hasher.update(doc.text.as_bytes());
        }
        CorpusFingerprint(hasher.finalize().into())
    }
}

/// SHA-256 digest of a corpus, in ordinal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusFingerprint(pub [u8; 32]);

impl CorpusFingerprint {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CorpusFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Pluggable text extraction for free-text sources.
///
/// Document-format parsing (PDF and friends) lives behind this seam;
/// the loader only sees raw text.
pub trait TextExtractor: Send + Sync {
    /// Extract the full text of the document at `path`.
    fn extract(&self, path: &Path) -> AppResult<String>;
}

/// Extractor for sources that are already plain text.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> AppResult<String> {
        std::fs::read_to_string(path)
            .map_err(|e| AppError::Corpus(format!("Failed to read text source {:?}: {}", path, e)))
    }
}

/// Load the corpus from the declared sources.
///
/// Deterministic given fixed input files. A missing source file is an
/// error here and fatal for the warm-up pipeline: better to never
/// answer than to answer from a partial corpus.
pub fn load_corpus(
    config: &RetrievalConfig,
    extractor: &dyn TextExtractor,
) -> AppResult<Corpus> {
    let mut texts = Vec::new();

    for path in config.tabular_paths() {
        if !path.exists() {
            return Err(AppError::Corpus(format!(
                "Missing tabular source: {:?}",
                path
            )));
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| AppError::Corpus(format!("Failed to open {:?}: {}", path, e)))?;

        let mut rows = 0usize;
        for record in reader.records() {
            let record = record
                .map_err(|e| AppError::Corpus(format!("Malformed record in {:?}: {}", path, e)))?;
            texts.push(flatten_record(&record, &config.field_separator));
            rows += 1;
        }

        tracing::debug!("Loaded {} records from {:?}", rows, path);
    }

    for path in config.text_paths() {
        if !path.exists() {
            return Err(AppError::Corpus(format!("Missing text source: {:?}", path)));
        }

        let raw = extractor.extract(&path)?;
        let paragraphs = split_paragraphs(&raw);
        tracing::debug!("Split {:?} into {} paragraphs", path, paragraphs.len());
        texts.extend(paragraphs);
    }

    tracing::info!("Corpus loaded: {} documents", texts.len());
    Ok(Corpus::from_texts(texts))
}

/// Flatten one tabular record into a single document text.
///
/// Non-empty fields joined with the separator, in column order.
/// Missing/empty fields are skipped entirely; a record with no
/// non-empty fields yields an empty-string document, not a dropped
/// row, since dropping it would shift every later ordinal.
fn flatten_record(record: &csv::StringRecord, separator: &str) -> String {
    record
        .iter()
        .filter(|field| !field.trim().is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Split extracted text on blank-line boundaries into paragraphs,
/// discarding whitespace-only paragraphs.
fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
