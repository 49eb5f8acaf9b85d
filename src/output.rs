//! Result types returned by the extraction and comparison APIs.

use crate::entities::CanonicalChemical;
use crate::reader::DocumentMetadata;
use serde::{Deserialize, Serialize};

/// Counters and timings for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Records produced by the reader.
    pub records: usize,
    /// Mention names attempted.
    pub mentions: usize,
    /// Mentions that resolved to a new chemical.
    pub resolved: usize,
    /// Mentions for which no name variant resolved.
    pub misses: usize,
    /// Mentions that resolved to a chemical already in the list.
    pub duplicates: usize,
    /// Lookups that failed with an error (a subset of `misses`' attempts).
    pub lookup_errors: usize,
    pub conversion_ms: u64,
    pub lookup_ms: u64,
}

/// The deduplicated chemicals of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntities {
    /// The input reference as given (path, URL or `<markup>`).
    pub source: String,
    pub metadata: DocumentMetadata,
    /// Order of first appearance; `cid`s are unique.
    pub entities: Vec<CanonicalChemical>,
    /// Paragraph text, kept in memory for the comparison's text overlap.
    #[serde(skip)]
    pub body: Vec<String>,
    pub stats: ExtractionStats,
}

impl DocumentEntities {
    pub fn cids(&self) -> Vec<u64> {
        self.entities.iter().map(|e| e.cid).collect()
    }
}

/// Two documents and their shared chemicals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub left: DocumentEntities,
    pub right: DocumentEntities,
    /// `(i, j)`: `left.entities[i]` and `right.entities[j]` share a `cid`.
    /// At most one pair per `i`.
    pub matches: Vec<(usize, usize)>,
    /// Jaccard similarity of the documents' word n-grams.
    pub text_overlap: f64,
}

impl ComparisonResult {
    /// The shared chemicals, from the left document's list.
    pub fn shared(&self) -> impl Iterator<Item = &CanonicalChemical> {
        self.matches.iter().map(|&(i, _)| &self.left.entities[i])
    }
}
