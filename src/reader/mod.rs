//! Structured reading of normalized TEI.
//!
//! ```text
//! Element tree ──▶ TeiReader (ReaderSelectors) ──▶ StructuredDocument
//!                        │
//!                        └─▶ clean_text ──▶ MentionExtractor ──▶ Vec<Record>
//! ```

pub mod clean;
pub mod document;
pub mod mentions;
pub mod selectors;
pub mod tei;

pub use clean::clean_text;
pub use document::{
    BibEntry, BlockKind, Compound, DocumentMetadata, Figure, Paragraph, Record,
    StructuredDocument, Table, TextBlock,
};
pub use mentions::{ChemicalRecognizer, MentionExtractor};
pub use selectors::ReaderSelectors;
pub use tei::{TeiReader, UNKNOWN_REFERENCE};
