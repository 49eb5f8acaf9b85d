//! # paperchem
//!
//! Extract, enrich and compare the chemical entities of scientific papers.
//!
//! ## Why this crate?
//!
//! A paper mentions the same compound many ways: `sodium chloride`, `NaCl`,
//! `Sodium Chloride (NaCl)`. Counting mentions says little about which
//! chemicals a paper actually works with. This crate converts the PDF to TEI
//! with a document-understanding service, finds chemical mentions in the
//! structured text, resolves each one against PubChem and keeps one entry
//! per PubChem compound (CID). Two papers can then be compared on the
//! chemicals they share.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / URL / TEI
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Convert   GROBID (local) → authenticated backend on unavailability
//!  ├─ 3. Normalize strip namespaces, build an owned element tree
//!  ├─ 4. Read      selector-driven TEI reader + chemical mention recognizer
//!  ├─ 5. Enrich    PubChem lookup with name fallbacks (sequential)
//!  └─ 6. Dedup     first entity per CID, in order of appearance
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paperchem::{extract_entities, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // GROBID expected on http://localhost:8070
//!     let config = PipelineConfig::default();
//!     let doc = extract_entities("paper.pdf", &config).await?;
//!     for chem in &doc.entities {
//!         println!("{} (CID {}) {}", chem.name, chem.cid, chem.molecular_formula);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paperchem` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paperchem = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chem;
pub mod compare;
pub mod config;
pub mod entities;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod lookup;
pub mod markup;
pub mod output;
pub mod progress;
pub mod reader;
pub mod stream;
pub mod text;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compare::{compare_documents, match_entities};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use entities::{name_variants, resolve_entities, CanonicalChemical};
pub use error::{LookupError, PaperChemError};
pub use extract::{
    extract_entities, extract_entities_from_bytes, extract_entities_from_markup,
    extract_entities_sync, extract_entities_to_file, inspect,
};
pub use gateway::{BackendClient, ConversionGateway, DocumentConverter, GrobidClient};
pub use lookup::{ChemicalLookup, CompoundProperties, EnrichedCompound, PubChemClient};
pub use output::{ComparisonResult, DocumentEntities, ExtractionStats};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reader::{ChemicalRecognizer, MentionExtractor, ReaderSelectors, StructuredDocument, TeiReader};
pub use stream::{convert_batch, ConvertedDocument};
