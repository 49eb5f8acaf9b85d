//! Chemical enrichment: resolve a mention to a database record.
//!
//! The pipeline only sees the [`ChemicalLookup`] trait, so tests and
//! alternative databases can stand in for [`PubChemClient`].

pub mod pubchem;

pub use pubchem::PubChemClient;

use crate::error::LookupError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Core properties of a resolved compound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundProperties {
    /// PubChem compound identifier.
    pub cid: u64,
    /// One symbol per atom; repeats are expected (`H2O` → `O, H, H`).
    pub elements: Vec<String>,
    pub molecular_weight: f64,
    pub molecular_formula: String,
    pub iupac_name: Option<String>,
}

/// A database hit for one mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedCompound {
    /// At most the configured number of synonyms, database order.
    pub synonyms: Vec<String>,
    pub properties: CompoundProperties,
    /// Base64-encoded PNG of the 2D structure.
    pub structure_png: Option<String>,
}

/// Resolves a chemical name.
///
/// `Ok(None)` means the database does not know the name. `Err` is a failed
/// request; the pipeline treats both as a miss, but only the error is logged.
#[async_trait]
pub trait ChemicalLookup: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<Option<EnrichedCompound>, LookupError>;
}
