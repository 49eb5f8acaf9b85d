//! Mention resolution and per-document deduplication.
//!
//! ## Algorithm
//!
//! ```text
//! for each record with names, in document order:
//!   for each name:
//!     for variant in [name, name '.'→',', …spaces removed]:
//!       lookup(variant) → hit? stop
//!     hit with unseen cid → append CanonicalChemical
//!     hit with seen cid   → duplicate, dropped
//!     no hit              → miss
//! ```
//!
//! Lookups are awaited one at a time. The seen-set lives for one call, so
//! two documents never share dedup state.

use crate::lookup::{ChemicalLookup, EnrichedCompound};
use crate::output::ExtractionStats;
use crate::progress::ExtractionProgressCallback;
use crate::reader::Record;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A deduplicated chemical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalChemical {
    /// PubChem CID, the dedup key.
    pub cid: u64,
    /// IUPAC name with `;` replaced by spaces, or the mention when PubChem
    /// has no IUPAC name.
    pub name: String,
    pub iupac_name: Option<String>,
    /// The text mention that produced this entity.
    pub mention: String,
    pub elements: BTreeSet<String>,
    pub molecular_weight: f64,
    pub molecular_formula: String,
    pub synonyms: Vec<String>,
    /// Base64 PNG of the structure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_png: Option<String>,
}

impl CanonicalChemical {
    pub fn from_compound(mention: &str, compound: EnrichedCompound) -> Self {
        let props = compound.properties;
        let iupac_name = props.iupac_name.map(|n| n.replace(';', " "));
        Self {
            cid: props.cid,
            name: iupac_name.clone().unwrap_or_else(|| mention.to_string()),
            iupac_name,
            mention: mention.to_string(),
            elements: props.elements.into_iter().collect(),
            molecular_weight: props.molecular_weight,
            molecular_formula: props.molecular_formula,
            synonyms: compound.synonyms,
            structure_png: compound.structure_png,
        }
    }
}

/// The names tried for a mention, in order.
///
/// 1. the mention verbatim;
/// 2. if it contains `.`, every `.` replaced by `,` (`2.4-D` → `2,4-D`);
/// 3. if the latest candidate contains a space, that candidate without
///    spaces (`Sodium Chloride` → `SodiumChloride`).
///
/// Variants identical to an earlier one are left out.
pub fn name_variants(mention: &str) -> Vec<String> {
    let mut variants = vec![mention.to_string()];
    let mut current = mention.to_string();

    if current.contains('.') {
        current = current.replace('.', ",");
        push_unique(&mut variants, &current);
    }
    if current.contains(' ') {
        current = current.replace(' ', "");
        push_unique(&mut variants, &current);
    }
    variants
}

fn push_unique(variants: &mut Vec<String>, candidate: &str) {
    if !variants.iter().any(|v| v == candidate) {
        variants.push(candidate.to_string());
    }
}

/// Outcome of resolving one mention.
#[derive(Debug, Default)]
pub struct MentionResolution {
    pub compound: Option<EnrichedCompound>,
    /// The variant that produced the hit.
    pub variant: Option<String>,
    /// Lookups that failed with an error rather than a clean miss.
    pub errors: usize,
}

/// Try each name variant until one resolves. Lookup errors are logged and
/// treated like a miss for that variant.
pub async fn resolve_mention(lookup: &dyn ChemicalLookup, mention: &str) -> MentionResolution {
    let mut resolution = MentionResolution::default();
    for variant in name_variants(mention) {
        match lookup.lookup(&variant).await {
            Ok(Some(compound)) => {
                resolution.compound = Some(compound);
                resolution.variant = Some(variant);
                return resolution;
            }
            Ok(None) => debug!("No match for '{}'", variant),
            Err(e) => {
                warn!("Lookup failed: {}", e);
                resolution.errors += 1;
            }
        }
    }
    resolution
}

/// Resolve every mention of `records` and keep the first entity per CID.
pub async fn resolve_entities(
    records: &[Record],
    lookup: &dyn ChemicalLookup,
    progress: Option<&dyn ExtractionProgressCallback>,
) -> (Vec<CanonicalChemical>, ExtractionStats) {
    let start = Instant::now();
    let mentions: Vec<&str> = records
        .iter()
        .flat_map(|r| r.names())
        .map(String::as_str)
        .collect();
    let total = mentions.len();

    let mut stats = ExtractionStats {
        records: records.len(),
        mentions: total,
        ..Default::default()
    };
    let mut seen: HashSet<u64> = HashSet::new();
    let mut entities = Vec::new();

    if let Some(cb) = progress {
        cb.on_extraction_start(total);
    }

    for (i, mention) in mentions.into_iter().enumerate() {
        let index = i + 1;
        let resolution = resolve_mention(lookup, mention).await;
        stats.lookup_errors += resolution.errors;

        let Some(compound) = resolution.compound else {
            stats.misses += 1;
            if let Some(cb) = progress {
                cb.on_mention_miss(index, total, mention);
            }
            continue;
        };

        let cid = compound.properties.cid;
        if !seen.insert(cid) {
            debug!("'{}' is a duplicate of CID {}", mention, cid);
            stats.duplicates += 1;
            if let Some(cb) = progress {
                cb.on_mention_duplicate(index, total, mention, cid);
            }
            continue;
        }

        debug!(
            "'{}' resolved via '{}' to CID {}",
            mention,
            resolution.variant.as_deref().unwrap_or(mention),
            cid
        );
        entities.push(CanonicalChemical::from_compound(mention, compound));
        stats.resolved += 1;
        if let Some(cb) = progress {
            cb.on_mention_resolved(index, total, mention, cid);
        }
    }

    stats.lookup_ms = start.elapsed().as_millis() as u64;
    info!(
        "Resolved {} chemicals from {} mentions ({} duplicates, {} misses)",
        entities.len(),
        stats.mentions,
        stats.duplicates,
        stats.misses
    );
    if let Some(cb) = progress {
        cb.on_extraction_complete(total, entities.len());
    }
    (entities, stats)
}
