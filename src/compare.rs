//! Pairing the chemicals of two documents.

use crate::config::PipelineConfig;
use crate::entities::CanonicalChemical;
use crate::error::PaperChemError;
use crate::extract::extract_entities;
use crate::output::ComparisonResult;
use crate::text::text_overlap;
use tracing::info;

/// For each `i` in order, the first `j` with the same CID.
///
/// At most one pair per `i`; a `j` may be paired with several `i` only if
/// the left list repeats a CID, which a deduplicated list never does.
pub fn match_entities(a: &[CanonicalChemical], b: &[CanonicalChemical]) -> Vec<(usize, usize)> {
    match_cids(
        &a.iter().map(|e| e.cid).collect::<Vec<_>>(),
        &b.iter().map(|e| e.cid).collect::<Vec<_>>(),
    )
}

/// [`match_entities`] over bare identifiers.
pub fn match_cids(a: &[u64], b: &[u64]) -> Vec<(usize, usize)> {
    a.iter()
        .enumerate()
        .filter_map(|(i, cid)| b.iter().position(|other| other == cid).map(|j| (i, j)))
        .collect()
}

/// Extract both documents independently and pair their chemicals.
pub async fn compare_documents(
    left: &str,
    right: &str,
    config: &PipelineConfig,
) -> Result<ComparisonResult, PaperChemError> {
    let left = extract_entities(left, config).await?;
    let right = extract_entities(right, config).await?;

    let matches = match_entities(&left.entities, &right.entities);
    let overlap = text_overlap(&left.body, &right.body, config.ngram_size);
    info!(
        "{} shared chemicals ({} vs {}), text overlap {:.3}",
        matches.len(),
        left.entities.len(),
        right.entities.len(),
        overlap
    );

    Ok(ComparisonResult {
        left,
        right,
        matches,
        text_overlap: overlap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_first_match_per_left_entry() {
        assert_eq!(match_cids(&[1, 2, 3], &[5, 2, 1]), vec![(0, 2), (1, 1)]);
    }

    #[test]
    fn empty_sides_have_no_pairs() {
        assert!(match_cids(&[], &[1, 2]).is_empty());
        assert!(match_cids(&[1, 2], &[]).is_empty());
    }

    #[test]
    fn repeated_right_cid_pairs_with_first() {
        assert_eq!(match_cids(&[7], &[3, 7, 7]), vec![(0, 1)]);
    }
}
