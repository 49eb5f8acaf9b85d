//! Word n-grams for the text-overlap score of a comparison.

use std::collections::BTreeSet;

/// Split each document on whitespace, optionally lower-casing every token.
pub fn tokenize<S: AsRef<str>>(docs: &[S], lower_case: bool) -> Vec<Vec<String>> {
    docs.iter()
        .map(|d| {
            d.as_ref()
                .split_whitespace()
                .map(|t| {
                    if lower_case {
                        t.to_lowercase()
                    } else {
                        t.to_string()
                    }
                })
                .collect()
        })
        .collect()
}

/// Every run of `n` consecutive tokens within one document, space-joined.
/// N-grams never span two documents.
pub fn extract_n_grams(tokenized: &[Vec<String>], n: usize) -> BTreeSet<String> {
    if n == 0 {
        return BTreeSet::new();
    }
    tokenized
        .iter()
        .flat_map(|doc| doc.windows(n).map(|w| w.join(" ")))
        .collect()
}

/// |A ∩ B| / |A ∪ B|; 0.0 when both sets are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard similarity of the lower-cased word n-grams of two texts.
pub fn text_overlap<S: AsRef<str>>(a: &[S], b: &[S], n: usize) -> f64 {
    let grams_a = extract_n_grams(&tokenize(a, true), n);
    let grams_b = extract_n_grams(&tokenize(b, true), n);
    jaccard(&grams_a, &grams_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lower_cases_on_request() {
        let docs = ["The Quick  brown\nFox"];
        assert_eq!(tokenize(&docs, true), vec![vec!["the", "quick", "brown", "fox"]]);
        assert_eq!(tokenize(&docs, false)[0][1], "Quick");
    }

    #[test]
    fn bigrams_stay_within_documents() {
        let tokens = tokenize(&["a b c", "d e"], false);
        let grams: Vec<String> = extract_n_grams(&tokens, 2).into_iter().collect();
        assert_eq!(grams, vec!["a b", "b c", "d e"]);
    }

    #[test]
    fn short_documents_have_no_ngrams() {
        let tokens = tokenize(&["single"], false);
        assert!(extract_n_grams(&tokens, 2).is_empty());
        assert!(extract_n_grams(&tokens, 0).is_empty());
    }

    #[test]
    fn overlap_bounds() {
        let empty: [&str; 0] = [];
        assert_eq!(text_overlap(&empty, &empty, 2), 0.0);
        assert_eq!(text_overlap(&["a b c"], &["A B C"], 2), 1.0);
        // {a b, b c} vs {b c, c d}: 1 / 3
        let v = text_overlap(&["a b c"], &["b c d"], 2);
        assert!((v - 1.0 / 3.0).abs() < 1e-12);
    }
}
