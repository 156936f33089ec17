//! Safety checks over an accepted matching.
//!
//! These checks feed the review workflow's auto-accept policy: a
//! matching whose pairings all carry the same distance, with identical
//! keywords per pair, is probably a verbatim re-alignment with no
//! textual drift.

use serde::Serialize;

use crate::matching::Triple;
use crate::models::Citation;

/// Classification of an accepted matching.
#[derive(Debug, Clone, Serialize)]
pub struct MatchClassification {
    /// True iff every pairing carries the same distance value.
    pub uniform_distance: bool,
    /// Per-pairing keyword equality, in matching order.
    pub identical_keywords: Vec<bool>,
}

/// True iff every pairing in the matching carries the same distance.
///
/// Rejects on the first differing value; vacuously true for empty and
/// single-pairing matchings.
pub fn has_uniform_distance<L, R>(matching: &[Triple<'_, L, R>]) -> bool {
    let mut seen: Option<u32> = None;

    for triple in matching {
        match seen {
            None => seen = Some(triple.distance),
            Some(d) if d != triple.distance => return false,
            Some(_) => {}
        }
    }

    true
}

/// True iff the two citations of a pairing have character-for-character
/// equal keywords.
pub fn has_identical_keywords<L: Citation, R: Citation>(triple: &Triple<'_, L, R>) -> bool {
    triple.left.keyword() == triple.right.keyword()
}

/// Runs both checks over a matching.
pub fn classify<L: Citation, R: Citation>(matching: &[Triple<'_, L, R>]) -> MatchClassification {
    MatchClassification {
        uniform_distance: has_uniform_distance(matching),
        identical_keywords: matching.iter().map(has_identical_keywords).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{build_candidates, select_matching};
    use crate::models::{Context, ContextKind};

    fn ctx(keyword: &str, number: i64) -> Context {
        Context::new("12r", number, "pre", keyword, "post", ContextKind::None)
    }

    #[test]
    fn uniform_distance_vacuous_cases() {
        let empty: Vec<Triple<'_, Context, Context>> = Vec::new();
        assert!(has_uniform_distance(&empty));

        let left = vec![ctx("cat", 1)];
        let right = vec![ctx("cab", 1)];
        let candidates = build_candidates(&left, &right).unwrap();
        let single = select_matching(&candidates);
        assert_eq!(single.len(), 1);
        assert!(has_uniform_distance(&single));
    }

    #[test]
    fn uniform_distance_rejects_mixed_values() {
        let left = vec![ctx("cat", 1), ctx("dog", 2)];
        let right = vec![ctx("cat", 1), ctx("dogs", 2)];

        let candidates = build_candidates(&left, &right).unwrap();
        let matching = select_matching(&candidates);
        assert_eq!(matching.len(), 2);
        assert!(!has_uniform_distance(&matching));
    }

    #[test]
    fn verbatim_realignment_classifies_clean() {
        // Two equal sequences: all pairs at distance 0 with
        // identical keywords.
        let left = vec![ctx("cat", 1), ctx("dog", 2)];
        let right = vec![ctx("cat", 1), ctx("dog", 2)];

        let candidates = build_candidates(&left, &right).unwrap();
        let matching = select_matching(&candidates);

        let classification = classify(&matching);
        assert!(classification.uniform_distance);
        assert_eq!(classification.identical_keywords, vec![true, true]);
    }

    #[test]
    fn keyword_drift_is_flagged_per_pair() {
        let left = vec![ctx("cat", 1), ctx("dog", 2)];
        let right = vec![ctx("cat", 1), ctx("dogge", 2)];

        let candidates = build_candidates(&left, &right).unwrap();
        let mut matching = select_matching(&candidates);
        crate::matching::sort_by_source_order(&mut matching);

        let classification = classify(&matching);
        assert_eq!(classification.identical_keywords, vec![true, false]);
    }
}
