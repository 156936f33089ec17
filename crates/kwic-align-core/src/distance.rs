//! Similarity metric between two citations.
//!
//! A citation is serialized into a single delimited string from its
//! comparable fields (`preceding`, `keyword`, `following`, `location`,
//! `number`), and the distance between two citations is the
//! character-level Levenshtein edit distance between their serialized
//! forms. The metric is deterministic, symmetric, and pure.

use std::fmt;

use crate::models::Citation;

/// Field separator used in the serialized form.
///
/// ASCII unit separator: a control character that cannot appear in
/// citation text. Fields containing it are rejected before any
/// distance computation runs.
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// A malformed input sequence or citation field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputError(pub String);

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid input: {}", self.0)
    }
}

impl std::error::Error for InputError {}

/// Serializes the comparable fields of a citation into one string.
pub fn fingerprint<C: Citation>(citation: &C) -> Result<String, InputError> {
    let fields = [
        citation.preceding(),
        citation.keyword(),
        citation.following(),
        citation.location(),
    ];

    for field in fields {
        if field.contains(FIELD_SEPARATOR) {
            return Err(InputError(format!(
                "citation field contains the reserved separator character: {:?}",
                field
            )));
        }
    }

    let mut out = String::with_capacity(
        fields.iter().map(|f| f.len() + 1).sum::<usize>() + 20,
    );
    for field in fields {
        out.push_str(field);
        out.push(FIELD_SEPARATOR);
    }
    out.push_str(&citation.number().to_string());
    Ok(out)
}

/// Returns the Levenshtein distance between two citations.
pub fn distance<A: Citation, B: Citation>(a: &A, b: &B) -> Result<u32, InputError> {
    Ok(levenshtein(&fingerprint(a)?, &fingerprint(b)?))
}

/// Character-level Levenshtein distance with unit insert, delete, and
/// substitute costs. Two-row dynamic program; O(len(a) * len(b)) time,
/// O(len(b)) space.
pub fn levenshtein(a: &str, b: &str) -> u32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len() as u32;
    }
    if b.is_empty() {
        return a.len() as u32;
    }

    let mut prev: Vec<u32> = (0..=b.len() as u32).collect();
    let mut curr: Vec<u32> = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i as u32 + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + u32::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
