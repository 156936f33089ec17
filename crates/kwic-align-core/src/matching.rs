//! Candidate generation and monotonic matching between two ordered
//! citation sequences.
//!
//! # Algorithm
//!
//! 1. Compute the full cross-product distance between the two
//!    sequences, bucketing candidate pairings by distance value.
//! 2. Walk the buckets in ascending distance order; within a bucket,
//!    walk candidates in generation order.
//! 3. Accept a candidate iff it does not intersect any already
//!    accepted pairing: accepted pairings never share a left index,
//!    never share a right index, and never cross.
//!
//! The cross product is O(n·m) distance computations by design —
//! batches are reviewer-sized, so quadratic cost is acceptable and
//! simplicity wins over nearest-neighbor tricks. The greedy selection
//! yields a low-total-cost, crossing-free partial matching; ties at
//! the same distance are broken by enumeration order, not a secondary
//! key.

use std::collections::BTreeMap;

use crate::distance::{distance, InputError};
use crate::models::Citation;

/// A candidate pairing between one citation from each sequence,
/// annotated with its distance and both sequence positions.
///
/// The indices are positions within the two input sequences and are
/// used only to test positional crossing.
#[derive(Debug)]
pub struct Triple<'a, L, R> {
    pub left: &'a L,
    pub left_index: usize,
    pub distance: u32,
    pub right: &'a R,
    pub right_index: usize,
}

impl<L, R> Clone for Triple<'_, L, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L, R> Copy for Triple<'_, L, R> {}

/// Candidate pairings bucketed by distance.
///
/// The `BTreeMap` keeps the key set in ascending distance order; each
/// bucket preserves generation order.
pub type CandidateMap<'a, L, R> = BTreeMap<u32, Vec<Triple<'a, L, R>>>;

/// Computes distances for every pair of citations across the two
/// sequences.
pub fn build_candidates<'a, L, R>(
    left: &'a [L],
    right: &'a [R],
) -> Result<CandidateMap<'a, L, R>, InputError>
where
    L: Citation,
    R: Citation,
{
    let mut candidates: CandidateMap<'a, L, R> = BTreeMap::new();

    for (i, l) in left.iter().enumerate() {
        for (j, r) in right.iter().enumerate() {
            let d = distance(l, r)?;
            candidates.entry(d).or_default().push(Triple {
                left: l,
                left_index: i,
                distance: d,
                right: r,
                right_index: j,
            });
        }
    }

    Ok(candidates)
}

/// True if the two pairings share an index or cross.
fn intersects<L, R>(a: &Triple<'_, L, R>, b: &Triple<'_, L, R>) -> bool {
    a.left_index == b.left_index
        || a.right_index == b.right_index
        || (a.left_index < b.left_index && a.right_index > b.right_index)
        || (a.left_index > b.left_index && a.right_index < b.right_index)
}

/// Greedily selects a maximal set of mutually non-intersecting
/// pairings in ascending distance order.
///
/// First-accepted wins on equal-distance ties. Re-running the
/// selection on candidates already reduced to one pairing per index
/// returns that same matching.
pub fn select_matching<'a, L, R>(candidates: &CandidateMap<'a, L, R>) -> Vec<Triple<'a, L, R>> {
    let mut accepted: Vec<Triple<'a, L, R>> = Vec::new();

    for bucket in candidates.values() {
        for candidate in bucket {
            if accepted.iter().all(|t| !intersects(t, candidate)) {
                accepted.push(*candidate);
            }
        }
    }

    accepted
}

/// Orders a matching by the source position of its left citation, for
/// presentation to the reviewer.
pub fn sort_by_source_order<L: Citation, R>(matching: &mut [Triple<'_, L, R>]) {
    matching.sort_by_key(|t| t.left.number());
}
