//! Review session management for inbound batches.
//!
//! The [`ReviewManager`] governs exclusive access to a batch during an
//! interactive review: it acquires and releases the review lock,
//! detects and reclaims stale locks, runs the reconciliation against
//! the committed contexts, and commits reviewer decisions through the
//! [`ContextStore`].
//!
//! # Lock state machine
//!
//! ```text
//! Unlocked ──acquire──────────▶ Locked(reviewer, now)
//! Locked(R, t) ──acquire by R─▶ Locked(R, now)        (re-entrant refresh)
//! Locked(R, t) ──acquire by S─▶ LockConflict          (while fresh)
//! Locked(R, t) ──acquire by S─▶ Locked(S, now)        (once stale)
//! Locked(R, t) ──release──────▶ Unlocked
//! ```
//!
//! Every lock transition is a single conditional write guarded by the
//! batch's version token; a version conflict is reported as lock
//! contention and never retried, because retrying could award the lock
//! to the wrong reviewer.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::classify::classify;
use crate::classify::MatchClassification;
use crate::distance::InputError;
use crate::matching::{build_candidates, select_matching, sort_by_source_order, Triple};
use crate::models::{Context, InboundContext, InboundContextGroup, LockState};
use crate::store::{CommitSummary, ContextStore, Disposition, StoreError};

/// Tunable review behavior.
#[derive(Debug, Clone)]
pub struct ReviewPolicy {
    /// Age after which a held lock may be silently reclaimed by
    /// another reviewer.
    pub stale_after: Duration,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::minutes(5),
        }
    }
}

/// Failures surfaced by the review workflow.
///
/// The algorithmic layers raise only [`ReviewError::Input`]; the
/// manager is the sole source of the two conflict kinds and never
/// leaks backend-specific detail through them.
#[derive(Debug)]
pub enum ReviewError {
    /// Malformed input: unknown batch, empty inbound sequence, or a
    /// citation field the similarity metric cannot serialize.
    Input(String),
    /// The batch is locked by another reviewer, or a lock write lost a
    /// version race.
    LockConflict { holder: Option<String> },
    /// The persistence layer detected a concurrent modification during
    /// commit, or otherwise failed to apply the decisions.
    CommitConflict(String),
}

impl fmt::Display for ReviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewError::Input(msg) => write!(f, "invalid input: {}", msg),
            ReviewError::LockConflict {
                holder: Some(holder),
            } => {
                write!(f, "batch is currently being reviewed by {}", holder)
            }
            ReviewError::LockConflict { holder: None } => {
                write!(f, "lock contention: batch was modified concurrently")
            }
            ReviewError::CommitConflict(msg) => write!(f, "commit failed: {}", msg),
        }
    }
}

impl std::error::Error for ReviewError {}

impl From<InputError> for ReviewError {
    fn from(err: InputError) -> Self {
        ReviewError::Input(err.0)
    }
}

/// Result of aligning a batch against its committed counterparts.
#[derive(Debug)]
pub struct Reconciliation<'a> {
    /// Accepted pairings, ordered by the inbound citation's source
    /// position.
    pub matching: Vec<Triple<'a, InboundContext, Context>>,
    /// Safety checks over the matching.
    pub classification: MatchClassification,
    /// Inbound citations with no accepted pairing, surfaced for manual
    /// disposition.
    pub unmatched: Vec<&'a InboundContext>,
}

/// Orchestrates one reviewer's session over an inbound batch.
pub struct ReviewManager<S> {
    store: S,
    policy: ReviewPolicy,
}

impl<S: ContextStore> ReviewManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, ReviewPolicy::default())
    }

    pub fn with_policy(store: S, policy: ReviewPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// True once `lock` has been held longer than the policy's
    /// staleness window.
    pub fn is_stale(&self, lock: &LockState, now: DateTime<Utc>) -> bool {
        lock.is_stale(now, self.policy.stale_after)
    }

    async fn load_required(&self, batch_id: &str) -> Result<InboundContextGroup, ReviewError> {
        match self.store.load_batch(batch_id).await {
            Ok(Some(batch)) => Ok(batch),
            Ok(None) => Err(ReviewError::Input(format!("unknown batch {}", batch_id))),
            Err(err) => Err(ReviewError::CommitConflict(err.to_string())),
        }
    }

    fn map_lock_write(err: StoreError) -> ReviewError {
        match err {
            StoreError::Conflict => ReviewError::LockConflict { holder: None },
            StoreError::Backend(msg) => ReviewError::CommitConflict(msg),
        }
    }

    /// Opens a batch for review.
    ///
    /// Succeeds when the batch is unlocked, already held by `user`
    /// (refreshing the lock timestamp), or held by someone else whose
    /// lock has gone stale — reclaiming a stale lock discards the
    /// previous reviewer's unsaved decisions, which live only in their
    /// session.
    pub async fn acquire_lock(
        &self,
        batch_id: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReviewError> {
        let batch = self.load_required(batch_id).await?;

        match &batch.lock {
            LockState::Locked { owner, .. }
                if owner.as_str() != user && !self.is_stale(&batch.lock, now) =>
            {
                return Err(ReviewError::LockConflict {
                    holder: Some(owner.clone()),
                });
            }
            _ => {}
        }

        let lock = LockState::Locked {
            owner: user.to_string(),
            since: now,
        };
        self.store
            .write_lock(batch_id, &lock, batch.version)
            .await
            .map_err(Self::map_lock_write)
    }

    /// Refreshes the lock timestamp for the reviewer already holding
    /// the batch.
    pub async fn refresh_lock(
        &self,
        batch_id: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReviewError> {
        let batch = self.load_required(batch_id).await?;

        match &batch.lock {
            LockState::Locked { owner, .. } if owner.as_str() == user => {
                let lock = LockState::Locked {
                    owner: user.to_string(),
                    since: now,
                };
                self.store
                    .write_lock(batch_id, &lock, batch.version)
                    .await
                    .map_err(Self::map_lock_write)
            }
            lock => Err(ReviewError::LockConflict {
                holder: lock.holder().map(str::to_string),
            }),
        }
    }

    /// Releases a held lock.
    ///
    /// Allowed for the holder, for anyone once the lock is stale, and
    /// trivially for an already-unlocked batch.
    pub async fn release_lock(
        &self,
        batch_id: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReviewError> {
        let batch = self.load_required(batch_id).await?;

        match &batch.lock {
            LockState::Unlocked => Ok(()),
            LockState::Locked { owner, .. }
                if owner.as_str() == user || self.is_stale(&batch.lock, now) =>
            {
                self.store
                    .write_lock(batch_id, &LockState::Unlocked, batch.version)
                    .await
                    .map_err(Self::map_lock_write)
            }
            LockState::Locked { owner, .. } => Err(ReviewError::LockConflict {
                holder: Some(owner.clone()),
            }),
        }
    }

    /// Loads the committed contexts the batch should be aligned
    /// against: every context sharing a location with a batch member,
    /// in batch member order.
    pub async fn committed_counterparts(
        &self,
        batch: &InboundContextGroup,
    ) -> Result<Vec<Context>, ReviewError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut committed = Vec::new();

        for inbound in &batch.contexts {
            if seen.insert(inbound.location.as_str()) {
                let mut chunk = self
                    .store
                    .committed_by_location(&inbound.location)
                    .await
                    .map_err(|e| ReviewError::CommitConflict(e.to_string()))?;
                committed.append(&mut chunk);
            }
        }

        Ok(committed)
    }

    /// Aligns an inbound sequence against a committed sequence.
    ///
    /// Pure apart from the borrowed inputs; must only be called for a
    /// batch whose lock the caller holds.
    pub fn reconcile<'a>(
        &self,
        inbound: &'a [InboundContext],
        committed: &'a [Context],
    ) -> Result<Reconciliation<'a>, ReviewError> {
        if inbound.is_empty() {
            return Err(ReviewError::Input(
                "empty inbound context sequence".to_string(),
            ));
        }

        let candidates = build_candidates(inbound, committed)?;
        let mut matching = select_matching(&candidates);
        sort_by_source_order(&mut matching);

        let matched: HashSet<usize> = matching.iter().map(|t| t.left_index).collect();
        let unmatched: Vec<&'a InboundContext> = inbound
            .iter()
            .enumerate()
            .filter(|(i, _)| !matched.contains(i))
            .map(|(_, c)| c)
            .collect();

        Ok(Reconciliation {
            classification: classify(&matching),
            matching,
            unmatched,
        })
    }

    /// Commits reviewer decisions for a batch whose lock `user` holds.
    ///
    /// The write is guarded by the batch's version token; a conflict is
    /// surfaced, never retried, because a retry could re-apply the
    /// matching against data that changed underneath it. A commit that
    /// empties the batch deletes it, which is the terminal event of the
    /// session.
    pub async fn commit(
        &self,
        batch_id: &str,
        user: &str,
        decisions: &[Disposition],
    ) -> Result<CommitSummary, ReviewError> {
        let batch = self.load_required(batch_id).await?;

        match &batch.lock {
            LockState::Locked { owner, .. } if owner.as_str() == user => {}
            lock => {
                return Err(ReviewError::LockConflict {
                    holder: lock.holder().map(str::to_string),
                })
            }
        }

        self.store
            .commit_matching(batch_id, decisions, batch.version)
            .await
            .map_err(|err| match err {
                StoreError::Conflict => ReviewError::CommitConflict(
                    "batch changed while the review was in progress".to_string(),
                ),
                StoreError::Backend(msg) => ReviewError::CommitConflict(msg),
            })
    }

    /// Drops a batch and its members without committing anything.
    pub async fn discard_batch(&self, batch_id: &str) -> Result<(), ReviewError> {
        self.store
            .delete_batch(batch_id)
            .await
            .map_err(|e| ReviewError::CommitConflict(e.to_string()))
    }
}
