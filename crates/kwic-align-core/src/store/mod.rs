//! Storage abstraction for kwic-align.
//!
//! The [`ContextStore`] trait defines all persistence operations the
//! review workflow needs, enabling pluggable backends (SQLite,
//! in-memory). Every call is transactional on the backend side and
//! reports concurrency conflicts distinctly from other failures, so
//! the review layer can translate them without inspecting backend
//! detail.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{BatchSummary, Context, InboundContextGroup, LockState};

/// Persistence failure, split by whether it was a concurrency conflict.
#[derive(Debug)]
pub enum StoreError {
    /// The record's concurrency token did not match the expected value,
    /// or the record changed underneath a transactional write.
    Conflict,
    /// Any other backend failure.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Conflict => write!(f, "concurrent modification detected"),
            StoreError::Backend(msg) => write!(f, "store failure: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Reviewer decision for a single inbound context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum Disposition {
    /// The pairing was confirmed: the inbound citation updates the
    /// matched committed context (and, if that context is a group
    /// member, the owning group's derived fields).
    Confirm {
        inbound_id: String,
        context_id: String,
    },
    /// Unmatched inbound citation promoted to a new committed context.
    CreateNew { inbound_id: String },
    /// Unmatched inbound citation dropped without a trace.
    Discard { inbound_id: String },
}

impl Disposition {
    pub fn inbound_id(&self) -> &str {
        match self {
            Disposition::Confirm { inbound_id, .. }
            | Disposition::CreateNew { inbound_id }
            | Disposition::Discard { inbound_id } => inbound_id,
        }
    }
}

/// Outcome counts of a committed matching.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitSummary {
    /// Confirmed pairings applied onto committed contexts.
    pub confirmed: usize,
    /// New committed contexts created from unmatched inbound items.
    pub created: usize,
    /// Inbound items discarded.
    pub discarded: usize,
    /// True when the commit emptied the batch and deleted it.
    pub batch_deleted: bool,
}

/// Abstract storage backend for the review workflow.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_batch`](ContextStore::insert_batch) | Persist a freshly imported batch |
/// | [`load_batch`](ContextStore::load_batch) | Load a batch with its ordered members |
/// | [`list_batches`](ContextStore::list_batches) | List batches with lock state |
/// | [`committed_by_location`](ContextStore::committed_by_location) | Committed contexts for a location, ordered by number |
/// | [`committed_by_keyword`](ContextStore::committed_by_keyword) | Committed contexts for a keyword |
/// | [`create_group`](ContextStore::create_group) | Bundle committed contexts into a group |
/// | [`write_lock`](ContextStore::write_lock) | Conditionally write a batch's lock state |
/// | [`commit_matching`](ContextStore::commit_matching) | Apply reviewer decisions transactionally |
/// | [`delete_batch`](ContextStore::delete_batch) | Cascade-delete a batch |
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Persists a freshly imported batch and its member contexts.
    async fn insert_batch(&self, batch: &InboundContextGroup) -> Result<(), StoreError>;

    /// Loads a batch with its ordered member contexts.
    async fn load_batch(&self, id: &str) -> Result<Option<InboundContextGroup>, StoreError>;

    /// Lists all batches, newest first.
    async fn list_batches(&self) -> Result<Vec<BatchSummary>, StoreError>;

    /// Committed contexts sharing a location, ordered by number.
    async fn committed_by_location(&self, location: &str) -> Result<Vec<Context>, StoreError>;

    /// Committed contexts sharing a keyword, ordered by location and number.
    async fn committed_by_keyword(&self, keyword: &str) -> Result<Vec<Context>, StoreError>;

    /// Bundles the given committed contexts, in order, into a new
    /// group context and persists it along with the membership.
    ///
    /// The members are re-tagged as group members and the group's
    /// derived fields are computed from them. Fails with
    /// [`StoreError::Backend`] on an unknown member id or an empty
    /// member list.
    async fn create_group(&self, member_ids: &[String]) -> Result<Context, StoreError>;

    /// Writes a batch's lock state as a single conditional write
    /// guarded by the batch's version token.
    ///
    /// Returns [`StoreError::Conflict`] when `expected_version` no
    /// longer matches the persisted record.
    async fn write_lock(
        &self,
        batch_id: &str,
        lock: &LockState,
        expected_version: i64,
    ) -> Result<(), StoreError>;

    /// Applies reviewer decisions in one transaction: confirmed
    /// pairings update their committed contexts, create-new decisions
    /// promote inbound citations, discards drop them. Consumed inbound
    /// rows are deleted; an emptied batch is deleted with them.
    ///
    /// Guarded by the batch's version token like
    /// [`write_lock`](ContextStore::write_lock).
    async fn commit_matching(
        &self,
        batch_id: &str,
        decisions: &[Disposition],
        expected_version: i64,
    ) -> Result<CommitSummary, StoreError>;

    /// Deletes a batch and all of its member contexts.
    async fn delete_batch(&self, id: &str) -> Result<(), StoreError>;
}
