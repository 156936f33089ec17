//! In-memory [`ContextStore`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread
//! safety. Versioning mimics the conditional-write behavior of the
//! SQLite backend: every persisted mutation bumps the batch version,
//! and lock writes fail with [`StoreError::Conflict`] when the
//! expected version is out of date.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::group::{assemble_group, recompute_group, GroupUpdate};
use crate::models::{BatchSummary, Context, GroupRole, InboundContextGroup, LockState};

use super::{CommitSummary, ContextStore, Disposition, StoreError};

/// In-memory store for unit tests and examples.
#[derive(Default)]
pub struct MemoryStore {
    batches: RwLock<HashMap<String, InboundContextGroup>>,
    committed: RwLock<Vec<Context>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a committed context, as if curated earlier.
    pub fn seed_committed(&self, context: Context) {
        self.committed.write().unwrap().push(context);
    }

    /// Snapshot of all committed contexts, for assertions.
    pub fn committed_snapshot(&self) -> Vec<Context> {
        self.committed.read().unwrap().clone()
    }
}

fn apply_confirm(
    committed: &mut Vec<Context>,
    inbound: &crate::models::InboundContext,
    context_id: &str,
) -> Result<(), StoreError> {
    let idx = committed
        .iter()
        .position(|c| c.id == context_id)
        .ok_or_else(|| StoreError::Backend(format!("unknown context {}", context_id)))?;

    {
        let target = &mut committed[idx];
        target.location = inbound.location.clone();
        target.number = inbound.number;
        target.preceding = inbound.preceding.clone();
        target.keyword = inbound.keyword.clone();
        target.following = inbound.following.clone();
        target.kind = inbound.kind;
    }

    // A confirmed member changes its owning group's derived fields.
    if committed[idx].group_role == GroupRole::Member {
        let member_id = committed[idx].id.clone();
        let group_idx = committed
            .iter()
            .position(|c| c.group_role == GroupRole::Group && c.member_ids.contains(&member_id));
        if let Some(group_idx) = group_idx {
            let member_ids = committed[group_idx].member_ids.clone();
            let members: Vec<Context> = member_ids
                .iter()
                .filter_map(|id| committed.iter().find(|c| &c.id == id).cloned())
                .collect();
            let mut group = committed[group_idx].clone();
            if recompute_group(&mut group, &members) == GroupUpdate::Updated {
                committed[group_idx] = group;
            }
        }
    }

    Ok(())
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn insert_batch(&self, batch: &InboundContextGroup) -> Result<(), StoreError> {
        let mut batches = self.batches.write().unwrap();
        batches.insert(batch.id.clone(), batch.clone());
        Ok(())
    }

    async fn load_batch(&self, id: &str) -> Result<Option<InboundContextGroup>, StoreError> {
        let batches = self.batches.read().unwrap();
        Ok(batches.get(id).cloned())
    }

    async fn list_batches(&self) -> Result<Vec<BatchSummary>, StoreError> {
        let batches = self.batches.read().unwrap();
        let mut summaries: Vec<BatchSummary> = batches
            .values()
            .map(|b| BatchSummary {
                id: b.id.clone(),
                timestamp: b.timestamp,
                user: b.user.clone(),
                lock: b.lock.clone(),
                context_count: b.contexts.len(),
            })
            .collect();
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    async fn committed_by_location(&self, location: &str) -> Result<Vec<Context>, StoreError> {
        let committed = self.committed.read().unwrap();
        let mut matches: Vec<Context> = committed
            .iter()
            .filter(|c| c.location == location && c.group_role != GroupRole::Group)
            .cloned()
            .collect();
        matches.sort_by_key(|c| c.number);
        Ok(matches)
    }

    async fn committed_by_keyword(&self, keyword: &str) -> Result<Vec<Context>, StoreError> {
        let committed = self.committed.read().unwrap();
        let mut matches: Vec<Context> = committed
            .iter()
            .filter(|c| c.keyword == keyword)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.location.cmp(&b.location).then(a.number.cmp(&b.number)));
        Ok(matches)
    }

    async fn create_group(&self, member_ids: &[String]) -> Result<Context, StoreError> {
        let mut committed = self.committed.write().unwrap();

        let mut members = Vec::with_capacity(member_ids.len());
        for id in member_ids {
            let member = committed
                .iter_mut()
                .find(|c| &c.id == id)
                .ok_or_else(|| StoreError::Backend(format!("unknown context {}", id)))?;
            member.group_role = GroupRole::Member;
            members.push(member.clone());
        }

        let group = assemble_group(&members)
            .ok_or_else(|| StoreError::Backend("a group needs at least one member".to_string()))?;
        committed.push(group.clone());
        Ok(group)
    }

    async fn write_lock(
        &self,
        batch_id: &str,
        lock: &LockState,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let mut batches = self.batches.write().unwrap();
        let batch = batches
            .get_mut(batch_id)
            .ok_or_else(|| StoreError::Backend(format!("unknown batch {}", batch_id)))?;

        if batch.version != expected_version {
            return Err(StoreError::Conflict);
        }

        batch.lock = lock.clone();
        batch.version += 1;
        Ok(())
    }

    async fn commit_matching(
        &self,
        batch_id: &str,
        decisions: &[Disposition],
        expected_version: i64,
    ) -> Result<CommitSummary, StoreError> {
        let mut batches = self.batches.write().unwrap();
        let mut committed = self.committed.write().unwrap();

        let batch = batches
            .get_mut(batch_id)
            .ok_or_else(|| StoreError::Backend(format!("unknown batch {}", batch_id)))?;

        if batch.version != expected_version {
            return Err(StoreError::Conflict);
        }

        let mut summary = CommitSummary::default();

        for decision in decisions {
            let inbound = batch
                .contexts
                .iter()
                .find(|c| c.id == decision.inbound_id())
                .ok_or_else(|| {
                    StoreError::Backend(format!(
                        "unknown inbound context {}",
                        decision.inbound_id()
                    ))
                })?
                .clone();

            match decision {
                Disposition::Confirm { context_id, .. } => {
                    apply_confirm(&mut committed, &inbound, context_id)?;
                    summary.confirmed += 1;
                }
                Disposition::CreateNew { .. } => {
                    committed.push(Context::from_inbound(&inbound));
                    summary.created += 1;
                }
                Disposition::Discard { .. } => {
                    summary.discarded += 1;
                }
            }
        }

        let consumed: Vec<&str> = decisions.iter().map(|d| d.inbound_id()).collect();
        batch.contexts.retain(|c| !consumed.contains(&c.id.as_str()));

        if batch.contexts.is_empty() {
            batches.remove(batch_id);
            summary.batch_deleted = true;
        } else {
            batch.version += 1;
        }

        Ok(summary)
    }

    async fn delete_batch(&self, id: &str) -> Result<(), StoreError> {
        let mut batches = self.batches.write().unwrap();
        batches.remove(id);
        Ok(())
    }
}
