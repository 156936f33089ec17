//! Review workflow commands: `kwic review`, `kwic commit`,
//! `kwic release`, and `kwic discard`.
//!
//! `review` acquires the batch lock and prints the proposed matching;
//! `commit` re-acquires (re-entrant for the same user), rebuilds the
//! same matching, and applies it. The matching is deterministic, so
//! rebuilding at commit time yields exactly what the reviewer saw, as
//! long as the lock was held in between.

use anyhow::{anyhow, Result};
use chrono::Utc;

use kwic_align_core::models::{Context, InboundContextGroup};
use kwic_align_core::review::{Reconciliation, ReviewManager};
use kwic_align_core::store::{CommitSummary, ContextStore, Disposition};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

async fn manager(config: &Config) -> Result<ReviewManager<SqliteStore>> {
    let pool = db::connect(config).await?;
    Ok(ReviewManager::with_policy(
        SqliteStore::new(pool),
        config.review_policy(),
    ))
}

async fn load_batch_with_committed(
    mgr: &ReviewManager<SqliteStore>,
    batch_id: &str,
) -> Result<(InboundContextGroup, Vec<Context>)> {
    let batch = mgr
        .store()
        .load_batch(batch_id)
        .await?
        .ok_or_else(|| anyhow!("unknown batch {}", batch_id))?;
    let committed = mgr.committed_counterparts(&batch).await?;
    Ok((batch, committed))
}

fn print_reconciliation(reconciliation: &Reconciliation<'_>) {
    if reconciliation.matching.is_empty() {
        println!("No pairings proposed.");
    } else {
        println!("Proposed pairings:");
        for (triple, identical) in reconciliation
            .matching
            .iter()
            .zip(&reconciliation.classification.identical_keywords)
        {
            let marker = if *identical { "=" } else { "~" };
            println!(
                "  {}:{:<4} {:24} {} {:24} (distance {})",
                triple.left.location,
                triple.left.number,
                triple.left.keyword,
                marker,
                triple.right.keyword,
                triple.distance
            );
        }
        if reconciliation.classification.uniform_distance {
            println!("All pairings share one distance.");
        }
    }

    if !reconciliation.unmatched.is_empty() {
        println!("Unmatched inbound contexts:");
        for context in &reconciliation.unmatched {
            println!(
                "  {}:{:<4} {}",
                context.location, context.number, context.keyword
            );
        }
    }
}

fn print_summary(summary: &CommitSummary) {
    println!(
        "Committed: {} confirmed, {} created, {} discarded.",
        summary.confirmed, summary.created, summary.discarded
    );
    if summary.batch_deleted {
        println!("Batch fully reviewed and removed.");
    }
}

/// `kwic review <batch>`: lock the batch and show the proposed matching.
///
/// The lock stays held so the reviewer can follow up with `commit`;
/// `release` gives it up without committing.
pub async fn run_review(config: &Config, batch_id: &str, user: &str) -> Result<()> {
    let mgr = manager(config).await?;
    mgr.acquire_lock(batch_id, user, Utc::now()).await?;

    let (batch, committed) = load_batch_with_committed(&mgr, batch_id).await?;
    let reconciliation = mgr.reconcile(&batch.contexts, &committed)?;

    print_reconciliation(&reconciliation);
    println!(
        "Lock held by {}. Run `kwic commit {}` to apply.",
        user, batch_id
    );

    Ok(())
}

/// `kwic commit <batch>`: rebuild the matching and apply it.
///
/// Matched pairings are confirmed; unmatched inbound contexts are
/// promoted to new committed contexts, or dropped when
/// `discard_unmatched` is set.
pub async fn run_commit(
    config: &Config,
    batch_id: &str,
    user: &str,
    discard_unmatched: bool,
) -> Result<()> {
    let mgr = manager(config).await?;
    mgr.acquire_lock(batch_id, user, Utc::now()).await?;

    let (batch, committed) = load_batch_with_committed(&mgr, batch_id).await?;
    let reconciliation = mgr.reconcile(&batch.contexts, &committed)?;

    let mut decisions: Vec<Disposition> = reconciliation
        .matching
        .iter()
        .map(|triple| Disposition::Confirm {
            inbound_id: triple.left.id.clone(),
            context_id: triple.right.id.clone(),
        })
        .collect();
    for context in &reconciliation.unmatched {
        decisions.push(if discard_unmatched {
            Disposition::Discard {
                inbound_id: context.id.clone(),
            }
        } else {
            Disposition::CreateNew {
                inbound_id: context.id.clone(),
            }
        });
    }

    let summary = mgr.commit(batch_id, user, &decisions).await?;
    print_summary(&summary);

    Ok(())
}

/// `kwic release <batch>`: give up the review lock without committing.
pub async fn run_release(config: &Config, batch_id: &str, user: &str) -> Result<()> {
    let mgr = manager(config).await?;
    mgr.release_lock(batch_id, user, Utc::now()).await?;
    println!("Released lock on batch {}.", batch_id);
    Ok(())
}

/// `kwic discard <batch>`: delete a batch and its contexts outright.
pub async fn run_discard(config: &Config, batch_id: &str) -> Result<()> {
    let mgr = manager(config).await?;
    mgr.discard_batch(batch_id).await?;
    println!("Discarded batch {}.", batch_id);
    Ok(())
}
