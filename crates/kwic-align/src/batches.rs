//! Batch listing: `kwic batches`.

use anyhow::Result;
use chrono::Utc;

use kwic_align_core::models::LockState;
use kwic_align_core::store::ContextStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

pub async fn run_batches(config: &Config, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let summaries = store.list_batches().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No inbound batches.");
        return Ok(());
    }

    let policy = config.review_policy();
    let now = Utc::now();
    for summary in &summaries {
        let lock = match &summary.lock {
            LockState::Unlocked => "unlocked".to_string(),
            LockState::Locked { owner, since } => {
                if summary.lock.is_stale(now, policy.stale_after) {
                    format!("locked by {} since {} (stale)", owner, since.to_rfc3339())
                } else {
                    format!("locked by {} since {}", owner, since.to_rfc3339())
                }
            }
        };
        println!(
            "{}  {} contexts  imported {} by {}  [{}]",
            summary.id,
            summary.context_count,
            summary.timestamp.to_rfc3339(),
            summary.user,
            lock
        );
    }

    Ok(())
}
