//! Group creation over committed contexts: `kwic group`.
//!
//! A reviewer bundles adjacent citations at one location into a group
//! context whose derived fields (joined keyword, flanking text) are
//! recomputed whenever a member is confirmed against later imports.

use anyhow::{anyhow, Result};

use kwic_align_core::store::ContextStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// `kwic group <location> <number>...`: bundle the committed citations
/// with the given numbers at one location into a group context, in the
/// order given.
pub async fn run_group(config: &Config, location: &str, numbers: &[i64]) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let at_location = store.committed_by_location(location).await?;
    let mut member_ids = Vec::with_capacity(numbers.len());
    for number in numbers {
        let member = at_location
            .iter()
            .find(|c| c.number == *number)
            .ok_or_else(|| anyhow!("no committed context {}:{}", location, number))?;
        member_ids.push(member.id.clone());
    }

    let group = store.create_group(&member_ids).await?;
    println!(
        "Grouped {} contexts at {} as {:?}.",
        group.member_ids.len(),
        location,
        group.keyword
    );

    Ok(())
}
