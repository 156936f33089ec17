//! Committed-context lookup: `kwic get`.

use anyhow::Result;

use kwic_align_core::store::ContextStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// `kwic get <keyword>`: print committed contexts for a keyword.
pub async fn run_get(config: &Config, keyword: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let contexts = store.committed_by_keyword(keyword).await?;

    if contexts.is_empty() {
        println!("No committed contexts for keyword {:?}.", keyword);
        return Ok(());
    }

    for context in &contexts {
        println!(
            "{}:{:<4} {} [{}] {}",
            context.location, context.number, context.preceding, context.keyword, context.following
        );
    }
    println!("{} context(s).", contexts.len());

    Ok(())
}
