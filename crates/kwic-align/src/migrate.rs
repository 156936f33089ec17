use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Committed citation inventory
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS context (
            id TEXT PRIMARY KEY,
            location TEXT NOT NULL,
            number INTEGER NOT NULL,
            preceding TEXT NOT NULL,
            keyword TEXT NOT NULL,
            following TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'none',
            group_role TEXT NOT NULL DEFAULT 'none',
            lemma TEXT,
            lemma_string TEXT,
            pos TEXT,
            pos_string TEXT,
            sense TEXT,
            interesting INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Group membership as an explicit ordered id list
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS context_group_member (
            group_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (group_id, position),
            FOREIGN KEY (group_id) REFERENCES context(id),
            FOREIGN KEY (member_id) REFERENCES context(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Inbound batches; lock_user/lock_timestamp are both NULL or both set
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inbound_context_group (
            id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            user TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            lock_user TEXT,
            lock_timestamp TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inbound_context (
            id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            location TEXT NOT NULL,
            number INTEGER NOT NULL,
            preceding TEXT NOT NULL,
            keyword TEXT NOT NULL,
            following TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'none',
            FOREIGN KEY (batch_id) REFERENCES inbound_context_group(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_context_location ON context(location)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_context_keyword ON context(keyword)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_group_member_member ON context_group_member(member_id)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_inbound_batch ON inbound_context(batch_id)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
