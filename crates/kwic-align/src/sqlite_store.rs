//! SQLite-backed [`ContextStore`] implementation.
//!
//! Maps each [`ContextStore`] operation to SQL against the schema
//! created by [`crate::migrate`]. Lock writes and commits are guarded
//! by the batch's `version` column: every mutating statement carries a
//! `WHERE version = ?` clause, and zero affected rows is reported as
//! [`StoreError::Conflict`].
//!
//! Timestamps are stored as RFC 3339 text so the schema stays readable
//! with plain `sqlite3`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use kwic_align_core::group::{assemble_group, recompute_group, GroupUpdate};
use kwic_align_core::models::{
    BatchSummary, Context, ContextKind, GroupRole, InboundContext, InboundContextGroup, LockState,
};
use kwic_align_core::store::{CommitSummary, ContextStore, Disposition, StoreError};

/// SQLite implementation of the [`ContextStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp {}: {}", raw, e)))
}

fn lock_from_row(row: &SqliteRow) -> Result<LockState, StoreError> {
    let lock_user: Option<String> = row.try_get("lock_user").map_err(backend)?;
    let lock_timestamp: Option<String> = row.try_get("lock_timestamp").map_err(backend)?;

    match (lock_user, lock_timestamp) {
        (Some(owner), Some(since)) => Ok(LockState::Locked {
            owner,
            since: parse_ts(&since)?,
        }),
        _ => Ok(LockState::Unlocked),
    }
}

fn context_from_row(row: &SqliteRow) -> Result<Context, StoreError> {
    let kind: String = row.try_get("kind").map_err(backend)?;
    let group_role: String = row.try_get("group_role").map_err(backend)?;
    let interesting: i64 = row.try_get("interesting").map_err(backend)?;

    Ok(Context {
        id: row.try_get("id").map_err(backend)?,
        location: row.try_get("location").map_err(backend)?,
        number: row.try_get("number").map_err(backend)?,
        preceding: row.try_get("preceding").map_err(backend)?,
        keyword: row.try_get("keyword").map_err(backend)?,
        following: row.try_get("following").map_err(backend)?,
        kind: ContextKind::parse(&kind),
        group_role: GroupRole::parse(&group_role),
        member_ids: Vec::new(),
        lemma: row.try_get("lemma").map_err(backend)?,
        lemma_string: row.try_get("lemma_string").map_err(backend)?,
        pos: row.try_get("pos").map_err(backend)?,
        pos_string: row.try_get("pos_string").map_err(backend)?,
        sense: row.try_get("sense").map_err(backend)?,
        interesting: interesting != 0,
    })
}

fn inbound_from_row(row: &SqliteRow) -> Result<InboundContext, StoreError> {
    let kind: String = row.try_get("kind").map_err(backend)?;

    Ok(InboundContext {
        id: row.try_get("id").map_err(backend)?,
        batch_id: row.try_get("batch_id").map_err(backend)?,
        location: row.try_get("location").map_err(backend)?,
        number: row.try_get("number").map_err(backend)?,
        preceding: row.try_get("preceding").map_err(backend)?,
        keyword: row.try_get("keyword").map_err(backend)?,
        following: row.try_get("following").map_err(backend)?,
        kind: ContextKind::parse(&kind),
    })
}

async fn insert_context(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    context: &Context,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO context (id, location, number, preceding, keyword, following,
                             kind, group_role, lemma, lemma_string, pos, pos_string,
                             sense, interesting)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&context.id)
    .bind(&context.location)
    .bind(context.number)
    .bind(&context.preceding)
    .bind(&context.keyword)
    .bind(&context.following)
    .bind(context.kind.as_str())
    .bind(context.group_role.as_str())
    .bind(&context.lemma)
    .bind(&context.lemma_string)
    .bind(&context.pos)
    .bind(&context.pos_string)
    .bind(&context.sense)
    .bind(context.interesting as i64)
    .execute(&mut **tx)
    .await
    .map_err(backend)?;

    Ok(())
}

async fn update_context_fields(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    context: &Context,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE context
        SET location = ?, number = ?, preceding = ?, keyword = ?, following = ?, kind = ?
        WHERE id = ?
        "#,
    )
    .bind(&context.location)
    .bind(context.number)
    .bind(&context.preceding)
    .bind(&context.keyword)
    .bind(&context.following)
    .bind(context.kind.as_str())
    .bind(&context.id)
    .execute(&mut **tx)
    .await
    .map_err(backend)?;

    Ok(())
}

/// Applies a confirmed pairing: the inbound citation's textual fields
/// overwrite the matched committed context, and the owning group's
/// derived fields are recomputed when that context is a group member.
async fn apply_confirm(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    inbound: &InboundContext,
    context_id: &str,
) -> Result<(), StoreError> {
    let row = sqlx::query("SELECT * FROM context WHERE id = ?")
        .bind(context_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(backend)?
        .ok_or_else(|| StoreError::Backend(format!("unknown context {}", context_id)))?;
    let mut target = context_from_row(&row)?;

    target.location = inbound.location.clone();
    target.number = inbound.number;
    target.preceding = inbound.preceding.clone();
    target.keyword = inbound.keyword.clone();
    target.following = inbound.following.clone();
    target.kind = inbound.kind;
    update_context_fields(tx, &target).await?;

    if target.group_role != GroupRole::Member {
        return Ok(());
    }

    let group_id: Option<String> =
        sqlx::query_scalar("SELECT group_id FROM context_group_member WHERE member_id = ?")
            .bind(context_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(backend)?;
    let Some(group_id) = group_id else {
        return Ok(());
    };

    let member_rows = sqlx::query(
        r#"
        SELECT c.* FROM context c
        JOIN context_group_member m ON m.member_id = c.id
        WHERE m.group_id = ?
        ORDER BY m.position
        "#,
    )
    .bind(&group_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(backend)?;
    let members = member_rows
        .iter()
        .map(context_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    let group_row = sqlx::query("SELECT * FROM context WHERE id = ?")
        .bind(&group_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(backend)?
        .ok_or_else(|| StoreError::Backend(format!("unknown group {}", group_id)))?;
    let mut group = context_from_row(&group_row)?;

    if recompute_group(&mut group, &members) == GroupUpdate::Updated {
        update_context_fields(tx, &group).await?;
    }

    Ok(())
}

#[async_trait]
impl ContextStore for SqliteStore {
    async fn insert_batch(&self, batch: &InboundContextGroup) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            r#"
            INSERT INTO inbound_context_group (id, timestamp, user, version, lock_user, lock_timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&batch.id)
        .bind(batch.timestamp.to_rfc3339())
        .bind(&batch.user)
        .bind(batch.version)
        .bind(batch.lock.holder())
        .bind(match &batch.lock {
            LockState::Locked { since, .. } => Some(since.to_rfc3339()),
            LockState::Unlocked => None,
        })
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for inbound in &batch.contexts {
            sqlx::query(
                r#"
                INSERT INTO inbound_context (id, batch_id, location, number, preceding, keyword, following, kind)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&inbound.id)
            .bind(&inbound.batch_id)
            .bind(&inbound.location)
            .bind(inbound.number)
            .bind(&inbound.preceding)
            .bind(&inbound.keyword)
            .bind(&inbound.following)
            .bind(inbound.kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn load_batch(&self, id: &str) -> Result<Option<InboundContextGroup>, StoreError> {
        let row = sqlx::query("SELECT * FROM inbound_context_group WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let timestamp: String = row.try_get("timestamp").map_err(backend)?;
        let mut batch = InboundContextGroup {
            id: row.try_get("id").map_err(backend)?,
            timestamp: parse_ts(&timestamp)?,
            user: row.try_get("user").map_err(backend)?,
            version: row.try_get("version").map_err(backend)?,
            lock: lock_from_row(&row)?,
            contexts: Vec::new(),
        };

        let rows = sqlx::query(
            "SELECT * FROM inbound_context WHERE batch_id = ? ORDER BY location, number",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        batch.contexts = rows
            .iter()
            .map(inbound_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(batch))
    }

    async fn list_batches(&self) -> Result<Vec<BatchSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT g.*, COUNT(c.id) AS context_count
            FROM inbound_context_group g
            LEFT JOIN inbound_context c ON c.batch_id = g.id
            GROUP BY g.id
            ORDER BY g.timestamp DESC, g.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let timestamp: String = row.try_get("timestamp").map_err(backend)?;
            let count: i64 = row.try_get("context_count").map_err(backend)?;
            summaries.push(BatchSummary {
                id: row.try_get("id").map_err(backend)?,
                timestamp: parse_ts(&timestamp)?,
                user: row.try_get("user").map_err(backend)?,
                lock: lock_from_row(row)?,
                context_count: count as usize,
            });
        }

        Ok(summaries)
    }

    async fn committed_by_location(&self, location: &str) -> Result<Vec<Context>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM context WHERE location = ? AND group_role != 'group' ORDER BY number",
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(context_from_row).collect()
    }

    async fn committed_by_keyword(&self, keyword: &str) -> Result<Vec<Context>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM context WHERE keyword = ? ORDER BY location, number")
                .bind(keyword)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;

        rows.iter().map(context_from_row).collect()
    }

    async fn create_group(&self, member_ids: &[String]) -> Result<Context, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let mut members = Vec::with_capacity(member_ids.len());
        for id in member_ids {
            let row = sqlx::query("SELECT * FROM context WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?
                .ok_or_else(|| StoreError::Backend(format!("unknown context {}", id)))?;
            let mut member = context_from_row(&row)?;
            member.group_role = GroupRole::Member;
            sqlx::query("UPDATE context SET group_role = ? WHERE id = ?")
                .bind(member.group_role.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            members.push(member);
        }

        let group = assemble_group(&members)
            .ok_or_else(|| StoreError::Backend("a group needs at least one member".to_string()))?;
        insert_context(&mut tx, &group).await?;

        for (position, member_id) in group.member_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO context_group_member (group_id, member_id, position) VALUES (?, ?, ?)",
            )
            .bind(&group.id)
            .bind(member_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(group)
    }

    async fn write_lock(
        &self,
        batch_id: &str,
        lock: &LockState,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let (lock_user, lock_timestamp) = match lock {
            LockState::Locked { owner, since } => {
                (Some(owner.as_str()), Some(since.to_rfc3339()))
            }
            LockState::Unlocked => (None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE inbound_context_group
            SET lock_user = ?, lock_timestamp = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(lock_user)
        .bind(lock_timestamp)
        .bind(batch_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT COUNT(*) > 0 FROM inbound_context_group WHERE id = ?")
                    .bind(batch_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(backend)?;
            return Err(if exists {
                StoreError::Conflict
            } else {
                StoreError::Backend(format!("unknown batch {}", batch_id))
            });
        }

        Ok(())
    }

    async fn commit_matching(
        &self,
        batch_id: &str,
        decisions: &[Disposition],
        expected_version: i64,
    ) -> Result<CommitSummary, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM inbound_context_group WHERE id = ?")
                .bind(batch_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
        match version {
            Some(v) if v == expected_version => {}
            Some(_) => return Err(StoreError::Conflict),
            None => return Err(StoreError::Backend(format!("unknown batch {}", batch_id))),
        }

        let mut summary = CommitSummary::default();

        for decision in decisions {
            let row = sqlx::query("SELECT * FROM inbound_context WHERE id = ? AND batch_id = ?")
                .bind(decision.inbound_id())
                .bind(batch_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?
                .ok_or_else(|| {
                    StoreError::Backend(format!(
                        "unknown inbound context {}",
                        decision.inbound_id()
                    ))
                })?;
            let inbound = inbound_from_row(&row)?;

            match decision {
                Disposition::Confirm { context_id, .. } => {
                    apply_confirm(&mut tx, &inbound, context_id).await?;
                    summary.confirmed += 1;
                }
                Disposition::CreateNew { .. } => {
                    insert_context(&mut tx, &Context::from_inbound(&inbound)).await?;
                    summary.created += 1;
                }
                Disposition::Discard { .. } => {
                    summary.discarded += 1;
                }
            }

            sqlx::query("DELETE FROM inbound_context WHERE id = ?")
                .bind(decision.inbound_id())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inbound_context WHERE batch_id = ?")
                .bind(batch_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;

        if remaining == 0 {
            sqlx::query("DELETE FROM inbound_context_group WHERE id = ?")
                .bind(batch_id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            summary.batch_deleted = true;
        } else {
            sqlx::query("UPDATE inbound_context_group SET version = version + 1 WHERE id = ?")
                .bind(batch_id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(summary)
    }

    async fn delete_batch(&self, id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("DELETE FROM inbound_context WHERE batch_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        sqlx::query("DELETE FROM inbound_context_group WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    use kwic_align_core::models::InboundContext;

    use crate::config::{Config, DbConfig, ReviewConfig};
    use crate::{db, migrate};

    async fn store_in(dir: &TempDir) -> SqliteStore {
        let config = Config {
            db: DbConfig {
                path: dir.path().join("kwic.sqlite"),
            },
            review: ReviewConfig::default(),
        };
        migrate::run_migrations(&config).await.unwrap();
        SqliteStore::new(db::connect(&config).await.unwrap())
    }

    /// Commits a batch of fresh citations at one location and returns
    /// the resulting committed contexts in number order.
    async fn commit_new(store: &SqliteStore, location: &str, keywords: &[&str]) -> Vec<Context> {
        let mut batch = InboundContextGroup::new("alice", Utc::now());
        for (i, kw) in keywords.iter().enumerate() {
            batch.contexts.push(InboundContext::new(
                batch.id.clone(),
                location,
                i as i64 + 1,
                "pre",
                *kw,
                "post",
                ContextKind::Segment,
            ));
        }
        store.insert_batch(&batch).await.unwrap();

        let decisions: Vec<Disposition> = batch
            .contexts
            .iter()
            .map(|c| Disposition::CreateNew {
                inbound_id: c.id.clone(),
            })
            .collect();
        store
            .commit_matching(&batch.id, &decisions, batch.version)
            .await
            .unwrap();

        store.committed_by_location(location).await.unwrap()
    }

    #[tokio::test]
    async fn create_group_persists_ordered_membership() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        let contexts = commit_new(&store, "5v", &["olde", "worde"]).await;
        let ids = vec![contexts[0].id.clone(), contexts[1].id.clone()];

        let group = store.create_group(&ids).await.unwrap();
        assert_eq!(group.group_role, GroupRole::Group);
        assert_eq!(group.keyword, "olde worde");
        assert_eq!(group.member_ids, ids);

        let positions: Vec<(String, i64)> = sqlx::query(
            "SELECT member_id, position FROM context_group_member WHERE group_id = ? ORDER BY position",
        )
        .bind(&group.id)
        .fetch_all(store.pool())
        .await
        .unwrap()
        .iter()
        .map(|row| (row.get("member_id"), row.get("position")))
        .collect();
        assert_eq!(positions, vec![(ids[0].clone(), 0), (ids[1].clone(), 1)]);

        // Members are re-tagged and therefore stay out of group listings.
        let listed = store.committed_by_location("5v").await.unwrap();
        assert!(listed.iter().all(|c| c.group_role == GroupRole::Member));
    }

    #[tokio::test]
    async fn create_group_rejects_unknown_member() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        let err = store.create_group(&["missing".to_string()]).await;
        assert!(matches!(err, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn confirm_on_member_recomputes_owning_group() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        let contexts = commit_new(&store, "5v", &["olde", "worde"]).await;
        let ids = vec![contexts[0].id.clone(), contexts[1].id.clone()];
        let group = store.create_group(&ids).await.unwrap();

        let mut batch = InboundContextGroup::new("alice", Utc::now());
        let inbound = InboundContext::new(
            batch.id.clone(),
            "5v",
            1,
            "pre",
            "newe",
            "post",
            ContextKind::Segment,
        );
        batch.contexts.push(inbound.clone());
        store.insert_batch(&batch).await.unwrap();

        let summary = store
            .commit_matching(
                &batch.id,
                &[Disposition::Confirm {
                    inbound_id: inbound.id,
                    context_id: ids[0].clone(),
                }],
                batch.version,
            )
            .await
            .unwrap();
        assert_eq!(summary.confirmed, 1);

        let reloaded = store.committed_by_keyword("newe worde").await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].id, group.id);
        assert_eq!(reloaded[0].group_role, GroupRole::Group);
    }
}
