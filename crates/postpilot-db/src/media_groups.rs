//! Media group repository
//!
//! Groups follow the same claim discipline as synced media: generation
//! claims flip `ready_for_post` to `generating` under `SKIP LOCKED`, and
//! terminal updates are conditioned on `generating`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use postpilot_core::models::{MediaGroup, NewMediaGroup};

const GROUP_COLUMNS: &str = r#"
    id, tenant_id, rule, reason, date_range_start, date_range_end,
    common_topics, theme, narrative_arc, confidence,
    media_count, min_media, max_media, status, post_ids,
    error_message, created_at, updated_at
"#;

#[derive(Clone)]
pub struct MediaGroupRepository {
    pool: PgPool,
}

impl MediaGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_ready(&self, group: NewMediaGroup) -> Result<MediaGroup> {
        let now = Utc::now();
        let row = sqlx::query_as::<Postgres, MediaGroup>(&format!(
            r#"
            INSERT INTO media_groups (
                tenant_id, rule, reason, date_range_start, date_range_end,
                common_topics, theme, narrative_arc, confidence,
                media_count, min_media, max_media, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'ready_for_post', $13, $13)
            RETURNING {GROUP_COLUMNS}
            "#,
        ))
        .bind(group.tenant_id)
        .bind(group.rule.to_string())
        .bind(&group.reason)
        .bind(group.date_range_start)
        .bind(group.date_range_end)
        .bind(&group.common_topics)
        .bind(&group.theme)
        .bind(group.narrative_arc.to_string())
        .bind(group.confidence)
        .bind(group.media_count)
        .bind(group.min_media)
        .bind(group.max_media)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert media group")?;
        Ok(row)
    }

    /// Correct the stored member count after attachment, when some proposed
    /// members were claimed by another group first.
    pub async fn update_member_count(&self, group_id: Uuid, media_count: i32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE media_groups
            SET media_count = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(group_id)
        .bind(media_count)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to update group member count")?;
        Ok(())
    }

    /// Remove a group that never reached its minimum size. Conditioned on
    /// `ready_for_post` so a group already claimed for generation is left
    /// alone. Returns whether a row was deleted.
    pub async fn delete_ready(&self, group_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM media_groups
            WHERE id = $1 AND status = 'ready_for_post'
            "#,
        )
        .bind(group_id)
        .execute(&self.pool)
        .await
        .context("Failed to delete media group")?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically claim up to `limit` groups for post generation.
    pub async fn claim_ready_for_generation(&self, limit: i64) -> Result<Vec<MediaGroup>> {
        let rows = sqlx::query_as::<Postgres, MediaGroup>(&format!(
            r#"
            WITH picked AS (
                SELECT id FROM media_groups
                WHERE status = 'ready_for_post'
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE media_groups g
            SET status = 'generating', updated_at = $2
            FROM picked
            WHERE g.id = picked.id
            RETURNING {prefixed}
            "#,
            prefixed = prefixed_group_columns("g"),
        ))
        .bind(limit)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .context("Failed to claim groups for generation")?;
        Ok(rows)
    }

    /// Finalize a group after its post was created. Returns whether this
    /// call performed the transition.
    pub async fn mark_posted(&self, group_id: Uuid, post_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_groups
            SET status = 'posted',
                post_ids = array_append(post_ids, $2),
                error_message = NULL,
                updated_at = $3
            WHERE id = $1 AND status = 'generating'
            "#,
        )
        .bind(group_id)
        .bind(post_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to mark group posted")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_failed(&self, group_id: Uuid, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_groups
            SET status = 'failed', error_message = $2, updated_at = $3
            WHERE id = $1 AND status = 'generating'
            "#,
        )
        .bind(group_id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to mark group failed")?;
        Ok(result.rows_affected() > 0)
    }

    /// Revert groups stuck in `generating` past the cutoff back to
    /// `ready_for_post`. Returns the reclaimed count.
    pub async fn reclaim_stale_generating(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE media_groups
            SET status = 'ready_for_post', updated_at = $2
            WHERE status = 'generating' AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to reclaim stale generating groups")?;
        Ok(result.rows_affected())
    }
}

fn prefixed_group_columns(alias: &str) -> String {
    GROUP_COLUMNS
        .split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
