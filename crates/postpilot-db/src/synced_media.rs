//! Synced media repository
//!
//! Status changes are guarded at the SQL level: claims use
//! `FOR UPDATE SKIP LOCKED` and completions are conditioned on the
//! expected current status, so concurrent runs cannot double-process
//! a record or regress a finished one.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use postpilot_core::models::{NewSyncedMedia, SyncedMedia};

const MEDIA_COLUMNS: &str = r#"
    id, tenant_id, integration_id, remote_file_id, remote_url, local_url,
    media_type, file_size, mime_type, uploaded_at, status,
    description, topics, mood, objects, context,
    is_grouped, group_id, group_position, post_generated,
    error_message, created_at, updated_at
"#;

#[derive(Clone)]
pub struct SyncedMediaRepository {
    pool: PgPool,
}

impl SyncedMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether a remote file has already been synced for this integration.
    pub async fn exists(&self, integration_id: Uuid, remote_file_id: &str) -> Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM synced_media
            WHERE integration_id = $1 AND remote_file_id = $2
            "#,
        )
        .bind(integration_id)
        .bind(remote_file_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to check synced media existence")?;
        Ok(row.is_some())
    }

    /// Insert a freshly synced file in `pending` status. Returns `None` when
    /// another run already inserted the same (integration, remote file) pair;
    /// the unique constraint makes the sync stage idempotent even under
    /// concurrent runs.
    pub async fn insert_pending(&self, media: NewSyncedMedia) -> Result<Option<SyncedMedia>> {
        let now = Utc::now();
        let row = sqlx::query_as::<Postgres, SyncedMedia>(&format!(
            r#"
            INSERT INTO synced_media (
                tenant_id, integration_id, remote_file_id, remote_url, local_url,
                media_type, file_size, mime_type, uploaded_at, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $10)
            ON CONFLICT (integration_id, remote_file_id) DO NOTHING
            RETURNING {MEDIA_COLUMNS}
            "#,
        ))
        .bind(media.tenant_id)
        .bind(media.integration_id)
        .bind(&media.remote_file_id)
        .bind(&media.remote_url)
        .bind(&media.local_url)
        .bind(media.media_type.to_string())
        .bind(media.file_size)
        .bind(&media.mime_type)
        .bind(media.uploaded_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert synced media")?;
        Ok(row)
    }

    /// Atomically claim up to `limit` pending image records for analysis,
    /// moving them to `analyzing`. Skips rows locked by a concurrent run.
    /// Videos are synced but not analyzed.
    pub async fn claim_pending_for_analysis(&self, limit: i64) -> Result<Vec<SyncedMedia>> {
        let rows = sqlx::query_as::<Postgres, SyncedMedia>(&format!(
            r#"
            WITH picked AS (
                SELECT id FROM synced_media
                WHERE status = 'pending' AND media_type = 'image'
                ORDER BY uploaded_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE synced_media m
            SET status = 'analyzing', updated_at = $2
            FROM picked
            WHERE m.id = picked.id
            RETURNING {prefixed}
            "#,
            prefixed = prefixed_media_columns("m"),
        ))
        .bind(limit)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .context("Failed to claim pending media")?;
        Ok(rows)
    }

    /// Record a successful analysis. The status condition makes the update a
    /// no-op if the claim was reclaimed and finished elsewhere in the
    /// meantime; returns whether this call won.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_analyzed(
        &self,
        media_id: Uuid,
        description: &str,
        topics: &[String],
        mood: Option<&str>,
        objects: &[String],
        context: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE synced_media
            SET status = 'analyzed', description = $2, topics = $3, mood = $4,
                objects = $5, context = $6, error_message = NULL, updated_at = $7
            WHERE id = $1 AND status = 'analyzing'
            "#,
        )
        .bind(media_id)
        .bind(description)
        .bind(topics)
        .bind(mood)
        .bind(objects)
        .bind(context)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to mark media analyzed")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_analysis_failed(&self, media_id: Uuid, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE synced_media
            SET status = 'failed', error_message = $2, updated_at = $3
            WHERE id = $1 AND status = 'analyzing'
            "#,
        )
        .bind(media_id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to mark media analysis failed")?;
        Ok(result.rows_affected() > 0)
    }

    /// Revert records stuck in `analyzing` past the cutoff back to `pending`
    /// so a later run can pick them up. Returns the reclaimed count.
    pub async fn reclaim_stale_analyzing(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE synced_media
            SET status = 'pending', updated_at = $2
            WHERE status = 'analyzing' AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to reclaim stale analyzing media")?;
        Ok(result.rows_affected())
    }

    /// Tenants that currently have analyzed, ungrouped media.
    pub async fn tenants_with_groupable(&self) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT tenant_id FROM synced_media
            WHERE status = 'analyzed' AND is_grouped = false
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tenants with groupable media")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Analyzed, ungrouped media for one tenant, oldest upload first.
    pub async fn list_groupable(&self, tenant_id: Uuid) -> Result<Vec<SyncedMedia>> {
        let rows = sqlx::query_as::<Postgres, SyncedMedia>(&format!(
            r#"
            SELECT {MEDIA_COLUMNS}
            FROM synced_media
            WHERE tenant_id = $1 AND status = 'analyzed' AND is_grouped = false
            ORDER BY uploaded_at ASC
            "#,
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list groupable media")?;
        Ok(rows)
    }

    pub async fn list_by_group(&self, group_id: Uuid) -> Result<Vec<SyncedMedia>> {
        let rows = sqlx::query_as::<Postgres, SyncedMedia>(&format!(
            r#"
            SELECT {MEDIA_COLUMNS}
            FROM synced_media
            WHERE group_id = $1
            ORDER BY group_position ASC NULLS LAST, uploaded_at ASC
            "#,
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list media by group")?;
        Ok(rows)
    }

    /// Attach media to a group in the given order. Each update is conditioned
    /// on `is_grouped = false`, so a record already claimed by another group
    /// stays where it is. Returns how many records were actually attached.
    pub async fn assign_group(&self, group_id: Uuid, media_ids: &[Uuid]) -> Result<u64> {
        let now = Utc::now();
        let mut attached = 0u64;
        for (position, media_id) in media_ids.iter().enumerate() {
            let result = sqlx::query(
                r#"
                UPDATE synced_media
                SET is_grouped = true, group_id = $2, group_position = $3, updated_at = $4
                WHERE id = $1 AND is_grouped = false
                "#,
            )
            .bind(media_id)
            .bind(group_id)
            .bind(position as i32)
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to assign media to group")?;
            attached += result.rows_affected();
        }
        Ok(attached)
    }

    /// Detach every record from a group, making them groupable again.
    /// Returns how many records were released.
    pub async fn release_group(&self, group_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE synced_media
            SET is_grouped = false, group_id = NULL, group_position = NULL, updated_at = $2
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to release group media")?;
        Ok(result.rows_affected())
    }

    pub async fn mark_post_generated(&self, group_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE synced_media
            SET post_generated = true, updated_at = $2
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to mark group media post-generated")?;
        Ok(())
    }
}

fn prefixed_media_columns(alias: &str) -> String {
    MEDIA_COLUMNS
        .split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
