//! Post repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use postpilot_core::models::{NewPost, Post};

const POST_COLUMNS: &str = r#"
    id, tenant_id, group_id, title, content, status, confidence,
    scheduled_at, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, post: NewPost) -> Result<Post> {
        let now = Utc::now();
        let row = sqlx::query_as::<Postgres, Post>(&format!(
            r#"
            INSERT INTO posts (
                tenant_id, group_id, title, content, status, confidence,
                scheduled_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {POST_COLUMNS}
            "#,
        ))
        .bind(post.tenant_id)
        .bind(post.group_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.status.to_string())
        .bind(post.confidence)
        .bind(post.scheduled_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create post")?;
        Ok(row)
    }

    /// Scheduled posts at or after `from`, used by the slot scheduler to
    /// avoid double-booking a publication time.
    pub async fn scheduled_after(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<Postgres, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE tenant_id = $1 AND status = 'scheduled' AND scheduled_at >= $2
            ORDER BY scheduled_at ASC
            "#,
        ))
        .bind(tenant_id)
        .bind(from)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list scheduled posts")?;
        Ok(rows)
    }
}
