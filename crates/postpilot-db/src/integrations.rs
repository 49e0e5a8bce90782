//! Cloud-storage integration repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use postpilot_core::models::IngestionIntegration;

const INTEGRATION_COLUMNS: &str = r#"
    id, tenant_id, provider, access_token, refresh_token, token_expires_at,
    sync_folder_path, active, last_synced_at, created_at, updated_at
"#;

#[derive(Clone)]
pub struct IntegrationRepository {
    pool: PgPool,
}

impl IntegrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All active integrations across tenants, oldest-synced first so that
    /// starved integrations are serviced before recently synced ones.
    pub async fn list_active(&self) -> Result<Vec<IngestionIntegration>> {
        let rows = sqlx::query_as::<Postgres, IngestionIntegration>(&format!(
            r#"
            SELECT {INTEGRATION_COLUMNS}
            FROM ingestion_integrations
            WHERE active = true
            ORDER BY last_synced_at ASC NULLS FIRST
            "#,
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active integrations")?;
        Ok(rows)
    }

    /// Persist a refreshed access token so later runs reuse it.
    pub async fn update_credentials(
        &self,
        integration_id: Uuid,
        access_token: &str,
        token_expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_integrations
            SET access_token = $2, token_expires_at = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(integration_id)
        .bind(access_token)
        .bind(token_expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to update integration credentials")?;
        Ok(())
    }

    pub async fn mark_synced(&self, integration_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_integrations
            SET last_synced_at = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(integration_id)
        .bind(at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to mark integration synced")?;
        Ok(())
    }
}
