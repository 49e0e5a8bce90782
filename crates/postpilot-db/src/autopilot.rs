//! Per-tenant autopilot settings repository
//!
//! Settings live in a single JSONB column so new tunables do not require a
//! migration; missing fields deserialize to their defaults.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use postpilot_core::models::AutoPilotConfig;

#[derive(Clone)]
pub struct AutoPilotConfigRepository {
    pool: PgPool,
}

impl AutoPilotConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The tenant's stored settings, or defaults when none are stored or the
    /// stored JSON no longer parses.
    pub async fn get_or_default(&self, tenant_id: Uuid) -> Result<AutoPilotConfig> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r#"
            SELECT settings FROM autopilot_configs
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load autopilot config")?;

        let mut config = match row {
            Some((settings,)) => serde_json::from_value(settings).unwrap_or_else(|e| {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Stored autopilot settings failed to parse, using defaults"
                );
                AutoPilotConfig::default()
            }),
            None => AutoPilotConfig::for_tenant(tenant_id),
        };
        config.tenant_id = tenant_id;
        Ok(config)
    }
}
