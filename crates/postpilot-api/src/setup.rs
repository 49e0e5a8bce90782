//! Startup wiring: database pool, migrations, adapters, stages

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use postpilot_adapters::{
    BlobStore, ClaudeGenerator, ClaudeVision, CloudinaryStore, ContentGenerator,
    GoogleDriveStorage, RemoteStorage, VisionAnalyzer,
};
use postpilot_core::Config;
use postpilot_db::{
    AutoPilotConfigRepository, IntegrationRepository, MediaGroupRepository, PostRepository,
    SyncedMediaRepository,
};
use postpilot_pipeline::{AnalyzerStage, GeneratorStage, GroupingStage, SyncStage};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::state::AppState;

/// Connect the pool and run pending migrations (workspace migrations/
/// relative to this crate).
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

pub async fn build_state(config: &Config) -> Result<AppState> {
    let pool = setup_database(config).await?;

    let integrations = IntegrationRepository::new(pool.clone());
    let media = SyncedMediaRepository::new(pool.clone());
    let groups = MediaGroupRepository::new(pool.clone());
    let posts = PostRepository::new(pool.clone());
    let configs = AutoPilotConfigRepository::new(pool);

    let timeout = Duration::from_secs(config.adapter_timeout_secs);

    let anthropic_api_key = config
        .anthropic_api_key
        .clone()
        .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY must be set"))?;
    let remote: Arc<dyn RemoteStorage> = Arc::new(GoogleDriveStorage::new(
        config
            .google_client_id
            .clone()
            .ok_or_else(|| anyhow!("GOOGLE_CLIENT_ID must be set"))?,
        config
            .google_client_secret
            .clone()
            .ok_or_else(|| anyhow!("GOOGLE_CLIENT_SECRET must be set"))?,
        timeout,
    )?);
    let blobs: Arc<dyn BlobStore> = Arc::new(CloudinaryStore::new(
        config
            .cloudinary_cloud_name
            .clone()
            .ok_or_else(|| anyhow!("CLOUDINARY_CLOUD_NAME must be set"))?,
        config
            .cloudinary_upload_preset
            .clone()
            .ok_or_else(|| anyhow!("CLOUDINARY_UPLOAD_PRESET must be set"))?,
        timeout,
    )?);
    let vision: Arc<dyn VisionAnalyzer> = Arc::new(ClaudeVision::new(
        anthropic_api_key.clone(),
        config.anthropic_vision_model.clone(),
        timeout,
    )?);
    let generator: Arc<dyn ContentGenerator> = Arc::new(ClaudeGenerator::new(
        anthropic_api_key,
        config.anthropic_text_model.clone(),
        timeout,
    )?);

    Ok(AppState {
        cron_secret: config.cron_secret.clone(),
        sync: Arc::new(SyncStage::new(
            integrations,
            Arc::new(media.clone()),
            remote,
            blobs,
            config.sync_lookback_hours,
            config.sync_page_size as i64,
        )),
        analyzer: Arc::new(AnalyzerStage::new(
            media.clone(),
            vision,
            config.analyzer_batch_size,
            config.analyzer_delay_ms,
            config.stale_claim_timeout_minutes,
        )),
        grouping: Arc::new(GroupingStage::new(
            media.clone(),
            groups.clone(),
            configs.clone(),
        )),
        generator: Arc::new(GeneratorStage::new(
            groups,
            media,
            posts,
            configs,
            generator,
            config.generator_batch_size,
            config.slot_lookahead_days as i64,
            config.stale_claim_timeout_minutes,
        )),
    })
}
