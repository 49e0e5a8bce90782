//! Configuration module
//!
//! Environment-driven configuration for the pipeline service. Every tunable
//! has a documented default; `validate()` rejects setups that are unsafe to
//! run in production (missing cron secret, non-Postgres database URL).

use std::env;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SYNC_LOOKBACK_HOURS: i64 = 48;
const SYNC_PAGE_SIZE: u32 = 100;
const ANALYZER_BATCH_SIZE: i64 = 10;
const ANALYZER_DELAY_MS: u64 = 1000;
const GENERATOR_BATCH_SIZE: i64 = 5;
const SLOT_LOOKAHEAD_DAYS: u32 = 30;
const STALE_CLAIM_TIMEOUT_MINUTES: i64 = 30;
const ADAPTER_TIMEOUT_SECS: u64 = 60;

/// Application configuration for the pipeline service.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Shared secret for the stage-trigger endpoints. When unset the check is
    /// disabled, which is only acceptable for local development.
    pub cron_secret: Option<String>,
    // Storage sync
    pub sync_lookback_hours: i64,
    pub sync_page_size: u32,
    // Media analyzer
    pub analyzer_batch_size: i64,
    pub analyzer_delay_ms: u64,
    // Post generator / slot scheduler
    pub generator_batch_size: i64,
    pub slot_lookahead_days: u32,
    // Claim hardening: rows stuck in an in-progress status longer than this
    // are reclaimed at the start of the owning stage's next run.
    pub stale_claim_timeout_minutes: i64,
    // External adapters
    pub adapter_timeout_secs: u64,
    pub anthropic_api_key: Option<String>,
    pub anthropic_vision_model: String,
    pub anthropic_text_model: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_upload_preset: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_env("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            cron_secret: env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
            sync_lookback_hours: parse_env("SYNC_LOOKBACK_HOURS", SYNC_LOOKBACK_HOURS),
            sync_page_size: parse_env("SYNC_PAGE_SIZE", SYNC_PAGE_SIZE),
            analyzer_batch_size: parse_env("ANALYZER_BATCH_SIZE", ANALYZER_BATCH_SIZE),
            analyzer_delay_ms: parse_env("ANALYZER_DELAY_MS", ANALYZER_DELAY_MS),
            generator_batch_size: parse_env("GENERATOR_BATCH_SIZE", GENERATOR_BATCH_SIZE),
            slot_lookahead_days: parse_env("SLOT_LOOKAHEAD_DAYS", SLOT_LOOKAHEAD_DAYS),
            stale_claim_timeout_minutes: parse_env(
                "STALE_CLAIM_TIMEOUT_MINUTES",
                STALE_CLAIM_TIMEOUT_MINUTES,
            ),
            adapter_timeout_secs: parse_env("ADAPTER_TIMEOUT_SECS", ADAPTER_TIMEOUT_SECS),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|s| !s.is_empty()),
            anthropic_vision_model: env::var("ANTHROPIC_VISION_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            anthropic_text_model: env::var("ANTHROPIC_TEXT_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            google_client_id: env::var("GOOGLE_CLIENT_ID").ok().filter(|s| !s.is_empty()),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME")
                .ok()
                .filter(|s| !s.is_empty()),
            cloudinary_upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET")
                .ok()
                .filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        // Running the trigger endpoints unauthenticated is a local-dev-only mode.
        if self.is_production() && self.cron_secret.is_none() {
            return Err(anyhow::anyhow!(
                "CRON_SECRET must be set in production; unauthenticated stage triggers are only allowed in development"
            ));
        }

        if self.sync_lookback_hours <= 0 {
            return Err(anyhow::anyhow!("SYNC_LOOKBACK_HOURS must be positive"));
        }

        if self.analyzer_batch_size <= 0 || self.generator_batch_size <= 0 {
            return Err(anyhow::anyhow!("batch sizes must be positive"));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server_port: 4000,
            environment: "development".to_string(),
            database_url: "postgresql://localhost/postpilot".to_string(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            cron_secret: None,
            sync_lookback_hours: SYNC_LOOKBACK_HOURS,
            sync_page_size: SYNC_PAGE_SIZE,
            analyzer_batch_size: ANALYZER_BATCH_SIZE,
            analyzer_delay_ms: ANALYZER_DELAY_MS,
            generator_batch_size: GENERATOR_BATCH_SIZE,
            slot_lookahead_days: SLOT_LOOKAHEAD_DAYS,
            stale_claim_timeout_minutes: STALE_CLAIM_TIMEOUT_MINUTES,
            adapter_timeout_secs: ADAPTER_TIMEOUT_SECS,
            anthropic_api_key: None,
            anthropic_vision_model: "claude-sonnet-4-20250514".to_string(),
            anthropic_text_model: "claude-sonnet-4-20250514".to_string(),
            google_client_id: None,
            google_client_secret: None,
            cloudinary_cloud_name: None,
            cloudinary_upload_preset: None,
        }
    }

    #[test]
    fn test_validate_accepts_development_without_secret() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_production_without_secret() {
        let mut config = base_config();
        config.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.cron_secret = Some("s3cret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_postgres_url() {
        let mut config = base_config();
        config.database_url = "mysql://localhost/postpilot".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_production() {
        let mut config = base_config();
        assert!(!config.is_production());
        config.environment = "PROD".to_string();
        assert!(config.is_production());
    }
}
