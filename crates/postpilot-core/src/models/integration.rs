use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StorageProvider {
    GoogleDrive,
    Dropbox,
}

impl Display for StorageProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageProvider::GoogleDrive => write!(f, "google_drive"),
            StorageProvider::Dropbox => write!(f, "dropbox"),
        }
    }
}

impl FromStr for StorageProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google_drive" => Ok(StorageProvider::GoogleDrive),
            "dropbox" => Ok(StorageProvider::Dropbox),
            _ => Err(anyhow::anyhow!("Invalid storage provider: {}", s)),
        }
    }
}

/// One cloud-storage connection per (tenant, provider). The sync stage reads
/// active integrations and writes back refreshed credentials and the
/// last-synced timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionIntegration {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider: StorageProvider,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub sync_folder_path: String,
    pub active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for IngestionIntegration {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(IngestionIntegration {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            provider: row.get::<String, _>("provider").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse provider: {}", e).into())
            })?,
            access_token: row.get("access_token"),
            refresh_token: row.get("refresh_token"),
            token_expires_at: row.get("token_expires_at"),
            sync_folder_path: row.get("sync_folder_path"),
            active: row.get("active"),
            last_synced_at: row.get("last_synced_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl IngestionIntegration {
    /// True when the access token is expired or expires within the skew window.
    pub fn needs_refresh(&self, skew: chrono::Duration) -> bool {
        match self.token_expires_at {
            Some(expires_at) => expires_at <= Utc::now() + skew,
            None => false,
        }
    }
}
