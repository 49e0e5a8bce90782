use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

impl MediaType {
    /// Classify a MIME type; returns None for unsupported types.
    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("image/") {
            Some(MediaType::Image)
        } else if mime.starts_with("video/") {
            Some(MediaType::Video)
        } else {
            None
        }
    }
}

/// Processing lifecycle of a synced file. Transitions are one-way; a record
/// never regresses to an earlier status (the stale-claim reclaim is the one
/// sanctioned exception, reverting `analyzing` to `pending`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    Pending,
    Analyzing,
    Analyzed,
    Failed,
}

impl Display for MediaStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaStatus::Pending => write!(f, "pending"),
            MediaStatus::Analyzing => write!(f, "analyzing"),
            MediaStatus::Analyzed => write!(f, "analyzed"),
            MediaStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for MediaStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MediaStatus::Pending),
            "analyzing" => Ok(MediaStatus::Analyzing),
            "analyzed" => Ok(MediaStatus::Analyzed),
            "failed" => Ok(MediaStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid media status: {}", s)),
        }
    }
}

impl MediaStatus {
    /// Whether a forward transition is allowed. The repository's conditional
    /// updates enforce this at the SQL level; this is the in-memory mirror.
    pub fn can_transition(self, next: MediaStatus) -> bool {
        matches!(
            (self, next),
            (MediaStatus::Pending, MediaStatus::Analyzing)
                | (MediaStatus::Analyzing, MediaStatus::Analyzed)
                | (MediaStatus::Analyzing, MediaStatus::Failed)
                | (MediaStatus::Analyzing, MediaStatus::Pending)
        )
    }
}

/// One tracked remote file and its processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedMedia {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub integration_id: Uuid,
    /// Remote file id; (integration_id, remote_file_id) is the dedup key.
    pub remote_file_id: String,
    pub remote_url: Option<String>,
    pub local_url: Option<String>,
    pub media_type: MediaType,
    pub file_size: i64,
    pub mime_type: String,
    /// Modification time reported by the remote store.
    pub uploaded_at: DateTime<Utc>,
    pub status: MediaStatus,
    pub description: Option<String>,
    pub topics: Vec<String>,
    pub mood: Option<String>,
    pub objects: Vec<String>,
    pub context: Option<String>,
    pub is_grouped: bool,
    pub group_id: Option<Uuid>,
    pub group_position: Option<i32>,
    pub post_generated: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for SyncedMedia {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(SyncedMedia {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            integration_id: row.get("integration_id"),
            remote_file_id: row.get("remote_file_id"),
            remote_url: row.get("remote_url"),
            local_url: row.get("local_url"),
            media_type: row.get::<String, _>("media_type").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse media_type: {}", e).into())
            })?,
            file_size: row.get("file_size"),
            mime_type: row.get("mime_type"),
            uploaded_at: row.get("uploaded_at"),
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse status: {}", e).into())
            })?,
            description: row.get("description"),
            topics: row.get::<Option<Vec<String>>, _>("topics").unwrap_or_default(),
            mood: row.get("mood"),
            objects: row
                .get::<Option<Vec<String>>, _>("objects")
                .unwrap_or_default(),
            context: row.get("context"),
            is_grouped: row.get("is_grouped"),
            group_id: row.get("group_id"),
            group_position: row.get("group_position"),
            post_generated: row.get("post_generated"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

/// Insert payload for a freshly synced file (status starts at `pending`).
#[derive(Debug, Clone)]
pub struct NewSyncedMedia {
    pub tenant_id: Uuid,
    pub integration_id: Uuid,
    pub remote_file_id: String,
    pub remote_url: Option<String>,
    pub local_url: Option<String>,
    pub media_type: MediaType,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}
