//! Remote cloud-storage abstraction
//!
//! The sync stage talks to tenant-connected storage (Google Drive, Dropbox)
//! only through this trait.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// OAuth credential pair held by an integration.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One file listed from the remote store.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub modified_at: DateTime<Utc>,
    /// Browser-facing URL on the remote store, when the provider exposes one.
    pub web_url: Option<String>,
}

#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Exchange the refresh token for a fresh access token.
    async fn refresh_credentials(&self, credentials: &Credentials) -> Result<Credentials>;

    /// Resolve a human-readable folder path ("/Photos/Events") to the
    /// provider's folder id.
    async fn resolve_folder(&self, credentials: &Credentials, path: &str) -> Result<String>;

    /// Image/video files under `folder_id` modified at or after `since`.
    async fn list_media(
        &self,
        credentials: &Credentials,
        folder_id: &str,
        since: DateTime<Utc>,
        page_size: i64,
    ) -> Result<Vec<RemoteFile>>;

    /// Download a file's bytes.
    async fn download(&self, credentials: &Credentials, file_id: &str) -> Result<Bytes>;
}
