//! Storage sync stage

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use postpilot_adapters::{BlobStore, Credentials, RemoteFile, RemoteStorage};
use postpilot_core::models::{IngestionIntegration, MediaType, NewSyncedMedia, SyncedMedia};
use postpilot_core::AppError;
use postpilot_db::{IntegrationRepository, SyncedMediaRepository};
use uuid::Uuid;

use crate::summary::StageSummary;

/// Access tokens expiring within this window are refreshed up front rather
/// than risking mid-batch expiry.
const TOKEN_REFRESH_SKEW_MINUTES: i64 = 5;

/// Persistence seam for ingestion: the existence check plus the
/// conflict-absorbing insert that together make syncing idempotent.
#[async_trait]
pub trait MediaIngest: Send + Sync {
    async fn exists(&self, integration_id: Uuid, remote_file_id: &str) -> Result<bool>;

    async fn insert_pending(&self, media: NewSyncedMedia) -> Result<Option<SyncedMedia>>;
}

#[async_trait]
impl MediaIngest for SyncedMediaRepository {
    async fn exists(&self, integration_id: Uuid, remote_file_id: &str) -> Result<bool> {
        SyncedMediaRepository::exists(self, integration_id, remote_file_id).await
    }

    async fn insert_pending(&self, media: NewSyncedMedia) -> Result<Option<SyncedMedia>> {
        SyncedMediaRepository::insert_pending(self, media).await
    }
}

pub struct SyncStage {
    integrations: IntegrationRepository,
    media: Arc<dyn MediaIngest>,
    remote: Arc<dyn RemoteStorage>,
    blobs: Arc<dyn BlobStore>,
    lookback_hours: i64,
    page_size: i64,
}

impl SyncStage {
    pub fn new(
        integrations: IntegrationRepository,
        media: Arc<dyn MediaIngest>,
        remote: Arc<dyn RemoteStorage>,
        blobs: Arc<dyn BlobStore>,
        lookback_hours: i64,
        page_size: i64,
    ) -> Self {
        Self {
            integrations,
            media,
            remote,
            blobs,
            lookback_hours,
            page_size,
        }
    }

    /// One sync pass over every active integration. Credential or folder
    /// failures abort only that integration; per-file failures are recorded
    /// and the batch continues.
    pub async fn run(&self) -> Result<StageSummary> {
        let mut summary = StageSummary::default();
        let integrations = self.integrations.list_active().await?;
        tracing::info!(integrations = integrations.len(), "Sync stage started");

        for integration in integrations {
            if let Err(e) = self.sync_integration(&integration, &mut summary).await {
                tracing::error!(
                    integration_id = %integration.id,
                    tenant_id = %integration.tenant_id,
                    error = %e,
                    "Integration sync aborted"
                );
                summary.record_failure(format!("integration {}: {e}", integration.id));
            }
        }

        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Sync stage finished"
        );
        Ok(summary)
    }

    async fn sync_integration(
        &self,
        integration: &IngestionIntegration,
        summary: &mut StageSummary,
    ) -> Result<()> {
        let credentials = self.ensure_credentials(integration).await?;

        let folder_id = self
            .remote
            .resolve_folder(&credentials, &integration.sync_folder_path)
            .await
            .map_err(|e| {
                AppError::NotFound(format!(
                    "Sync folder '{}' could not be resolved: {e}",
                    integration.sync_folder_path
                ))
            })?;

        let since = Utc::now() - Duration::hours(self.lookback_hours);
        let files = self
            .remote
            .list_media(&credentials, &folder_id, since, self.page_size)
            .await
            .map_err(|e| AppError::RemoteStorage(e.to_string()))?;
        tracing::debug!(
            integration_id = %integration.id,
            files = files.len(),
            "Listed remote media"
        );

        for file in &files {
            match self.ingest_file(integration, &credentials, file).await {
                Ok(true) => summary.record_success(),
                Ok(false) => {} // already synced, idempotent skip
                Err(e) => {
                    tracing::warn!(
                        integration_id = %integration.id,
                        remote_file_id = %file.id,
                        error = %e,
                        "Failed to ingest remote file"
                    );
                    summary.record_failure(format!("file {}: {e}", file.id));
                }
            }
        }

        // Per-file failures do not block the sync watermark.
        self.integrations
            .mark_synced(integration.id, Utc::now())
            .await?;
        Ok(())
    }

    /// Current credentials, refreshed and persisted first when expiring.
    async fn ensure_credentials(
        &self,
        integration: &IngestionIntegration,
    ) -> Result<Credentials> {
        let credentials = Credentials {
            access_token: integration.access_token.clone(),
            refresh_token: integration.refresh_token.clone(),
            expires_at: integration.token_expires_at,
        };
        if !integration.needs_refresh(Duration::minutes(TOKEN_REFRESH_SKEW_MINUTES)) {
            return Ok(credentials);
        }

        tracing::info!(integration_id = %integration.id, "Refreshing access token");
        let refreshed = self
            .remote
            .refresh_credentials(&credentials)
            .await
            .map_err(|e| AppError::CredentialRefresh(e.to_string()))?;
        self.integrations
            .update_credentials(integration.id, &refreshed.access_token, refreshed.expires_at)
            .await?;
        Ok(refreshed)
    }

    /// Returns Ok(true) when a new record was created, Ok(false) for an
    /// idempotent skip.
    async fn ingest_file(
        &self,
        integration: &IngestionIntegration,
        credentials: &Credentials,
        file: &RemoteFile,
    ) -> Result<bool> {
        let Some(media_type) = MediaType::from_mime(&file.mime_type) else {
            return Ok(false);
        };
        if self.media.exists(integration.id, &file.id).await? {
            return Ok(false);
        }

        let data = self
            .remote
            .download(credentials, &file.id)
            .await
            .map_err(|e| AppError::RemoteStorage(format!("download failed: {e}")))?;
        let blob = self
            .blobs
            .upload(&file.name, &file.mime_type, data)
            .await
            .map_err(|e| AppError::BlobStore(e.to_string()))?;

        let inserted = self
            .media
            .insert_pending(NewSyncedMedia {
                tenant_id: integration.tenant_id,
                integration_id: integration.id,
                remote_file_id: file.id.clone(),
                remote_url: file.web_url.clone(),
                local_url: Some(blob.url),
                media_type,
                file_size: file.size,
                mime_type: file.mime_type.clone(),
                uploaded_at: file.modified_at,
            })
            .await?;

        match inserted {
            Some(media) => {
                tracing::info!(
                    media_id = %media.id,
                    integration_id = %integration.id,
                    remote_file_id = %file.id,
                    "Synced new media"
                );
                Ok(true)
            }
            None => {
                // A concurrent run inserted the same file; the unique key
                // absorbed the race.
                tracing::debug!(
                    integration_id = %integration.id,
                    remote_file_id = %file.id,
                    "Duplicate insert skipped"
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::DateTime;
    use postpilot_adapters::HostedBlob;
    use postpilot_core::models::{MediaStatus, StorageProvider};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeRemote {
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl RemoteStorage for FakeRemote {
        async fn refresh_credentials(&self, credentials: &Credentials) -> Result<Credentials> {
            Ok(credentials.clone())
        }

        async fn resolve_folder(&self, _credentials: &Credentials, _path: &str) -> Result<String> {
            Ok("folder-1".to_string())
        }

        async fn list_media(
            &self,
            _credentials: &Credentials,
            _folder_id: &str,
            _since: DateTime<Utc>,
            _page_size: i64,
        ) -> Result<Vec<RemoteFile>> {
            Ok(Vec::new())
        }

        async fn download(&self, _credentials: &Credentials, _file_id: &str) -> Result<Bytes> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"bytes"))
        }
    }

    struct FakeBlobs;

    #[async_trait]
    impl BlobStore for FakeBlobs {
        async fn upload(
            &self,
            _filename: &str,
            _content_type: &str,
            _data: Bytes,
        ) -> Result<HostedBlob> {
            Ok(HostedBlob {
                url: "https://blobs.test/img.jpg".to_string(),
                public_id: "img".to_string(),
                bytes: 5,
                width: None,
                height: None,
            })
        }
    }

    /// In-memory stand-in for the synced_media table, keyed by the dedup
    /// unique key. With `blind_existence_check` the existence check always
    /// misses, simulating a row appearing between the check and the insert.
    struct FakeMediaIngest {
        rows: Mutex<HashSet<(Uuid, String)>>,
        blind_existence_check: bool,
    }

    impl FakeMediaIngest {
        fn new(blind_existence_check: bool) -> Self {
            Self {
                rows: Mutex::new(HashSet::new()),
                blind_existence_check,
            }
        }
    }

    #[async_trait]
    impl MediaIngest for FakeMediaIngest {
        async fn exists(&self, integration_id: Uuid, remote_file_id: &str) -> Result<bool> {
            if self.blind_existence_check {
                return Ok(false);
            }
            Ok(self
                .rows
                .lock()
                .unwrap()
                .contains(&(integration_id, remote_file_id.to_string())))
        }

        async fn insert_pending(&self, media: NewSyncedMedia) -> Result<Option<SyncedMedia>> {
            let mut rows = self.rows.lock().unwrap();
            if !rows.insert((media.integration_id, media.remote_file_id.clone())) {
                return Ok(None);
            }
            Ok(Some(synced_row(media)))
        }
    }

    fn synced_row(media: NewSyncedMedia) -> SyncedMedia {
        SyncedMedia {
            id: Uuid::new_v4(),
            tenant_id: media.tenant_id,
            integration_id: media.integration_id,
            remote_file_id: media.remote_file_id,
            remote_url: media.remote_url,
            local_url: media.local_url,
            media_type: media.media_type,
            file_size: media.file_size,
            mime_type: media.mime_type,
            uploaded_at: media.uploaded_at,
            status: MediaStatus::Pending,
            description: None,
            topics: Vec::new(),
            mood: None,
            objects: Vec::new(),
            context: None,
            is_grouped: false,
            group_id: None,
            group_position: None,
            post_generated: false,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn stage(media: Arc<dyn MediaIngest>, remote: Arc<FakeRemote>) -> SyncStage {
        // The integration repository is unused by ingest_file; the lazy pool
        // never connects.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/postpilot")
            .unwrap();
        SyncStage::new(
            IntegrationRepository::new(pool),
            media,
            remote,
            Arc::new(FakeBlobs),
            24,
            100,
        )
    }

    fn integration() -> IngestionIntegration {
        IngestionIntegration {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            provider: StorageProvider::GoogleDrive,
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            token_expires_at: None,
            sync_folder_path: "/Photos".to_string(),
            active: true,
            last_synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_at: None,
        }
    }

    fn remote_file(id: &str, mime_type: &str) -> RemoteFile {
        RemoteFile {
            id: id.to_string(),
            name: "img.jpg".to_string(),
            mime_type: mime_type.to_string(),
            size: 5,
            modified_at: Utc::now(),
            web_url: None,
        }
    }

    #[tokio::test]
    async fn test_same_file_synced_twice_creates_one_record() {
        let media = Arc::new(FakeMediaIngest::new(false));
        let remote = Arc::new(FakeRemote {
            downloads: AtomicUsize::new(0),
        });
        let stage = stage(media.clone(), remote.clone());
        let integration = integration();
        let file = remote_file("remote-1", "image/jpeg");

        let first = stage
            .ingest_file(&integration, &credentials(), &file)
            .await
            .unwrap();
        let second = stage
            .ingest_file(&integration, &credentials(), &file)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(media.rows.lock().unwrap().len(), 1);
        // The second pass skips before downloading anything.
        assert_eq!(remote.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_insert_absorbed_by_unique_key() {
        // The existence check misses but the row lands before our insert;
        // the insert reports a skip instead of creating a second record.
        let media = Arc::new(FakeMediaIngest::new(true));
        let remote = Arc::new(FakeRemote {
            downloads: AtomicUsize::new(0),
        });
        let stage = stage(media.clone(), remote.clone());
        let integration = integration();
        let file = remote_file("remote-1", "image/jpeg");

        let first = stage
            .ingest_file(&integration, &credentials(), &file)
            .await
            .unwrap();
        let second = stage
            .ingest_file(&integration, &credentials(), &file)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(media.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_mime_type_is_skipped() {
        let media = Arc::new(FakeMediaIngest::new(false));
        let remote = Arc::new(FakeRemote {
            downloads: AtomicUsize::new(0),
        });
        let stage = stage(media.clone(), remote.clone());
        let integration = integration();
        let file = remote_file("remote-1", "application/pdf");

        let created = stage
            .ingest_file(&integration, &credentials(), &file)
            .await
            .unwrap();

        assert!(!created);
        assert!(media.rows.lock().unwrap().is_empty());
        assert_eq!(remote.downloads.load(Ordering::SeqCst), 0);
    }
}
