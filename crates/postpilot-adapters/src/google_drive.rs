//! Google Drive provider (Drive v3 REST)

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::remote::{Credentials, RemoteFile, RemoteStorage};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub struct GoogleDriveStorage {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    /// Drive returns file sizes as strings.
    size: Option<String>,
    modified_time: Option<DateTime<Utc>>,
    web_view_link: Option<String>,
}

impl GoogleDriveStorage {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for Google Drive")?;
        Ok(Self {
            http_client,
            client_id,
            client_secret,
        })
    }

    async fn files_list(
        &self,
        credentials: &Credentials,
        query: &str,
        page_size: i64,
        page_token: Option<&str>,
    ) -> Result<FileList> {
        let mut request = self
            .http_client
            .get(format!("{DRIVE_API_BASE}/files"))
            .bearer_auth(&credentials.access_token)
            .query(&[
                ("q", query),
                (
                    "fields",
                    "nextPageToken, files(id, name, mimeType, size, modifiedTime, webViewLink)",
                ),
                ("orderBy", "modifiedTime"),
                ("pageSize", &page_size.to_string()),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .context("Google Drive files.list request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Google Drive files.list returned {status}: {body}"));
        }
        response
            .json::<FileList>()
            .await
            .context("Failed to decode Google Drive files.list response")
    }
}

#[async_trait]
impl RemoteStorage for GoogleDriveStorage {
    async fn refresh_credentials(&self, credentials: &Credentials) -> Result<Credentials> {
        let response = self
            .http_client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Google OAuth token refresh request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Google OAuth token refresh returned {status}: {body}"));
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to decode Google OAuth token response")?;
        Ok(Credentials {
            access_token: token.access_token,
            refresh_token: credentials.refresh_token.clone(),
            expires_at: Some(Utc::now() + ChronoDuration::seconds(token.expires_in)),
        })
    }

    async fn resolve_folder(&self, credentials: &Credentials, path: &str) -> Result<String> {
        let mut parent = "root".to_string();
        for segment in path.split('/').filter(|s| !s.trim().is_empty()) {
            let query = format!(
                "name = '{}' and mimeType = 'application/vnd.google-apps.folder' \
                 and '{}' in parents and trashed = false",
                segment.replace('\'', "\\'"),
                parent
            );
            let list = self.files_list(credentials, &query, 1, None).await?;
            parent = list
                .files
                .into_iter()
                .next()
                .map(|f| f.id)
                .ok_or_else(|| anyhow!("Folder '{segment}' not found under '{path}'"))?;
        }
        Ok(parent)
    }

    async fn list_media(
        &self,
        credentials: &Credentials,
        folder_id: &str,
        since: DateTime<Utc>,
        page_size: i64,
    ) -> Result<Vec<RemoteFile>> {
        let query = format!(
            "'{}' in parents and trashed = false \
             and (mimeType contains 'image/' or mimeType contains 'video/') \
             and modifiedTime >= '{}'",
            folder_id,
            since.to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let list = self
                .files_list(credentials, &query, page_size, page_token.as_deref())
                .await?;
            for f in list.files {
                files.push(RemoteFile {
                    id: f.id,
                    name: f.name,
                    mime_type: f.mime_type,
                    size: f.size.and_then(|s| s.parse().ok()).unwrap_or(0),
                    modified_at: f.modified_time.unwrap_or_else(Utc::now),
                    web_url: f.web_view_link,
                });
            }
            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(files)
    }

    async fn download(&self, credentials: &Credentials, file_id: &str) -> Result<Bytes> {
        let response = self
            .http_client
            .get(format!("{DRIVE_API_BASE}/files/{file_id}"))
            .query(&[("alt", "media")])
            .bearer_auth(&credentials.access_token)
            .send()
            .await
            .context("Google Drive download request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Google Drive download returned {status}: {body}"));
        }
        response
            .bytes()
            .await
            .context("Failed to read Google Drive download body")
    }
}
