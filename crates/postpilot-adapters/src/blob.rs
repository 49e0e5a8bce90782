//! Durable blob re-hosting
//!
//! Synced files are copied out of the tenant's cloud storage into a blob
//! host we control, so analysis and publishing never depend on the remote
//! store staying reachable.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;

/// A re-hosted file.
#[derive(Debug, Clone)]
pub struct HostedBlob {
    pub url: String,
    pub public_id: String,
    pub bytes: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload file bytes and return the durable public URL.
    async fn upload(&self, filename: &str, content_type: &str, data: Bytes)
        -> Result<HostedBlob>;
}

/// Cloudinary unsigned-upload provider.
pub struct CloudinaryStore {
    http_client: reqwest::Client,
    cloud_name: String,
    upload_preset: String,
}

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    bytes: i64,
    width: Option<i64>,
    height: Option<i64>,
}

impl CloudinaryStore {
    pub fn new(cloud_name: String, upload_preset: String, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for Cloudinary")?;
        Ok(Self {
            http_client,
            cloud_name,
            upload_preset,
        })
    }

    fn upload_url(&self, content_type: &str) -> String {
        // Cloudinary routes images and videos to different endpoints.
        let resource_type = if content_type.starts_with("video/") {
            "video"
        } else {
            "image"
        };
        format!(
            "https://api.cloudinary.com/v1_1/{}/{}/upload",
            self.cloud_name, resource_type
        )
    }
}

#[async_trait]
impl BlobStore for CloudinaryStore {
    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<HostedBlob> {
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str(content_type)
            .context("Invalid content type for blob upload")?;
        let form = reqwest::multipart::Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .part("file", part);

        let response = self
            .http_client
            .post(self.upload_url(content_type))
            .multipart(form)
            .send()
            .await
            .context("Cloudinary upload request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Cloudinary upload returned {status}: {body}"));
        }

        let uploaded: CloudinaryUploadResponse = response
            .json()
            .await
            .context("Failed to decode Cloudinary upload response")?;
        Ok(HostedBlob {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
            bytes: uploaded.bytes,
            width: uploaded.width,
            height: uploaded.height,
        })
    }
}
