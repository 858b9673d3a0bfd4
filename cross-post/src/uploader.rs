//! Object-store client used to turn raw media bytes into public URLs
//!
//! The library only depends on the `ObjectStoreUploader` capability; this is
//! the CLI's minimal implementation of it: PUT the bytes to a configured
//! public bucket and hand back the resulting URL.

use async_trait::async_trait;
use libcrosscast::classify;
use libcrosscast::error::PublishError;
use libcrosscast::{MediaKind, ObjectStoreUploader};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    /// Base URL of the publicly readable bucket, e.g.
    /// `https://media.example.com/uploads`.
    pub base_url: String,
    /// Optional bearer token for the PUT calls.
    #[serde(default)]
    pub token: Option<String>,
}

pub struct PutUploader {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl PutUploader {
    pub fn new(config: ObjectStoreConfig) -> libcrosscast::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PublishError::unknown(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn extension_for(mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "video/mp4" => "mp4",
            "video/quicktime" => "mov",
            "video/webm" => "webm",
            _ => "bin",
        }
    }
}

#[async_trait]
impl ObjectStoreUploader for PutUploader {
    async fn upload(
        &self,
        data: &[u8],
        mime_type: &str,
        kind: MediaKind,
    ) -> Result<String, PublishError> {
        let context = "object store upload";
        let key = format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            Self::extension_for(mime_type)
        );
        let url = format!("{}/{}", self.base_url, key);

        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(data.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify::classify_transport(context, &e))?;

        if !response.status().is_success() {
            return Err(classify::from_response(context, response).await);
        }

        tracing::debug!(url = %url, kind = %kind, "uploaded media to object store");
        Ok(url)
    }
}

/// Stand-in uploader for setups without an object store. Every upload fails,
/// so raw-bytes media simply drops out during normalization.
pub struct NoObjectStore;

#[async_trait]
impl ObjectStoreUploader for NoObjectStore {
    async fn upload(
        &self,
        _data: &[u8],
        _mime_type: &str,
        _kind: MediaKind,
    ) -> Result<String, PublishError> {
        Err(PublishError::validation(
            "no object store configured; raw media files cannot be resolved to public URLs",
        ))
    }
}
