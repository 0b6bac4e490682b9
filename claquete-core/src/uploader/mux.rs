use std::path::Path;

use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::MuxSection;

use super::error::{UploadError, UploadResult};
use super::{PlaybackId, RemoteAsset, RemoteVideoHost, UploadSlot, UploadStatus};

/// Mux video API client, authenticated with an API token pair.
#[derive(Debug, Clone)]
pub struct MuxHost {
    client: reqwest::Client,
    api_base: String,
    token_id: String,
    token_secret: String,
    video_quality: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

impl MuxHost {
    pub fn new(config: &MuxSection) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token_id: config.token_id.clone(),
            token_secret: config.token_secret.clone(),
            video_quality: config.video_quality.clone(),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> UploadResult<T> {
        let response = builder
            .basic_auth(&self.token_id, Some(&self.token_secret))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(UploadError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|err| UploadError::Payload(err.to_string()))?;
        Ok(envelope.data)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }
}

#[async_trait]
impl RemoteVideoHost for MuxHost {
    async fn create_upload(&self) -> UploadResult<UploadSlot> {
        let payload = json!({
            "cors_origin": "*",
            "new_asset_settings": {
                "playback_policy": ["public"],
                "video_quality": self.video_quality,
                "inputs": [{
                    "generated_subtitles": [{
                        "language_code": "pt",
                        "name": "Português (gerado)"
                    }]
                }]
            }
        });
        self.request(
            self.client
                .post(self.url("/video/v1/uploads"))
                .json(&payload),
        )
        .await
    }

    async fn push_file(&self, upload_url: &str, file: &Path) -> UploadResult<()> {
        let body = tokio::fs::read(file)
            .await
            .map_err(|source| UploadError::Io {
                source,
                path: file.to_path_buf(),
            })?;
        debug!(bytes = body.len(), "sending file to upload slot");
        // The slot URL is pre-signed; no extra authentication.
        let response = self
            .client
            .put(upload_url)
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn get_upload(&self, upload_id: &str) -> UploadResult<UploadStatus> {
        self.request(
            self.client
                .get(self.url(&format!("/video/v1/uploads/{upload_id}"))),
        )
        .await
    }

    async fn get_asset(&self, asset_id: &str) -> UploadResult<RemoteAsset> {
        self.request(
            self.client
                .get(self.url(&format!("/video/v1/assets/{asset_id}"))),
        )
        .await
    }

    async fn create_playback_id(&self, asset_id: &str) -> UploadResult<PlaybackId> {
        self.request(
            self.client
                .post(self.url(&format!("/video/v1/assets/{asset_id}/playback-ids")))
                .json(&json!({ "policy": "public" })),
        )
        .await
    }
}
