mod error;
mod mux;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

pub use error::{UploadError, UploadResult};
pub use mux::MuxHost;

/// Direct upload slot created on the video host.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSlot {
    pub id: String,
    pub url: Option<String>,
}

/// State of an upload slot; `asset_id` shows up once the host finishes
/// ingesting the file.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadStatus {
    pub id: String,
    pub asset_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackId {
    pub id: String,
    pub policy: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetTrack {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text_source: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAsset {
    pub id: String,
    #[serde(default)]
    pub playback_ids: Vec<PlaybackId>,
    #[serde(default)]
    pub tracks: Vec<AssetTrack>,
}

/// Remote video host API. The production implementation talks to Mux;
/// tests use a scripted host.
#[async_trait]
pub trait RemoteVideoHost: Send + Sync + 'static {
    async fn create_upload(&self) -> UploadResult<UploadSlot>;
    /// Sends the file bytes to the slot's pre-signed URL.
    async fn push_file(&self, upload_url: &str, file: &Path) -> UploadResult<()>;
    async fn get_upload(&self, upload_id: &str) -> UploadResult<UploadStatus>;
    async fn get_asset(&self, asset_id: &str) -> UploadResult<RemoteAsset>;
    async fn create_playback_id(&self, asset_id: &str) -> UploadResult<PlaybackId>;
}

/// How often and how many times to poll the host until the asset exists.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(10),
        }
    }
}

/// Final result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub asset_id: String,
    pub playback_id: String,
    pub track_id: Option<String>,
}

/// Drives the full upload cycle: creates the slot, pushes the file and
/// waits for the host to materialize the asset.
pub struct MediaUploader<H: RemoteVideoHost> {
    host: H,
    playback_base: String,
    poll: PollPolicy,
}

impl<H: RemoteVideoHost> MediaUploader<H> {
    pub fn new(host: H, playback_base: impl Into<String>) -> Self {
        let playback_base: String = playback_base.into();
        Self {
            host,
            playback_base: playback_base.trim_end_matches('/').to_string(),
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Streaming URL for a public playback id.
    pub fn playback_url(&self, playback_id: &str) -> String {
        format!("{}/{playback_id}", self.playback_base)
    }

    pub async fn upload(&self, file: &Path) -> UploadResult<UploadOutcome> {
        let slot = self.host.create_upload().await?;
        let url = slot.url.as_deref().ok_or(UploadError::MissingUploadUrl)?;
        info!(upload_id = %slot.id, "upload slot created");

        self.host.push_file(url, file).await?;
        let asset_id = self.wait_for_asset(&slot.id).await?;
        info!(upload_id = %slot.id, asset_id = %asset_id, "asset ready");

        let asset = self.host.get_asset(&asset_id).await?;
        let playback_id = match asset
            .playback_ids
            .iter()
            .find(|playback| playback.policy == "public")
        {
            Some(playback) => playback.id.clone(),
            None => self.host.create_playback_id(&asset_id).await?.id,
        };
        let track_id = find_generated_portuguese_track(&asset.tracks);

        Ok(UploadOutcome {
            asset_id,
            playback_id,
            track_id,
        })
    }

    async fn wait_for_asset(&self, upload_id: &str) -> UploadResult<String> {
        for attempt in 0..self.poll.max_attempts {
            let status = self.host.get_upload(upload_id).await?;
            if let Some(asset_id) = status.asset_id {
                return Ok(asset_id);
            }
            debug!(upload_id, attempt, "asset not ready yet");
            tokio::time::sleep(self.poll.interval).await;
        }
        Err(UploadError::Timeout {
            upload_id: upload_id.to_string(),
            attempts: self.poll.max_attempts,
        })
    }
}

/// Auto-generated Portuguese subtitle track, when the host has already
/// produced one.
fn find_generated_portuguese_track(tracks: &[AssetTrack]) -> Option<String> {
    tracks
        .iter()
        .find(|track| {
            track.kind == "text"
                && track
                    .text_source
                    .as_deref()
                    .map(|source| source.starts_with("generated"))
                    .unwrap_or(false)
                && track
                    .language_code
                    .as_deref()
                    .map(|lang| lang.starts_with("pt"))
                    .unwrap_or(false)
        })
        .map(|track| track.id.clone())
}
