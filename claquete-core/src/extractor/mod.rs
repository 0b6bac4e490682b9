mod error;
mod selection;
mod transcript;
mod ytdlp;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

pub use error::{ExtractorError, ExtractorResult};
pub use selection::{find_best_video_track, find_portuguese_audio_track};
pub use transcript::normalize_subtitles;
pub use ytdlp::YtDlp;

/// Public metadata of the video at the source.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoMetadata {
    #[serde(rename = "title")]
    pub titulo: String,
    #[serde(rename = "description")]
    pub descricao: Option<String>,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: Option<String>,
}

/// Boundary with the extraction tool. The production implementation
/// shells out to yt-dlp; tests swap in a double.
#[async_trait]
pub trait MediaExtractor: Send + Sync + 'static {
    /// Lists the available formats, one line per format.
    async fn probe_formats(&self, url: &str) -> ExtractorResult<String>;

    async fn fetch_metadata(&self, url: &str) -> ExtractorResult<VideoMetadata>;

    /// Downloads the subtitles (when any exist) and returns the file path.
    async fn fetch_subtitles(&self, url: &str, job_id: &str) -> ExtractorResult<Option<PathBuf>>;

    /// Downloads and merges the chosen tracks into a single local file.
    async fn download(
        &self,
        url: &str,
        audio_format: &str,
        video_format: &str,
        job_id: &str,
    ) -> ExtractorResult<PathBuf>;
}
