use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClaqueteConfig {
    pub paths: PathsSection,
    pub extractor: ExtractorSection,
    pub mux: MuxSection,
    pub queue: QueueSection,
}

impl ClaqueteConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.base_dir).join(path)
        }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.downloads_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.data_dir).join("videos.sqlite")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub base_dir: String,
    pub downloads_dir: String,
    pub data_dir: String,
    pub logs_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorSection {
    pub binary: String,
    pub subtitle_langs: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MuxSection {
    pub api_base: String,
    pub token_id: String,
    pub token_secret: String,
    pub playback_base: String,
    pub video_quality: String,
    pub poll_interval_seconds: u64,
    pub poll_max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSection {
    pub throttle_window_minutes: i64,
    pub throttle_pause_seconds: u64,
    pub kickoff_delay_seconds: u64,
}

impl QueueSection {
    pub fn throttle_pause(&self) -> Duration {
        Duration::from_secs(self.throttle_pause_seconds)
    }

    pub fn kickoff_delay(&self) -> Duration {
        Duration::from_secs(self.kickoff_delay_seconds)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClaqueteConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
