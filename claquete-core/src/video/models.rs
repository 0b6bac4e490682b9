use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::error::StoreError;

/// Processing state of a video in the ingestion queue.
///
/// The normal cycle is `waiting → downloading → uploading → completed`;
/// `error` is reachable from any non-terminal state. A state never
/// moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Waiting,
    Downloading,
    Uploading,
    Completed,
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Waiting => "waiting",
            ProcessingStatus::Downloading => "downloading",
            ProcessingStatus::Uploading => "uploading",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Error => "error",
        }
    }

    pub fn terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Error)
    }

    pub fn can_advance_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        match (self, next) {
            (Waiting, Downloading) | (Downloading, Uploading) | (Uploading, Completed) => true,
            (from, Error) => !from.terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(ProcessingStatus::Waiting),
            "downloading" => Ok(ProcessingStatus::Downloading),
            "uploading" => Ok(ProcessingStatus::Uploading),
            "completed" => Ok(ProcessingStatus::Completed),
            "error" => Ok(ProcessingStatus::Error),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Data needed to register a freshly submitted video.
#[derive(Debug, Clone)]
pub struct NewVideoJob {
    pub id: String,
    pub youtube_url: String,
    pub titulo: String,
    pub descricao: Option<String>,
    pub thumbnail_url: Option<String>,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoJob {
    pub id: String,
    pub youtube_url: String,
    pub titulo: String,
    pub descricao: Option<String>,
    pub thumbnail_url: Option<String>,
    pub slug: String,
    pub transcricao: String,
    pub processing_status: ProcessingStatus,
    pub asset_id: Option<String>,
    pub playback_id: Option<String>,
    pub track_id: Option<String>,
    pub url_video: Option<String>,
    pub error: Option<String>,
    pub criado_em: Option<DateTime<Utc>>,
    pub atualizado_em: Option<DateTime<Utc>>,
}

impl VideoJob {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            youtube_url: row.get("youtube_url")?,
            titulo: row.get("titulo")?,
            descricao: row.get("descricao")?,
            thumbnail_url: row.get("thumbnail_url")?,
            slug: row.get("slug")?,
            transcricao: row
                .get::<_, Option<String>>("transcricao")?
                .unwrap_or_default(),
            processing_status: row
                .get::<_, String>("processing_status")?
                .parse()
                .unwrap_or(ProcessingStatus::Waiting),
            asset_id: row.get("asset_id")?,
            playback_id: row.get("playback_id")?,
            track_id: row.get("track_id")?,
            url_video: row.get("url_video")?,
            error: row.get("error")?,
            criado_em: parse_timestamp(row.get("criado_em")?),
            atualizado_em: parse_timestamp(row.get("atualizado_em")?),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryAssociation {
    pub video_id: String,
    pub categoria_id: String,
    pub principal: bool,
}

fn parse_timestamp(value: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    value.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
}
