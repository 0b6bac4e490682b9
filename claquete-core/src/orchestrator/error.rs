use thiserror::Error;

use crate::extractor::ExtractorError;
use crate::uploader::UploadError;
use crate::video::StoreError;

/// Submission refusals. Nothing has been written when one of these
/// occurs, except for `AlreadyQueued`/`AlreadyProcessed`, which point at
/// an existing record.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("url and category are required")]
    MissingFields,
    #[error("not a youtube url: {0}")]
    InvalidUrl(String),
    #[error("video has no portuguese audio track")]
    NoPortugueseAudio,
    #[error("video has no downloadable video track")]
    NoVideoTrack,
    #[error("video already queued as {id}")]
    AlreadyQueued { id: String },
    #[error("video already processed as {id}")]
    AlreadyProcessed { id: String },
    #[error("could not inspect video: {0}")]
    Extraction(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures during the background processing of an accepted job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("format listing changed: {0}")]
    Formats(String),
}
