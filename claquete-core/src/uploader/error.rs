use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("network error talking to video host: {0}")]
    Network(String),
    #[error("video host returned an upload slot without a url")]
    MissingUploadUrl,
    #[error("upload slot rejected the file with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("asset for upload {upload_id} not ready after {attempts} attempts")]
    Timeout { upload_id: String, attempts: u32 },
    #[error("video host api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("unexpected response payload: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::Network(err.to_string())
    }
}

pub type UploadResult<T> = Result<T, UploadError>;
