pub mod config;
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod slug;
pub mod sqlite;
pub mod uploader;
pub mod video;

pub use config::{
    load_config, ClaqueteConfig, ExtractorSection, MuxSection, PathsSection, QueueSection,
};
pub use error::{ConfigError, Result};
pub use extractor::{
    find_best_video_track, find_portuguese_audio_track, normalize_subtitles, ExtractorError,
    ExtractorResult, MediaExtractor, VideoMetadata, YtDlp,
};
pub use orchestrator::{
    JobError, Orchestrator, SchedulerConfig, SubmitError, SubmitReceipt, SubmitRequest,
};
pub use slug::slugify;
pub use uploader::{
    AssetTrack, MediaUploader, MuxHost, PlaybackId, PollPolicy, RemoteAsset, RemoteVideoHost,
    UploadError, UploadOutcome, UploadResult, UploadSlot, UploadStatus,
};
pub use video::{
    CategoryAssociation, NewVideoJob, ProcessingStatus, SqliteVideoStore, SqliteVideoStoreBuilder,
    StoreError, StoreResult, VideoFilter, VideoJob,
};
