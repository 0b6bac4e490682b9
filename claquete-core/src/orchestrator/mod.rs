mod error;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::QueueSection;
use crate::extractor::{
    find_best_video_track, find_portuguese_audio_track, normalize_subtitles, MediaExtractor,
};
use crate::slug::slugify;
use crate::uploader::{MediaUploader, RemoteVideoHost};
use crate::video::{NewVideoJob, ProcessingStatus, SqliteVideoStore, VideoJob};

pub use error::{JobError, SubmitError};

const YOUTUBE_HOSTS: [&str; 5] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub url: String,
    pub category_id: String,
    pub additional_categories: Vec<String>,
}

/// Immediate response to a submission. `started` tells whether the job
/// began running right away or is waiting its turn in the queue.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub video_id: String,
    pub started: bool,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub throttle_window: Duration,
    pub throttle_pause: StdDuration,
    pub kickoff_delay: StdDuration,
}

impl SchedulerConfig {
    pub fn from_queue_config(config: &QueueSection) -> Self {
        Self {
            throttle_window: Duration::minutes(config.throttle_window_minutes),
            throttle_pause: config.throttle_pause(),
            kickoff_delay: config.kickoff_delay(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            throttle_window: Duration::minutes(5),
            throttle_pause: StdDuration::from_secs(30),
            kickoff_delay: StdDuration::from_secs(1),
        }
    }
}

/// Coordinates ingestion: validates submissions, keeps the queue
/// serialized (one active job at a time) and walks each video through
/// download, upload and registration.
pub struct Orchestrator<E: MediaExtractor, H: RemoteVideoHost> {
    inner: Arc<Inner<E, H>>,
}

struct Inner<E: MediaExtractor, H: RemoteVideoHost> {
    store: SqliteVideoStore,
    extractor: E,
    uploader: MediaUploader<H>,
    scheduler: SchedulerConfig,
    registry: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl<E: MediaExtractor, H: RemoteVideoHost> Clone for Orchestrator<E, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: MediaExtractor, H: RemoteVideoHost> Orchestrator<E, H> {
    /// Builds the orchestrator and cleans up what a previous restart
    /// left behind: jobs stuck mid-processing become `error`.
    pub fn new(
        store: SqliteVideoStore,
        extractor: E,
        uploader: MediaUploader<H>,
        scheduler: SchedulerConfig,
    ) -> Result<Self, crate::video::StoreError> {
        let demoted = store.demote_orphans()?;
        if demoted > 0 {
            warn!(count = demoted, "demoted interrupted videos to error");
        }
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                extractor,
                uploader,
                scheduler,
                registry: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn store(&self) -> &SqliteVideoStore {
        &self.inner.store
    }

    pub async fn active_count(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    /// Validates and records a submission. Returns as soon as the video
    /// is queued; processing continues in the background.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, SubmitError> {
        let url = request.url.trim();
        let category = request.category_id.trim();
        if url.is_empty() || category.is_empty() {
            return Err(SubmitError::MissingFields);
        }
        validate_youtube_url(url)?;

        let listing = self
            .inner
            .extractor
            .probe_formats(url)
            .await
            .map_err(|err| SubmitError::Extraction(err.to_string()))?;
        if find_portuguese_audio_track(&listing).is_none() {
            return Err(SubmitError::NoPortugueseAudio);
        }
        if find_best_video_track(&listing).is_none() {
            return Err(SubmitError::NoVideoTrack);
        }

        if let Some(existing) = self.inner.store.find_by_url(url)? {
            if existing.processing_status.terminal() {
                return Err(SubmitError::AlreadyProcessed { id: existing.id });
            }
            return Err(SubmitError::AlreadyQueued { id: existing.id });
        }

        let metadata = self
            .inner
            .extractor
            .fetch_metadata(url)
            .await
            .map_err(|err| SubmitError::Extraction(err.to_string()))?;

        let job = NewVideoJob {
            id: Uuid::new_v4().to_string(),
            youtube_url: url.to_string(),
            titulo: metadata.titulo.clone(),
            descricao: metadata.descricao,
            thumbnail_url: metadata.thumbnail_url,
            slug: slugify(&metadata.titulo),
        };
        self.inner
            .store
            .insert_job(&job, category, &request.additional_categories)?;
        info!(video_id = %job.id, titulo = %job.titulo, "video queued");

        let idle = self.inner.store.processing_count()? == 0;
        if idle {
            let orchestrator = self.clone();
            let delay = self.inner.scheduler.kickoff_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                orchestrator.start_next().await;
            });
        }

        Ok(SubmitReceipt {
            video_id: job.id,
            started: idle,
        })
    }

    /// Cancels (if running) and deletes a video; categories cascade.
    /// Then tries to wake the queue.
    pub async fn remove(&self, id: &str) -> Result<(), SubmitError> {
        if let Some(handle) = self.inner.registry.lock().await.remove(id) {
            handle.abort();
            warn!(video_id = %id, "aborted running job on removal");
        }
        self.inner.store.remove(id)?;
        self.start_next().await;
        Ok(())
    }

    /// Promotes the oldest waiting video if nothing is in progress.
    ///
    /// Returns a boxed future: workers re-enter this from their own
    /// spawned tasks, and boxing keeps the future type finite.
    pub fn start_next(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.start_next_inner())
    }

    /// Claiming happens under the registry lock, so two concurrent
    /// callers never pick the same job.
    async fn start_next_inner(&self) {
        let mut registry = self.inner.registry.lock().await;
        let idle = match self.inner.store.processing_count() {
            Ok(count) => count == 0,
            Err(err) => {
                error!(error = %err, "could not inspect queue");
                return;
            }
        };
        if !idle {
            return;
        }
        let job = match self.inner.store.next_waiting() {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(err) => {
                error!(error = %err, "could not fetch next waiting video");
                return;
            }
        };
        if let Err(err) = self
            .inner
            .store
            .set_status(&job.id, ProcessingStatus::Downloading)
        {
            error!(video_id = %job.id, error = %err, "could not claim video");
            return;
        }
        info!(video_id = %job.id, "video claimed for processing");

        let orchestrator = self.clone();
        let job_id = job.id.clone();
        let handle = tokio::spawn(async move {
            orchestrator.drive_job(job).await;
        });
        registry.insert(job_id, handle);
    }

    async fn drive_job(&self, job: VideoJob) {
        let job_id = job.id.clone();
        if let Err(err) = self.run_job(&job).await {
            error!(video_id = %job_id, error = %err, "video processing failed");
            if let Err(store_err) = self.inner.store.record_failure(&job_id, &err.to_string()) {
                error!(video_id = %job_id, error = %store_err, "could not record failure");
            }
        }
        self.finish_job(&job_id).await;
    }

    async fn finish_job(&self, job_id: &str) {
        self.inner.registry.lock().await.remove(job_id);
        self.start_next().await;
    }

    async fn run_job(&self, job: &VideoJob) -> Result<(), JobError> {
        self.respect_throttle(&job.id).await?;

        let transcript = self.collect_transcript(job).await;
        self.inner.store.set_transcript(&job.id, &transcript)?;

        let listing = self.inner.extractor.probe_formats(&job.youtube_url).await?;
        let audio = find_portuguese_audio_track(&listing)
            .ok_or_else(|| JobError::Formats("portuguese audio track no longer listed".into()))?;
        let video = find_best_video_track(&listing)
            .ok_or_else(|| JobError::Formats("video track no longer listed".into()))?;

        let local_file = self
            .inner
            .extractor
            .download(&job.youtube_url, &audio, &video, &job.id)
            .await?;
        info!(video_id = %job.id, file = %local_file.display(), "download finished");

        self.inner
            .store
            .set_status(&job.id, ProcessingStatus::Uploading)?;
        let outcome = self.inner.uploader.upload(&local_file).await?;
        let url_video = self.inner.uploader.playback_url(&outcome.playback_id);

        self.inner.store.complete(
            &job.id,
            &outcome.asset_id,
            &outcome.playback_id,
            outcome.track_id.as_deref(),
            &url_video,
        )?;
        info!(video_id = %job.id, asset_id = %outcome.asset_id, "video completed");

        if let Err(err) = tokio::fs::remove_file(&local_file).await {
            warn!(file = %local_file.display(), error = %err, "could not remove scratch file");
        }
        Ok(())
    }

    /// Pauses before starting when another video progressed recently, so
    /// the source is not hammered back to back.
    async fn respect_throttle(&self, job_id: &str) -> Result<(), JobError> {
        let recent = self
            .inner
            .store
            .recently_active_count(self.inner.scheduler.throttle_window, job_id)?;
        if recent > 0 {
            warn!(video_id = %job_id, recent, "recent activity detected, pausing before download");
            tokio::time::sleep(self.inner.scheduler.throttle_pause).await;
        }
        Ok(())
    }

    /// The transcript is best effort: with no subtitles, or any failure
    /// fetching them, the video proceeds with an empty transcript.
    async fn collect_transcript(&self, job: &VideoJob) -> String {
        let subtitle_file = match self
            .inner
            .extractor
            .fetch_subtitles(&job.youtube_url, &job.id)
            .await
        {
            Ok(Some(path)) => path,
            Ok(None) => {
                info!(video_id = %job.id, "no subtitles available");
                return String::new();
            }
            Err(err) => {
                warn!(video_id = %job.id, error = %err, "subtitle fetch failed");
                return String::new();
            }
        };
        let raw = match tokio::fs::read_to_string(&subtitle_file).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(video_id = %job.id, error = %err, "could not read subtitle file");
                return String::new();
            }
        };
        if let Err(err) = tokio::fs::remove_file(&subtitle_file).await {
            warn!(file = %subtitle_file.display(), error = %err, "could not remove subtitle file");
        }
        normalize_subtitles(&raw)
    }
}

fn validate_youtube_url(raw: &str) -> Result<(), SubmitError> {
    let parsed = Url::parse(raw).map_err(|_| SubmitError::InvalidUrl(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SubmitError::InvalidUrl(raw.to_string()));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| SubmitError::InvalidUrl(raw.to_string()))?;
    if !YOUTUBE_HOSTS.contains(&host) {
        return Err(SubmitError::InvalidUrl(raw.to_string()));
    }
    Ok(())
}
