use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use tempfile::TempDir;

use claquete_core::{
    AssetTrack, ExtractorError, ExtractorResult, MediaExtractor, MediaUploader, Orchestrator,
    PlaybackId, PollPolicy, ProcessingStatus, RemoteAsset, RemoteVideoHost, SchedulerConfig,
    SqliteVideoStore, SubmitError, SubmitRequest, UploadResult, UploadSlot, UploadStatus,
    VideoJob, VideoMetadata,
};

const LISTING_WITH_PT: &str = "\
234 m4a   audio only      2 |    3.52MiB   129k https | audio only          mp4a.40.2  129k 44k [pt-BR] Portuguese
269 mp4   256x144     30    |    8.29MiB   303k https | avc1.4D400C    303k video only
616 mp4   1920x1080   30    |   82.44MiB  3018k https | vp09.00.40.08 3018k video only
";

const LISTING_WITHOUT_PT: &str = "\
233 m4a   audio only      2 |    3.52MiB   129k https | audio only          mp4a.40.2  129k 44k [en] English
616 mp4   1920x1080   30    |   82.44MiB  3018k https | vp09.00.40.08 3018k video only
";

struct FakeExtractor {
    downloads_dir: PathBuf,
    portuguese_audio: bool,
    fail_subtitles: bool,
}

impl FakeExtractor {
    fn new(dir: &Path) -> Self {
        Self {
            downloads_dir: dir.to_path_buf(),
            portuguese_audio: true,
            fail_subtitles: false,
        }
    }
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn probe_formats(&self, _url: &str) -> ExtractorResult<String> {
        Ok(if self.portuguese_audio {
            LISTING_WITH_PT.to_string()
        } else {
            LISTING_WITHOUT_PT.to_string()
        })
    }

    async fn fetch_metadata(&self, url: &str) -> ExtractorResult<VideoMetadata> {
        Ok(VideoMetadata {
            titulo: format!("Título de {url}"),
            descricao: Some("descrição do vídeo".into()),
            thumbnail_url: Some("https://i.ytimg.com/vi/abc/hq720.jpg".into()),
        })
    }

    async fn fetch_subtitles(&self, url: &str, job_id: &str) -> ExtractorResult<Option<PathBuf>> {
        if self.fail_subtitles {
            return Err(ExtractorError::Tool {
                tool: "yt-dlp".into(),
                status: "exit status: 1".into(),
                stderr: "no captions".into(),
            });
        }
        if url.contains("semlegenda") {
            return Ok(None);
        }
        let path = self.downloads_dir.join(format!("{job_id}.pt.srt"));
        tokio::fs::write(
            &path,
            "1\n00:00:01,000 --> 00:00:02,000\nboa noite a todos\n",
        )
        .await
        .map_err(|source| ExtractorError::Io {
            source,
            path: path.clone(),
        })?;
        Ok(Some(path))
    }

    async fn download(
        &self,
        url: &str,
        audio_format: &str,
        video_format: &str,
        job_id: &str,
    ) -> ExtractorResult<PathBuf> {
        assert_eq!(audio_format, "234");
        assert_eq!(video_format, "616");
        if url.contains("quebrado") {
            return Err(ExtractorError::Tool {
                tool: "yt-dlp".into(),
                status: "exit status: 1".into(),
                stderr: "fragment not found".into(),
            });
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        let path = self.downloads_dir.join(format!("{job_id}.mp4"));
        tokio::fs::write(&path, b"mp4")
            .await
            .map_err(|source| ExtractorError::Io {
                source,
                path: path.clone(),
            })?;
        Ok(path)
    }
}

struct InstantHost;

#[async_trait]
impl RemoteVideoHost for InstantHost {
    async fn create_upload(&self) -> UploadResult<UploadSlot> {
        Ok(UploadSlot {
            id: "up-1".into(),
            url: Some("https://storage.example/slot".into()),
        })
    }

    async fn push_file(&self, _upload_url: &str, file: &Path) -> UploadResult<()> {
        assert!(file.exists());
        Ok(())
    }

    async fn get_upload(&self, upload_id: &str) -> UploadResult<UploadStatus> {
        Ok(UploadStatus {
            id: upload_id.to_string(),
            asset_id: Some("asset-1".into()),
        })
    }

    async fn get_asset(&self, asset_id: &str) -> UploadResult<RemoteAsset> {
        Ok(RemoteAsset {
            id: asset_id.to_string(),
            playback_ids: vec![PlaybackId {
                id: "play-1".into(),
                policy: "public".into(),
            }],
            tracks: vec![AssetTrack {
                id: "text-1".into(),
                kind: "text".into(),
                text_source: Some("generated_vod".into()),
                language_code: Some("pt".into()),
            }],
        })
    }

    async fn create_playback_id(&self, _asset_id: &str) -> UploadResult<PlaybackId> {
        Ok(PlaybackId {
            id: "minted-1".into(),
            policy: "public".into(),
        })
    }
}

fn fast_scheduler() -> SchedulerConfig {
    SchedulerConfig {
        throttle_window: Duration::minutes(5),
        throttle_pause: StdDuration::from_millis(5),
        kickoff_delay: StdDuration::from_millis(5),
    }
}

fn temp_store(dir: &Path) -> SqliteVideoStore {
    let store = SqliteVideoStore::new(dir.join("videos.sqlite")).expect("create store");
    store.initialize().expect("initialize store");
    store
}

fn build(
    dir: &TempDir,
    extractor: FakeExtractor,
) -> (Orchestrator<FakeExtractor, InstantHost>, SqliteVideoStore) {
    let store = temp_store(dir.path());
    let uploader = MediaUploader::new(InstantHost, "https://stream.mux.com").with_poll_policy(
        PollPolicy {
            max_attempts: 3,
            interval: StdDuration::from_millis(1),
        },
    );
    let orchestrator = Orchestrator::new(store.clone(), extractor, uploader, fast_scheduler())
        .expect("build orchestrator");
    (orchestrator, store)
}

fn request(url: &str) -> SubmitRequest {
    SubmitRequest {
        url: url.into(),
        category_id: "noticias".into(),
        additional_categories: vec![],
    }
}

async fn wait_idle(orchestrator: &Orchestrator<FakeExtractor, InstantHost>) {
    for _ in 0..500 {
        if orchestrator.active_count().await == 0 {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("orchestrator still has active jobs");
}

async fn wait_terminal(store: &SqliteVideoStore, id: &str) -> VideoJob {
    for _ in 0..500 {
        let job = store.fetch(id).expect("fetch job");
        if job.processing_status.terminal() {
            return job;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("video {id} never reached a terminal status");
}

#[tokio::test(flavor = "multi_thread")]
async fn submitted_video_runs_to_completion() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, store) = build(&dir, FakeExtractor::new(dir.path()));

    let receipt = orchestrator
        .submit(request("https://youtu.be/abc123"))
        .await
        .unwrap();
    assert!(receipt.started);

    let done = wait_terminal(&store, &receipt.video_id).await;
    assert_eq!(done.processing_status, ProcessingStatus::Completed);
    assert_eq!(done.asset_id.as_deref(), Some("asset-1"));
    assert_eq!(done.playback_id.as_deref(), Some("play-1"));
    assert_eq!(done.track_id.as_deref(), Some("text-1"));
    assert_eq!(
        done.url_video.as_deref(),
        Some("https://stream.mux.com/play-1")
    );
    assert_eq!(done.transcricao, "boa noite a todos");
    assert!(done.error.is_none());

    // The scratch file is removed after the upload.
    wait_idle(&orchestrator).await;
    assert!(!dir.path().join(format!("{}.mp4", done.id)).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn video_without_portuguese_audio_is_rejected_without_a_row() {
    let dir = TempDir::new().unwrap();
    let mut extractor = FakeExtractor::new(dir.path());
    extractor.portuguese_audio = false;
    let (orchestrator, store) = build(&dir, extractor);

    let err = orchestrator
        .submit(request("https://youtu.be/abc123"))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::NoPortugueseAudio));
    assert!(store
        .find_by_url("https://youtu.be/abc123")
        .unwrap()
        .is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_fields_and_foreign_urls_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = build(&dir, FakeExtractor::new(dir.path()));

    let err = orchestrator
        .submit(SubmitRequest {
            url: "  ".into(),
            category_id: "noticias".into(),
            additional_categories: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::MissingFields));

    let err = orchestrator
        .submit(request("https://vimeo.com/123"))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::InvalidUrl(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_submissions_report_queue_and_history() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, store) = build(&dir, FakeExtractor::new(dir.path()));

    let receipt = orchestrator
        .submit(request("https://youtu.be/abc123"))
        .await
        .unwrap();

    // Not yet terminal: the same URL conflicts with the queue.
    let err = orchestrator
        .submit(request("https://youtu.be/abc123"))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::AlreadyQueued { ref id } if *id == receipt.video_id));

    wait_terminal(&store, &receipt.video_id).await;
    let err = orchestrator
        .submit(request("https://youtu.be/abc123"))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::AlreadyProcessed { ref id } if *id == receipt.video_id));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_download_marks_error_and_queue_advances() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, store) = build(&dir, FakeExtractor::new(dir.path()));

    let broken = orchestrator
        .submit(request("https://youtu.be/quebrado1"))
        .await
        .unwrap();
    let healthy = orchestrator
        .submit(request("https://youtu.be/bom1"))
        .await
        .unwrap();

    let failed = wait_terminal(&store, &broken.video_id).await;
    assert_eq!(failed.processing_status, ProcessingStatus::Error);
    assert!(failed.error.as_deref().unwrap().contains("fragment not found"));

    let done = wait_terminal(&store, &healthy.video_id).await;
    assert_eq!(done.processing_status, ProcessingStatus::Completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn transcript_failure_does_not_fail_the_job() {
    let dir = TempDir::new().unwrap();
    let mut extractor = FakeExtractor::new(dir.path());
    extractor.fail_subtitles = true;
    let (orchestrator, store) = build(&dir, extractor);

    let receipt = orchestrator
        .submit(request("https://youtu.be/abc123"))
        .await
        .unwrap();
    let done = wait_terminal(&store, &receipt.video_id).await;
    assert_eq!(done.processing_status, ProcessingStatus::Completed);
    assert_eq!(done.transcricao, "");
}

#[tokio::test(flavor = "multi_thread")]
async fn video_without_subtitles_completes_with_empty_transcript() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, store) = build(&dir, FakeExtractor::new(dir.path()));

    let receipt = orchestrator
        .submit(request("https://youtu.be/semlegenda1"))
        .await
        .unwrap();
    let done = wait_terminal(&store, &receipt.video_id).await;
    assert_eq!(done.processing_status, ProcessingStatus::Completed);
    assert_eq!(done.transcricao, "");
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_processes_one_video_at_a_time() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, store) = build(&dir, FakeExtractor::new(dir.path()));

    let first = orchestrator
        .submit(request("https://youtu.be/um111"))
        .await
        .unwrap();
    let second = orchestrator
        .submit(request("https://youtu.be/dois222"))
        .await
        .unwrap();

    // Never more than one video in flight, even with two queued.
    for _ in 0..50 {
        assert!(store.processing_count().unwrap() <= 1);
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }

    let first_done = wait_terminal(&store, &first.video_id).await;
    let second_done = wait_terminal(&store, &second.video_id).await;
    assert_eq!(first_done.processing_status, ProcessingStatus::Completed);
    assert_eq!(second_done.processing_status, ProcessingStatus::Completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_drains_several_videos_in_submission_order() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, store) = build(&dir, FakeExtractor::new(dir.path()));

    let mut ids = Vec::new();
    for url in [
        "https://youtu.be/aaa111",
        "https://youtu.be/bbb222",
        "https://youtu.be/ccc333",
    ] {
        ids.push(orchestrator.submit(request(url)).await.unwrap().video_id);
    }

    // Each finished worker hands the queue to the next waiting video.
    for id in &ids {
        let done = wait_terminal(&store, id).await;
        assert_eq!(done.processing_status, ProcessingStatus::Completed);
    }
    wait_idle(&orchestrator).await;
    assert_eq!(store.counts_by_status().unwrap().get("completed"), Some(&3));
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_demotes_interrupted_videos() {
    let dir = TempDir::new().unwrap();
    let store = temp_store(dir.path());
    store
        .insert_job(
            &claquete_core::NewVideoJob {
                id: "orfao".into(),
                youtube_url: "https://youtu.be/orfao".into(),
                titulo: "Órfão".into(),
                descricao: None,
                thumbnail_url: None,
                slug: "orfao".into(),
            },
            "geral",
            &[],
        )
        .unwrap();
    store
        .set_status("orfao", ProcessingStatus::Downloading)
        .unwrap();

    let uploader = MediaUploader::new(InstantHost, "https://stream.mux.com");
    let _orchestrator = Orchestrator::new(
        store.clone(),
        FakeExtractor::new(dir.path()),
        uploader,
        fast_scheduler(),
    )
    .unwrap();

    let demoted = store.fetch("orfao").unwrap();
    assert_eq!(demoted.processing_status, ProcessingStatus::Error);
    assert_eq!(
        demoted.error.as_deref(),
        Some("processing interrupted by restart")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn removing_a_video_clears_it_from_store_and_registry() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, store) = build(&dir, FakeExtractor::new(dir.path()));

    let receipt = orchestrator
        .submit(request("https://youtu.be/abc123"))
        .await
        .unwrap();
    orchestrator.remove(&receipt.video_id).await.unwrap();

    assert!(store
        .find_by_url("https://youtu.be/abc123")
        .unwrap()
        .is_none());
    assert_eq!(orchestrator.active_count().await, 0);

    let err = orchestrator.remove("inexistente").await.unwrap_err();
    assert!(matches!(
        err,
        SubmitError::Store(claquete_core::StoreError::NotFound(_))
    ));
}
