use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use super::error::{ExtractorError, ExtractorResult};
use super::{MediaExtractor, VideoMetadata};

/// Production extractor, built on top of the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    downloads_dir: PathBuf,
    subtitle_langs: String,
}

impl YtDlp {
    pub fn new(
        binary: impl Into<String>,
        downloads_dir: impl AsRef<Path>,
        subtitle_langs: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            downloads_dir: downloads_dir.as_ref().to_path_buf(),
            subtitle_langs: subtitle_langs.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> ExtractorResult<Output> {
        debug!(binary = %self.binary, ?args, "invoking extractor");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| ExtractorError::Spawn {
                tool: self.binary.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(ExtractorError::Tool {
                tool: self.binary.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    fn scratch_path(&self, job_id: &str, extension: &str) -> PathBuf {
        self.downloads_dir.join(format!("{job_id}.{extension}"))
    }
}

#[async_trait::async_trait]
impl MediaExtractor for YtDlp {
    async fn probe_formats(&self, url: &str) -> ExtractorResult<String> {
        let output = self.run(&["-F", "--no-playlist", url]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn fetch_metadata(&self, url: &str) -> ExtractorResult<VideoMetadata> {
        let output = self
            .run(&["--dump-json", "--no-playlist", "--skip-download", url])
            .await?;
        serde_json::from_slice(&output.stdout)
            .map_err(|err| ExtractorError::Metadata(err.to_string()))
    }

    async fn fetch_subtitles(&self, url: &str, job_id: &str) -> ExtractorResult<Option<PathBuf>> {
        let template = self.downloads_dir.join(format!("{job_id}.%(ext)s"));
        let template = template.to_string_lossy().into_owned();
        self.run(&[
            "--write-subs",
            "--write-auto-subs",
            "--sub-langs",
            &self.subtitle_langs,
            "--convert-subs",
            "srt",
            "--skip-download",
            "--no-playlist",
            "-o",
            &template,
            url,
        ])
        .await?;

        // yt-dlp embeds the language in the file name, so we look for
        // any `{job_id}.*.srt` in the scratch directory.
        let mut entries = tokio::fs::read_dir(&self.downloads_dir)
            .await
            .map_err(|source| ExtractorError::Io {
                source,
                path: self.downloads_dir.clone(),
            })?;
        let prefix = format!("{job_id}.");
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| ExtractorError::Io {
                source,
                path: self.downloads_dir.clone(),
            })?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".srt") {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    async fn download(
        &self,
        url: &str,
        audio_format: &str,
        video_format: &str,
        job_id: &str,
    ) -> ExtractorResult<PathBuf> {
        let destination = self.scratch_path(job_id, "mp4");
        let selector = format!("{video_format}+{audio_format}");
        let output_arg = destination.to_string_lossy().into_owned();
        let result = self
            .run(&[
                "-f",
                &selector,
                "--no-playlist",
                "--merge-output-format",
                "mp4",
                "--embed-subs",
                "--sub-langs",
                &self.subtitle_langs,
                "-o",
                &output_arg,
                url,
            ])
            .await;
        if let Err(err) = result {
            // Never leave a partial file behind when the tool fails
            // mid-download.
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(err);
        }
        if !destination.exists() {
            return Err(ExtractorError::MissingOutput { path: destination });
        }
        Ok(destination)
    }
}
