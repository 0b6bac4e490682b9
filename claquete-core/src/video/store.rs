use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags};

use crate::sqlite::configure_connection;

use super::error::{StoreError, StoreResult};
use super::models::{CategoryAssociation, NewVideoJob, ProcessingStatus, VideoJob};

const VIDEOS_SCHEMA: &str = include_str!("../../../sql/videos.sql");

#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    pub status: Option<ProcessingStatus>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SqliteVideoStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqliteVideoStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqliteVideoStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> StoreResult<SqliteVideoStore> {
        let path = self.path.ok_or(StoreError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Ok(SqliteVideoStore { path, flags })
    }
}

/// Persistence for ingested videos. Each operation opens its own
/// connection, so the store can be cloned and shared across tasks.
#[derive(Debug, Clone)]
pub struct SqliteVideoStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteVideoStore {
    pub fn builder() -> SqliteVideoStoreBuilder {
        SqliteVideoStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        SqliteVideoStoreBuilder::new().path(path).build()
    }

    fn open(&self) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            StoreError::Open {
                source,
                path: self.path.clone(),
            }
        })?;
        configure_connection(&conn).map_err(|source| StoreError::Open {
            source,
            path: self.path.clone(),
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> StoreResult<()> {
        let conn = self.open()?;
        conn.execute_batch(VIDEOS_SCHEMA)?;
        Ok(())
    }

    /// Writes the video and its categories in a single transaction. The
    /// first category is always the primary one.
    pub fn insert_job(
        &self,
        job: &NewVideoJob,
        primary_category: &str,
        additional_categories: &[String],
    ) -> StoreResult<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO videos (
                id, youtube_url, titulo, descricao, thumbnail_url, slug, processing_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'waiting')",
            params![
                &job.id,
                &job.youtube_url,
                &job.titulo,
                &job.descricao,
                &job.thumbnail_url,
                &job.slug
            ],
        )?;
        tx.execute(
            "INSERT INTO videos_categorias (video_id, categoria_id, principal) VALUES (?1, ?2, 1)",
            params![&job.id, primary_category],
        )?;
        for categoria in additional_categories {
            if categoria == primary_category {
                continue;
            }
            tx.execute(
                "INSERT OR IGNORE INTO videos_categorias (video_id, categoria_id, principal)
                 VALUES (?1, ?2, 0)",
                params![&job.id, categoria],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn fetch(&self, id: &str) -> StoreResult<VideoJob> {
        let conn = self.open()?;
        conn.query_row("SELECT * FROM videos WHERE id = ?1", [id], |row| {
            VideoJob::from_row(row)
        })
        .map_err(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(id.to_string()),
            other => StoreError::Execute(other),
        })
    }

    pub fn find_by_url(&self, url: &str) -> StoreResult<Option<VideoJob>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT * FROM videos WHERE youtube_url = ?1")?;
        let mut rows = stmt.query([url])?;
        match rows.next()? {
            Some(row) => Ok(Some(VideoJob::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Advances the status following the lifecycle. Invalid transitions
    /// are rejected before touching the database.
    pub fn set_status(&self, id: &str, status: ProcessingStatus) -> StoreResult<()> {
        let current = self.fetch(id)?;
        if !current.processing_status.can_advance_to(status) {
            return Err(StoreError::InvalidTransition {
                from: current.processing_status,
                to: status,
            });
        }
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE videos SET processing_status=?1, atualizado_em=CURRENT_TIMESTAMP WHERE id=?2",
            params![status.as_str(), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn set_transcript(&self, id: &str, transcript: &str) -> StoreResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE videos SET transcricao=?1, atualizado_em=CURRENT_TIMESTAMP WHERE id=?2",
            params![transcript, id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Marks the video as failed, leaving already completed videos alone.
    pub fn record_failure(&self, id: &str, message: &str) -> StoreResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE videos SET processing_status='error', error=?1, atualizado_em=CURRENT_TIMESTAMP
             WHERE id=?2 AND processing_status != 'completed'",
            params![message, id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn complete(
        &self,
        id: &str,
        asset_id: &str,
        playback_id: &str,
        track_id: Option<&str>,
        url_video: &str,
    ) -> StoreResult<()> {
        let current = self.fetch(id)?;
        if !current
            .processing_status
            .can_advance_to(ProcessingStatus::Completed)
        {
            return Err(StoreError::InvalidTransition {
                from: current.processing_status,
                to: ProcessingStatus::Completed,
            });
        }
        let conn = self.open()?;
        conn.execute(
            "UPDATE videos SET processing_status='completed', asset_id=?1, playback_id=?2,
                    track_id=?3, url_video=?4, error=NULL, atualizado_em=CURRENT_TIMESTAMP
             WHERE id=?5",
            params![asset_id, playback_id, track_id, url_video, id],
        )?;
        Ok(())
    }

    pub fn processing_count(&self) -> StoreResult<i64> {
        let conn = self.open()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM videos WHERE processing_status IN ('downloading', 'uploading')",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Counts videos that progressed within the recent window, ignoring
    /// the ones still waiting and the running job itself.
    pub fn recently_active_count(&self, window: Duration, exclude_id: &str) -> StoreResult<i64> {
        let conn = self.open()?;
        // atualizado_em is written by SQLite's CURRENT_TIMESTAMP, so the
        // cutoff must use exactly the same textual format.
        let cutoff = (Utc::now() - window)
            .naive_utc()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM videos
             WHERE atualizado_em >= ?1 AND processing_status != 'waiting' AND id != ?2",
            params![cutoff, exclude_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn next_waiting(&self) -> StoreResult<Option<VideoJob>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM videos WHERE processing_status='waiting' ORDER BY criado_em ASC LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(VideoJob::from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn list(&self, filter: &VideoFilter) -> StoreResult<Vec<VideoJob>> {
        let conn = self.open()?;
        let mut query = String::from("SELECT * FROM videos");
        let mut params: Vec<Value> = Vec::new();
        if let Some(status) = filter.status {
            query.push_str(" WHERE processing_status = ?");
            params.push(Value::Text(status.as_str().to_string()));
        }
        query.push_str(" ORDER BY criado_em ASC");
        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ?");
            params.push(Value::Integer(limit as i64));
        }
        let mut stmt = conn.prepare(&query)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(
            params.iter().map(|value| value as &dyn rusqlite::ToSql),
        ))?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next()? {
            jobs.push(VideoJob::from_row(row)?);
        }
        Ok(jobs)
    }

    /// Full listing in arrival order, for the status route.
    pub fn queue_snapshot(&self) -> StoreResult<Vec<VideoJob>> {
        self.list(&VideoFilter::default())
    }

    pub fn counts_by_status(&self) -> StoreResult<HashMap<String, i64>> {
        let conn = self.open()?;
        let mut counts = HashMap::new();
        let mut stmt =
            conn.prepare("SELECT processing_status, COUNT(*) FROM videos GROUP BY processing_status")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            counts.insert(status, count);
        }
        Ok(counts)
    }

    pub fn categories_for(&self, id: &str) -> StoreResult<Vec<CategoryAssociation>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, categoria_id, principal FROM videos_categorias
             WHERE video_id = ?1 ORDER BY principal DESC, categoria_id ASC",
        )?;
        let mut rows = stmt.query([id])?;
        let mut associations = Vec::new();
        while let Some(row) = rows.next()? {
            associations.push(CategoryAssociation {
                video_id: row.get(0)?,
                categoria_id: row.get(1)?,
                principal: row.get::<_, i64>(2)? != 0,
            });
        }
        Ok(associations)
    }

    pub fn remove(&self, id: &str) -> StoreResult<()> {
        let conn = self.open()?;
        let affected = conn.execute("DELETE FROM videos WHERE id=?1", [id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// On daemon startup, videos left mid-processing by a restart become
    /// `error` so they do not block the queue.
    pub fn demote_orphans(&self) -> StoreResult<usize> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE videos SET processing_status='error',
                    error='processing interrupted by restart',
                    atualizado_em=CURRENT_TIMESTAMP
             WHERE processing_status IN ('downloading', 'uploading')",
            [],
        )?;
        Ok(affected as usize)
    }
}
