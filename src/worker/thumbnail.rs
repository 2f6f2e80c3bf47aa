//! Video thumbnail extraction
//!
//! Video posts are created with `is_processing = true` and their id is pushed
//! onto a bounded queue. A single worker task pulls ids, grabs the frame at
//! one second with ffmpeg and clears the processing flag whatever happens.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::mpsc;

use crate::data::Database;
use crate::error::AppError;
use crate::metrics::THUMBNAIL_JOBS_TOTAL;
use crate::storage::{MediaStorage, thumbnail_key};

pub const QUEUE_CAPACITY: usize = 256;

/// Producer side of the thumbnail queue
#[derive(Clone)]
pub struct ThumbnailQueue {
    sender: mpsc::Sender<String>,
}

impl ThumbnailQueue {
    /// Create the queue and its receiving end
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Enqueue without waiting; false when the queue is full or closed
    pub fn enqueue(&self, bird_id: &str) -> bool {
        match self.sender.try_send(bird_id.to_string()) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(bird_id, %error, "Thumbnail queue rejected job");
                THUMBNAIL_JOBS_TOTAL.with_label_values(&["rejected"]).inc();
                false
            }
        }
    }
}

/// Everything a job needs
pub struct ThumbnailWorker {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
    ffmpeg_path: String,
}

/// Outcome of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Thumbnail(String),
    NoThumbnail,
    Missing,
}

impl ThumbnailWorker {
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>, ffmpeg_path: String) -> Self {
        Self {
            db,
            storage,
            ffmpeg_path,
        }
    }

    /// Consume jobs until every producer is dropped
    pub fn spawn(self, mut receiver: mpsc::Receiver<String>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Thumbnail worker started");
            while let Some(bird_id) = receiver.recv().await {
                match self.process(&bird_id).await {
                    Ok(outcome) => tracing::debug!(%bird_id, ?outcome, "Thumbnail job finished"),
                    Err(error) => tracing::error!(%bird_id, %error, "Thumbnail job failed"),
                }
            }
            tracing::info!("Thumbnail worker stopped");
        })
    }

    /// Process one bird; the processing flag is cleared on every path
    pub async fn process(&self, bird_id: &str) -> Result<JobOutcome, AppError> {
        let bird = match self.db.get_bird(bird_id).await {
            Ok(bird) => bird,
            Err(error) => {
                THUMBNAIL_JOBS_TOTAL.with_label_values(&["failed"]).inc();
                if let Err(clear_error) = self.db.finish_bird_processing(bird_id, None).await {
                    tracing::error!(bird_id, %clear_error, "Failed to clear processing flag");
                }
                return Err(error);
            }
        };
        let Some(bird) = bird else {
            tracing::warn!(bird_id, "Bird deleted before thumbnail processing");
            THUMBNAIL_JOBS_TOTAL.with_label_values(&["missing"]).inc();
            return Ok(JobOutcome::Missing);
        };

        let extracted = match bird.video_key.as_deref() {
            Some(video_key) => self.extract(&bird.author_id, video_key).await,
            None => Ok(None),
        };

        let thumbnail = match extracted {
            Ok(thumbnail) => thumbnail,
            Err(error) => {
                tracing::warn!(bird_id, %error, "Thumbnail extraction failed");
                None
            }
        };

        self.db
            .finish_bird_processing(bird_id, thumbnail.as_deref())
            .await?;

        match thumbnail {
            Some(key) => {
                THUMBNAIL_JOBS_TOTAL.with_label_values(&["success"]).inc();
                Ok(JobOutcome::Thumbnail(key))
            }
            None => {
                THUMBNAIL_JOBS_TOTAL.with_label_values(&["failed"]).inc();
                Ok(JobOutcome::NoThumbnail)
            }
        }
    }

    async fn extract(&self, author_id: &str, video_key: &str) -> Result<Option<String>, AppError> {
        let author = self
            .db
            .get_user(author_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let video_path = self.storage.path_for(video_key)?;
        let thumb_key = thumbnail_key(&author.username, video_key);
        let thumb_path = self.storage.path_for(&thumb_key)?;
        if let Some(parent) = thumb_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let status = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(&video_path)
            .args(["-ss", "00:00:01.000", "-vframes", "1"])
            .arg(&thumb_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "ffmpeg exited with {status}"
            )));
        }

        if tokio::fs::try_exists(&thumb_path).await.unwrap_or(false) {
            Ok(Some(thumb_key))
        } else {
            Ok(None)
        }
    }
}
