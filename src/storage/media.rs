//! Media storage on the local filesystem
//!
//! Handles upload, delete, and URL generation for media files.
//! Files are served by the router under the configured public path.

use std::path::{Component, Path, PathBuf};

use crate::error::AppError;

/// 10 MiB
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
/// 40 MiB
pub const MAX_VIDEO_BYTES: usize = 40 * 1024 * 1024;

/// Upload category with its own size limit and accepted MIME types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            Self::Image => MAX_IMAGE_BYTES,
            Self::Video => MAX_VIDEO_BYTES,
        }
    }

    /// File extension for an accepted content type
    pub fn extension_for(&self, content_type: &str) -> Option<&'static str> {
        match (self, content_type) {
            (Self::Image, "image/jpeg") => Some("jpg"),
            (Self::Image, "image/png") => Some("png"),
            (Self::Image, "image/gif") => Some("gif"),
            (Self::Image, "image/webp") => Some("webp"),
            (Self::Video, "video/mp4") => Some("mp4"),
            (Self::Video, "video/webm") => Some("webm"),
            (Self::Video, "video/quicktime") => Some("mov"),
            _ => None,
        }
    }

    /// Check size and type, returning the file extension to store under
    pub fn validate(&self, content_type: &str, len: usize) -> Result<&'static str, AppError> {
        if len > self.max_bytes() {
            return Err(AppError::PayloadTooLarge(format!(
                "{} exceeds {} MiB",
                self.as_str(),
                self.max_bytes() / (1024 * 1024)
            )));
        }
        self.extension_for(content_type).ok_or_else(|| {
            AppError::Unprocessable(format!(
                "Unsupported {} type: {}",
                self.as_str(),
                content_type
            ))
        })
    }
}

/// Media storage service
///
/// Writes files below `root` and maps keys to public URLs.
pub struct MediaStorage {
    /// Directory files are written to
    root: PathBuf,
    /// URL prefix the directory is served under, e.g. "/media"
    public_path: String,
}

impl MediaStorage {
    /// Create the storage, making sure the root directory exists
    pub fn new(config: &crate::config::MediaConfig) -> Result<Self, AppError> {
        std::fs::create_dir_all(&config.root)?;
        Ok(Self {
            root: config.root.clone(),
            public_path: config.public_path.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a key.
    ///
    /// Keys must be relative and free of `..` segments.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(AppError::Storage(format!("Invalid media key: {}", key)));
        }
        Ok(self.root.join(relative))
    }

    /// Write a file and return its public URL
    ///
    /// # Example
    /// ```ignore
    /// let url = storage.save("posts/alice/01H....jpg", bytes).await?;
    /// // Returns: /media/posts/alice/01H....jpg
    /// ```
    pub async fn save(&self, key: &str, data: &[u8]) -> Result<String, AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        tracing::debug!(key, bytes = data.len(), "Stored media file");
        Ok(self.public_url(key))
    }

    /// Delete a file; a missing file is not an error
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Get public URL for a key
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_path, key)
    }

    /// Avatar URL, or a generated placeholder showing `name`
    pub fn avatar_url(&self, key: Option<&str>, name: &str) -> String {
        match key {
            Some(key) => self.public_url(key),
            None => format!(
                "https://ui-avatars.com/api/?name={}&background=random",
                urlencoding::encode(name)
            ),
        }
    }
}

/// Key for a post upload: `posts/<username>/<id>.<ext>`
pub fn post_media_key(username: &str, id: &str, ext: &str) -> String {
    format!("posts/{}/{}.{}", username, id, ext)
}

/// Key for a video thumbnail: `posts/<username>/thumbnails/<stem>_thumb.jpg`
pub fn thumbnail_key(username: &str, video_key: &str) -> String {
    let stem = Path::new(video_key)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("video");
    format!("posts/{}/thumbnails/{}_thumb.jpg", username, stem)
}
