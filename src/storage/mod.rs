//! Local media storage module
//!
//! Handles media file upload, deletion and URL generation.

mod media;

pub use media::{
    MAX_IMAGE_BYTES, MAX_VIDEO_BYTES, MediaKind, MediaStorage, post_media_key, thumbnail_key,
};
