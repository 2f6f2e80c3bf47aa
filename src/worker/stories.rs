//! Expired story cleanup

use chrono::Utc;

use crate::data::Database;
use crate::error::AppError;
use crate::storage::MediaStorage;

/// Delete stories past their expiry along with their media files.
///
/// Returns how many stories were removed.
pub async fn sweep_expired_stories(
    db: &Database,
    storage: &MediaStorage,
) -> Result<usize, AppError> {
    let removed = db.delete_expired_stories(Utc::now()).await?;

    for bird in &removed {
        for key in [&bird.image_key, &bird.video_key, &bird.thumbnail_key]
            .into_iter()
            .flatten()
        {
            if let Err(error) = storage.delete(key).await {
                tracing::warn!(
                    bird_id = %bird.id,
                    key = %key,
                    %error,
                    "Failed to delete story media"
                );
            }
        }
    }

    if !removed.is_empty() {
        tracing::info!(count = removed.len(), "Expired stories removed");
    }
    Ok(removed.len())
}
