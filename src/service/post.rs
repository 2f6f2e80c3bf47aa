//! Post ("bird") service
//!
//! Creation with media validation, detail, deletion and interactions.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::data::{
    Bird, Comment, CommentEntry, Database, EntityId, FeedEntry, NotificationKind, PostType,
    Profile, User, Visibility,
};
use crate::error::AppError;
use crate::metrics::{BIRDS_CREATED_TOTAL, MEDIA_UPLOADS_TOTAL};
use crate::recommendation::{IngestItem, IngestMetadata, Recommender};
use crate::service::NotificationService;
use crate::storage::{MediaKind, MediaStorage, post_media_key};
use crate::worker::ThumbnailQueue;

/// Stories disappear this long after creation
pub const STORY_LIFETIME_HOURS: i64 = 24;

/// Uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Bird creation form
#[derive(Debug, Clone, Default)]
pub struct NewBird {
    pub content: Option<String>,
    pub image: Option<MediaUpload>,
    pub video: Option<MediaUpload>,
    pub post_type: Option<String>,
    pub visibility: Option<String>,
    pub location: Option<String>,
}

/// Bird with its comment thread
#[derive(Debug, Clone)]
pub struct BirdDetail {
    pub entry: FeedEntry,
    pub comments: Vec<CommentEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveState {
    pub saved: bool,
    pub save_count: i64,
}

/// Decide the stored type: explicit stories win, then video, image, text
fn resolve_post_type(
    requested: Option<&str>,
    has_image: bool,
    has_video: bool,
) -> Result<PostType, AppError> {
    let requested = match requested.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Some(PostType::parse(value).ok_or_else(|| {
            AppError::Validation(format!("Unknown post type: {value}"))
        })?),
        None => None,
    };

    Ok(match requested {
        Some(PostType::Story) => PostType::Story,
        _ if has_video => PostType::Video,
        _ if has_image => PostType::Image,
        _ => PostType::Text,
    })
}

/// Payload for the recommendation index, if the post qualifies
pub(crate) fn ingest_item(bird: &Bird, author: &User, profile: &Profile) -> Option<IngestItem> {
    let text = bird.content.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() || !profile.allows_indexing() {
        return None;
    }

    Some(IngestItem {
        content_id: bird.id.clone(),
        text: text.to_string(),
        metadata: IngestMetadata {
            author: author.username.clone(),
            post_type: bird.post_type.clone(),
        },
    })
}

/// Post service
pub struct PostService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
    thumbnails: ThumbnailQueue,
    recommender: Arc<dyn Recommender>,
}

impl PostService {
    pub fn new(
        db: Arc<Database>,
        storage: Arc<MediaStorage>,
        thumbnails: ThumbnailQueue,
        recommender: Arc<dyn Recommender>,
    ) -> Self {
        Self {
            db,
            storage,
            thumbnails,
            recommender,
        }
    }

    fn notifications(&self) -> NotificationService {
        NotificationService::new(self.db.clone(), self.storage.clone())
    }

    /// Create a bird
    ///
    /// # Steps
    /// 1. Validate content/media and resolve type and visibility
    /// 2. Store uploaded files
    /// 3. Insert the row, queueing a thumbnail job for videos
    /// 4. Send the text to the recommendation index in the background
    pub async fn create(&self, author: &User, input: NewBird) -> Result<FeedEntry, AppError> {
        let content = input
            .content
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        if content.is_none() && input.image.is_none() && input.video.is_none() {
            return Err(AppError::Validation(
                "A bird needs text, an image or a video".to_string(),
            ));
        }

        let post_type = resolve_post_type(
            input.post_type.as_deref(),
            input.image.is_some(),
            input.video.is_some(),
        )?;
        let visibility = match input.visibility.as_deref().map(str::trim) {
            None | Some("") => Visibility::Public,
            Some(value) => Visibility::parse(value)
                .ok_or_else(|| AppError::Validation(format!("Unknown visibility: {value}")))?,
        };

        // Validate every upload before anything touches the disk
        let image = input
            .image
            .map(|upload| {
                MediaKind::Image
                    .validate(&upload.content_type, upload.data.len())
                    .map(|ext| (upload, ext))
            })
            .transpose()?;
        let video = input
            .video
            .map(|upload| {
                MediaKind::Video
                    .validate(&upload.content_type, upload.data.len())
                    .map(|ext| (upload, ext))
            })
            .transpose()?;

        let mut image_key = None;
        if let Some((upload, ext)) = image {
            let key = post_media_key(&author.username, &EntityId::new().0, ext);
            self.storage.save(&key, &upload.data).await?;
            MEDIA_UPLOADS_TOTAL.with_label_values(&["image"]).inc();
            image_key = Some(key);
        }
        let mut video_key = None;
        if let Some((upload, ext)) = video {
            let key = post_media_key(&author.username, &EntityId::new().0, ext);
            self.storage.save(&key, &upload.data).await?;
            MEDIA_UPLOADS_TOTAL.with_label_values(&["video"]).inc();
            video_key = Some(key);
        }

        let now = Utc::now();
        let bird = Bird {
            id: EntityId::new().0,
            author_id: author.id.clone(),
            content,
            image_key,
            is_processing: video_key.is_some(),
            video_key,
            thumbnail_key: None,
            post_type: post_type.as_str().to_string(),
            visibility: visibility.as_str().to_string(),
            location: input
                .location
                .map(|location| location.trim().to_string())
                .filter(|location| !location.is_empty()),
            created_at: now,
            expires_at: (post_type == PostType::Story)
                .then(|| now + Duration::hours(STORY_LIFETIME_HOURS)),
        };
        if let Err(error) = self.db.insert_bird(&bird).await {
            for key in [&bird.image_key, &bird.video_key].into_iter().flatten() {
                if let Err(delete_error) = self.storage.delete(key).await {
                    tracing::warn!(
                        key = %key,
                        error = %delete_error,
                        "Failed to delete orphaned media"
                    );
                }
            }
            return Err(error);
        }
        BIRDS_CREATED_TOTAL
            .with_label_values(&[post_type.as_str()])
            .inc();

        if bird.is_processing && !self.thumbnails.enqueue(&bird.id) {
            self.db.finish_bird_processing(&bird.id, None).await?;
        }

        if let Some(profile) = self.db.get_profile(&author.id).await? {
            if let Some(item) = ingest_item(&bird, author, &profile) {
                let recommender = self.recommender.clone();
                tokio::spawn(async move {
                    index_bird(recommender.as_ref(), item).await;
                });
            }
        }

        tracing::info!(
            bird_id = %bird.id,
            user_id = %author.id,
            post_type = post_type.as_str(),
            "Bird created"
        );

        self.db
            .get_feed_entry(&author.id, &bird.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn visible_entry(&self, viewer: &User, bird_id: &str) -> Result<FeedEntry, AppError> {
        self.db
            .get_feed_entry(&viewer.id, bird_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Bird plus comments; `NotFound` when missing or hidden from the viewer
    pub async fn detail(&self, viewer: &User, bird_id: &str) -> Result<BirdDetail, AppError> {
        let entry = self.visible_entry(viewer, bird_id).await?;
        let comments = self.db.list_comments(bird_id).await?;
        Ok(BirdDetail { entry, comments })
    }

    /// Author-only delete; media files go with the row
    pub async fn delete(&self, user: &User, bird_id: &str) -> Result<(), AppError> {
        let bird = self.db.get_bird(bird_id).await?.ok_or(AppError::NotFound)?;
        if bird.author_id != user.id {
            return Err(AppError::Forbidden);
        }

        self.db.delete_bird(&bird.id).await?;

        for key in [&bird.image_key, &bird.video_key, &bird.thumbnail_key]
            .into_iter()
            .flatten()
        {
            if let Err(error) = self.storage.delete(key).await {
                tracing::warn!(bird_id = %bird.id, key = %key, %error, "Failed to delete media");
            }
        }

        tracing::info!(bird_id = %bird.id, user_id = %user.id, "Bird deleted");
        Ok(())
    }

    pub async fn toggle_like(&self, user: &User, bird_id: &str) -> Result<LikeState, AppError> {
        let entry = self.visible_entry(user, bird_id).await?;
        let liked = self.db.toggle_like(bird_id, &user.id).await?;
        let like_count = self.db.count_likes(bird_id).await?;

        if liked {
            self.notifications()
                .notify(
                    &entry.bird.author_id,
                    Some(&user.id),
                    NotificationKind::Like,
                    format!("{} liked your bird.", user.username),
                    Some(format!("/birds/{bird_id}")),
                )
                .await?;
        }

        Ok(LikeState { liked, like_count })
    }

    pub async fn toggle_save(&self, user: &User, bird_id: &str) -> Result<SaveState, AppError> {
        self.visible_entry(user, bird_id).await?;
        let saved = self.db.toggle_save(bird_id, &user.id).await?;
        let save_count = self.db.count_saves(bird_id).await?;
        Ok(SaveState { saved, save_count })
    }

    pub async fn add_comment(
        &self,
        user: &User,
        bird_id: &str,
        content: &str,
    ) -> Result<CommentEntry, AppError> {
        let entry = self.visible_entry(user, bird_id).await?;
        let comment = self
            .insert_comment(user, &entry.bird.id, content, None)
            .await?;

        self.notifications()
            .notify(
                &entry.bird.author_id,
                Some(&user.id),
                NotificationKind::Comment,
                format!("{} commented on your bird.", user.username),
                Some(format!("/birds/{bird_id}")),
            )
            .await?;

        Ok(comment)
    }

    /// Reply to a comment; the reply lands on the parent's bird
    pub async fn reply_comment(
        &self,
        user: &User,
        parent_id: &str,
        content: &str,
    ) -> Result<CommentEntry, AppError> {
        let parent = self
            .db
            .get_comment(parent_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let entry = self.visible_entry(user, &parent.bird_id).await?;

        let reply = self
            .insert_comment(user, &entry.bird.id, content, Some(parent.id.clone()))
            .await?;

        self.notifications()
            .notify(
                &parent.author_id,
                Some(&user.id),
                NotificationKind::Comment,
                format!("{} replied to your comment.", user.username),
                Some(format!("/birds/{}", entry.bird.id)),
            )
            .await?;

        Ok(reply)
    }

    async fn insert_comment(
        &self,
        user: &User,
        bird_id: &str,
        content: &str,
        parent_id: Option<String>,
    ) -> Result<CommentEntry, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".to_string()));
        }

        let comment = Comment {
            id: EntityId::new().0,
            bird_id: bird_id.to_string(),
            author_id: user.id.clone(),
            content: content.to_string(),
            parent_id,
            created_at: Utc::now(),
        };
        self.db.insert_comment(&comment).await?;

        let author_avatar_key = self
            .db
            .get_profile(&user.id)
            .await?
            .and_then(|profile| profile.avatar_key);

        Ok(CommentEntry {
            comment,
            author_username: user.username.clone(),
            author_avatar_key,
        })
    }

    /// The comment author or the bird author may delete
    pub async fn delete_comment(&self, user: &User, comment_id: &str) -> Result<(), AppError> {
        let comment = self
            .db
            .get_comment(comment_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let bird_author = self
            .db
            .get_bird(&comment.bird_id)
            .await?
            .map(|bird| bird.author_id);

        if comment.author_id != user.id && bird_author.as_deref() != Some(user.id.as_str()) {
            return Err(AppError::Forbidden);
        }

        self.db.delete_comment(&comment.id).await?;
        Ok(())
    }

    /// Acknowledge a share; only recorded in the audit log
    pub async fn share(&self, user: &User, bird_id: &str) -> Result<(), AppError> {
        self.visible_entry(user, bird_id).await?;
        tracing::info!(target: "audit", user_id = %user.id, bird_id, "Bird shared");
        Ok(())
    }

    /// Acknowledge a report; only recorded in the audit log
    pub async fn report(
        &self,
        user: &User,
        bird_id: &str,
        reason: Option<&str>,
    ) -> Result<(), AppError> {
        self.visible_entry(user, bird_id).await?;
        tracing::warn!(
            target: "audit",
            user_id = %user.id,
            bird_id,
            reason = reason.unwrap_or_default(),
            "Bird reported"
        );
        Ok(())
    }
}

/// Send one post to the recommendation index; failures are only logged
pub(crate) async fn index_bird(recommender: &dyn Recommender, item: IngestItem) -> bool {
    let content_id = item.content_id.clone();
    match recommender.ingest(item).await {
        Ok(()) => {
            tracing::debug!(bird_id = %content_id, "Bird indexed");
            true
        }
        Err(error) => {
            tracing::warn!(bird_id = %content_id, %error, "Recommendation ingest failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::MockRecommender;
    use crate::service::test_support::{create_test_db, create_test_storage, create_user};
    use tempfile::TempDir;

    fn quiet_recommender() -> Arc<dyn Recommender> {
        let mut mock = MockRecommender::new();
        mock.expect_ingest().returning(|_| Ok(()));
        Arc::new(mock)
    }

    async fn service(temp_dir: &TempDir, db: Arc<Database>) -> PostService {
        let (queue, _receiver) = ThumbnailQueue::new(8);
        PostService::new(db, create_test_storage(temp_dir), queue, quiet_recommender())
    }

    fn text(content: &str) -> NewBird {
        NewBird {
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn post_type_resolution_order() {
        assert_eq!(resolve_post_type(None, true, true).unwrap(), PostType::Video);
        assert_eq!(resolve_post_type(None, true, false).unwrap(), PostType::Image);
        assert_eq!(resolve_post_type(None, false, false).unwrap(), PostType::Text);
        assert_eq!(
            resolve_post_type(Some("story"), false, true).unwrap(),
            PostType::Story
        );
        assert_eq!(
            resolve_post_type(Some("text"), true, false).unwrap(),
            PostType::Image
        );
        assert!(resolve_post_type(Some("poll"), false, false).is_err());
    }

    #[tokio::test]
    async fn empty_bird_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let service = service(&temp_dir, db).await;

        assert!(matches!(
            service.create(&alice, text("   ")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn story_gets_expiry() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let service = service(&temp_dir, db).await;

        let mut input = text("sunset");
        input.post_type = Some("story".to_string());
        let entry = service.create(&alice, input).await.unwrap();

        let expires_at = entry.bird.expires_at.unwrap();
        let lifetime = expires_at - entry.bird.created_at;
        assert_eq!(lifetime.num_hours(), STORY_LIFETIME_HOURS);
    }

    #[tokio::test]
    async fn video_is_queued_for_thumbnail() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let (queue, mut receiver) = ThumbnailQueue::new(8);
        let service = PostService::new(
            db.clone(),
            create_test_storage(&temp_dir),
            queue,
            quiet_recommender(),
        );

        let input = NewBird {
            video: Some(MediaUpload {
                content_type: "video/mp4".to_string(),
                data: vec![0u8; 64],
            }),
            ..Default::default()
        };
        let entry = service.create(&alice, input).await.unwrap();

        assert_eq!(entry.bird.post_type, "video");
        assert!(entry.bird.is_processing);
        assert!(
            entry
                .bird
                .video_key
                .as_deref()
                .unwrap()
                .starts_with("posts/alice/")
        );
        assert_eq!(receiver.recv().await.unwrap(), entry.bird.id);
    }

    #[tokio::test]
    async fn full_thumbnail_queue_clears_processing() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let (queue, receiver) = ThumbnailQueue::new(1);
        drop(receiver);
        let service = PostService::new(
            db.clone(),
            create_test_storage(&temp_dir),
            queue,
            quiet_recommender(),
        );

        let input = NewBird {
            video: Some(MediaUpload {
                content_type: "video/webm".to_string(),
                data: vec![0u8; 16],
            }),
            ..Default::default()
        };
        let entry = service.create(&alice, input).await.unwrap();

        let stored = db.get_bird(&entry.bird.id).await.unwrap().unwrap();
        assert!(!stored.is_processing);
    }

    #[tokio::test]
    async fn unsupported_image_type_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let service = service(&temp_dir, db).await;

        let input = NewBird {
            image: Some(MediaUpload {
                content_type: "image/tiff".to_string(),
                data: vec![0u8; 16],
            }),
            ..Default::default()
        };
        assert!(service.create(&alice, input).await.is_err());
    }

    fn count_files(dir: &std::path::Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .flatten()
            .map(|entry| {
                let path = entry.path();
                if path.is_dir() { count_files(&path) } else { 1 }
            })
            .sum()
    }

    #[tokio::test]
    async fn failed_insert_removes_saved_media() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let service = service(&temp_dir, db.clone()).await;

        // Author row is missing, so the insert breaks the foreign key
        let ghost = User {
            id: EntityId::new().0,
            username: "ghost".to_string(),
            ..alice.clone()
        };
        let input = NewBird {
            image: Some(MediaUpload {
                content_type: "image/png".to_string(),
                data: vec![0u8; 16],
            }),
            ..Default::default()
        };
        assert!(service.create(&ghost, input).await.is_err());
        assert_eq!(count_files(&temp_dir.path().join("media")), 0);
    }

    #[tokio::test]
    async fn only_author_deletes() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let service = service(&temp_dir, db.clone()).await;

        let entry = service.create(&alice, text("mine")).await.unwrap();
        assert!(matches!(
            service.delete(&bob, &entry.bird.id).await,
            Err(AppError::Forbidden)
        ));
        service.delete(&alice, &entry.bird.id).await.unwrap();
        assert!(db.get_bird(&entry.bird.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn like_notifies_author_once() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let service = service(&temp_dir, db.clone()).await;

        let entry = service.create(&alice, text("hello")).await.unwrap();
        let state = service.toggle_like(&bob, &entry.bird.id).await.unwrap();
        assert_eq!(
            state,
            LikeState {
                liked: true,
                like_count: 1
            }
        );
        // Own like does not notify
        service.toggle_like(&alice, &entry.bird.id).await.unwrap();

        assert_eq!(db.count_unread_notifications(&alice.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reply_attaches_to_parent_bird() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let service = service(&temp_dir, db.clone()).await;

        let entry = service.create(&alice, text("hello")).await.unwrap();
        let parent = service
            .add_comment(&bob, &entry.bird.id, "first!")
            .await
            .unwrap();
        let reply = service
            .reply_comment(&alice, &parent.comment.id, "thanks")
            .await
            .unwrap();

        assert_eq!(reply.comment.bird_id, entry.bird.id);
        assert_eq!(reply.comment.parent_id.as_deref(), Some(parent.comment.id.as_str()));
        assert!(matches!(
            service.reply_comment(&alice, "missing", "hi").await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn bird_author_may_delete_any_comment() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _db_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let carol = create_user(&db, "carol").await;
        let service = service(&temp_dir, db.clone()).await;

        let entry = service.create(&alice, text("hello")).await.unwrap();
        let comment = service
            .add_comment(&bob, &entry.bird.id, "hey")
            .await
            .unwrap();

        assert!(matches!(
            service.delete_comment(&carol, &comment.comment.id).await,
            Err(AppError::Forbidden)
        ));
        service
            .delete_comment(&alice, &comment.comment.id)
            .await
            .unwrap();
    }

    #[test]
    fn indexing_respects_privacy_opt_out() {
        let now = Utc::now();
        let author = User {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            is_active: true,
            created_at: now,
        };
        let bird = Bird {
            id: "b1".to_string(),
            author_id: "u1".to_string(),
            content: Some("  hello world ".to_string()),
            image_key: None,
            video_key: None,
            thumbnail_key: None,
            post_type: "text".to_string(),
            visibility: "public".to_string(),
            location: None,
            is_processing: false,
            created_at: now,
            expires_at: None,
        };
        let mut profile = Profile::empty("u1", now);

        let item = ingest_item(&bird, &author, &profile).unwrap();
        assert_eq!(item.text, "hello world");
        assert_eq!(item.metadata.author, "alice");

        profile.privacy_settings = r#"{"recommendation_indexing": false}"#.to_string();
        assert!(ingest_item(&bird, &author, &profile).is_none());
    }

    #[tokio::test]
    async fn ingest_failure_is_swallowed() {
        let mut mock = MockRecommender::new();
        mock.expect_ingest()
            .times(1)
            .returning(|_| Err(AppError::Upstream("down".to_string())));

        let item = IngestItem {
            content_id: "b1".to_string(),
            text: "hello".to_string(),
            metadata: IngestMetadata {
                author: "alice".to_string(),
                post_type: "text".to_string(),
            },
        };
        assert!(!index_bird(&mock, item).await);
    }
}
