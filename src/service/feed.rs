//! Feed and discovery service
//!
//! Home timeline (optionally reordered by the recommendation service),
//! stories, explore, reels, search and hashtag pages.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{Database, FeedEntry, RankingCache, User, UserSummary, apply_ordering};
use crate::error::AppError;
use crate::recommendation::Recommender;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 40;
pub const EXPLORE_SIZE: i64 = 50;
pub const REELS_SIZE: i64 = 10;
pub const SEARCH_USER_LIMIT: i64 = 10;
pub const SEARCH_BIRD_LIMIT: i64 = 20;

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`
pub fn page_size(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE)
}

/// Search results
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub users: Vec<UserSummary>,
    pub birds: Vec<FeedEntry>,
}

/// Feed service
pub struct FeedService {
    db: Arc<Database>,
    ranking_cache: Arc<RankingCache>,
    recommender: Arc<dyn Recommender>,
    rank_enabled: bool,
}

impl FeedService {
    pub fn new(
        db: Arc<Database>,
        ranking_cache: Arc<RankingCache>,
        recommender: Arc<dyn Recommender>,
        rank_enabled: bool,
    ) -> Self {
        Self {
            db,
            ranking_cache,
            recommender,
            rank_enabled,
        }
    }

    /// Home timeline page
    ///
    /// Candidates come from the database newest first. With ranking on, the
    /// page is reordered by the recommendation service; when that call fails
    /// the viewer's last good ordering is reused, else the page stays
    /// chronological.
    pub async fn home(
        &self,
        viewer: &User,
        max_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let entries = self
            .db
            .home_feed(&viewer.id, max_id, page_size(limit))
            .await?;

        if !self.rank_enabled || entries.len() < 2 {
            return Ok(entries);
        }

        let candidate_ids: Vec<String> = entries.iter().map(|e| e.bird.id.clone()).collect();
        match self
            .recommender
            .rank(viewer.id.clone(), candidate_ids)
            .await
        {
            Ok(ranked) => {
                let ordered = apply_ordering(entries, &ranked, |e| e.bird.id.as_str());
                self.ranking_cache.insert(&viewer.id, ranked).await;
                Ok(ordered)
            }
            Err(error) => {
                tracing::warn!(user_id = %viewer.id, %error, "Feed ranking failed, using fallback");
                match self.ranking_cache.get(&viewer.id).await {
                    Some(cached) => Ok(apply_ordering(entries, &cached, |e| e.bird.id.as_str())),
                    None => Ok(entries),
                }
            }
        }
    }

    pub async fn stories(&self, viewer: &User) -> Result<Vec<FeedEntry>, AppError> {
        self.db.active_stories(&viewer.id, Utc::now()).await
    }

    pub async fn explore(&self, viewer: &User) -> Result<Vec<FeedEntry>, AppError> {
        self.db.explore_feed(&viewer.id, EXPLORE_SIZE).await
    }

    pub async fn reels(&self, viewer: &User) -> Result<Vec<FeedEntry>, AppError> {
        self.db.reels_feed(&viewer.id, REELS_SIZE).await
    }

    /// Users and public birds matching `query`; blank queries match nothing
    pub async fn search(&self, viewer: &User, query: &str) -> Result<SearchResults, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::default());
        }

        let users = self.db.search_users(query, SEARCH_USER_LIMIT).await?;
        let birds = self
            .db
            .search_birds(&viewer.id, query, SEARCH_BIRD_LIMIT)
            .await?;
        Ok(SearchResults { users, birds })
    }

    /// Public birds tagged `#tag`; a leading `#` on the input is ignored
    pub async fn hashtag(
        &self,
        viewer: &User,
        tag: &str,
        max_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let tag = tag.trim().trim_start_matches('#');
        if tag.is_empty() {
            return Ok(Vec::new());
        }
        self.db
            .hashtag_birds(&viewer.id, tag, max_id, page_size(limit))
            .await
    }

    pub async fn saved(
        &self,
        viewer: &User,
        limit: Option<i64>,
    ) -> Result<Vec<FeedEntry>, AppError> {
        self.db.saved_birds(&viewer.id, page_size(limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Bird, EntityId};
    use crate::recommendation::MockRecommender;
    use crate::service::test_support::{create_test_db, create_user};
    use std::time::Duration;

    async fn post(db: &Database, author: &User, content: &str) -> String {
        let bird = Bird {
            id: EntityId::new().0,
            author_id: author.id.clone(),
            content: Some(content.to_string()),
            image_key: None,
            video_key: None,
            thumbnail_key: None,
            post_type: "text".to_string(),
            visibility: "public".to_string(),
            location: None,
            is_processing: false,
            created_at: Utc::now(),
            expires_at: None,
        };
        db.insert_bird(&bird).await.unwrap();
        // ULIDs are only ordered across milliseconds
        tokio::time::sleep(Duration::from_millis(2)).await;
        bird.id
    }

    fn cache() -> Arc<RankingCache> {
        Arc::new(RankingCache::new(100, Duration::from_secs(60)))
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(page_size(None), 20);
        assert_eq!(page_size(Some(100)), 40);
        assert_eq!(page_size(Some(0)), 1);
        assert_eq!(page_size(Some(5)), 5);
    }

    #[tokio::test]
    async fn ranking_reorders_and_is_cached() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let first = post(&db, &alice, "one").await;
        let second = post(&db, &alice, "two").await;

        let ranked = vec![first.clone(), second.clone()];
        let mut mock = MockRecommender::new();
        mock.expect_rank()
            .times(1)
            .returning(move |_, _| Ok(ranked.clone()));

        let cache = cache();
        let service = FeedService::new(db, cache.clone(), Arc::new(mock), true);
        let feed = service.home(&alice, None, None).await.unwrap();

        let ids: Vec<_> = feed.iter().map(|e| e.bird.id.clone()).collect();
        assert_eq!(ids, vec![first.clone(), second.clone()]);
        assert_eq!(
            cache.get(&alice.id).await.unwrap().as_slice(),
            &[first, second]
        );
    }

    #[tokio::test]
    async fn ranking_failure_uses_cached_ordering() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let first = post(&db, &alice, "one").await;
        let second = post(&db, &alice, "two").await;
        let third = post(&db, &alice, "three").await;

        let cache = cache();
        cache
            .insert(&alice.id, vec![second.clone(), first.clone()])
            .await;

        let mut mock = MockRecommender::new();
        mock.expect_rank()
            .returning(|_, _| Err(AppError::Upstream("down".to_string())));

        let service = FeedService::new(db, cache, Arc::new(mock), true);
        let feed = service.home(&alice, None, None).await.unwrap();

        let ids: Vec<_> = feed.iter().map(|e| e.bird.id.clone()).collect();
        assert_eq!(ids, vec![second, first, third]);
    }

    #[tokio::test]
    async fn ranking_failure_without_cache_stays_chronological() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let first = post(&db, &alice, "one").await;
        let second = post(&db, &alice, "two").await;

        let mut mock = MockRecommender::new();
        mock.expect_rank()
            .returning(|_, _| Err(AppError::Upstream("down".to_string())));

        let service = FeedService::new(db, cache(), Arc::new(mock), true);
        let feed = service.home(&alice, None, None).await.unwrap();

        let ids: Vec<_> = feed.iter().map(|e| e.bird.id.clone()).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn ranking_disabled_never_calls_service() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        post(&db, &alice, "one").await;
        post(&db, &alice, "two").await;

        let mut mock = MockRecommender::new();
        mock.expect_rank().times(0);

        let service = FeedService::new(db, cache(), Arc::new(mock), false);
        assert_eq!(service.home(&alice, None, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_search_and_hashtag_return_nothing() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        post(&db, &alice, "loving #rust today").await;

        let service = FeedService::new(db, cache(), Arc::new(MockRecommender::new()), false);

        let results = service.search(&alice, "   ").await.unwrap();
        assert!(results.users.is_empty() && results.birds.is_empty());
        assert!(service.hashtag(&alice, "#", None, None).await.unwrap().is_empty());

        assert_eq!(service.hashtag(&alice, "#rust", None, None).await.unwrap().len(), 1);
        let results = service.search(&alice, "ali").await.unwrap();
        assert_eq!(results.users.len(), 1);
    }
}
