//! Recommendation service client
//!
//! New posts are sent to an external embedding service for indexing, and the
//! home feed can optionally be reordered by its ranking endpoint. Both calls
//! are best effort: callers log failures and fall back.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::metrics::observe_recommendation;

/// Post metadata sent alongside the text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestMetadata {
    pub author: String,
    #[serde(rename = "type")]
    pub post_type: String,
}

/// Body of `POST /api/v1/events/ingest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestItem {
    pub content_id: String,
    pub text: String,
    pub metadata: IngestMetadata,
}

#[derive(Debug, Serialize)]
struct RankRequest<'a> {
    user_id: &'a str,
    candidate_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RankResponse {
    ranked_ids: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Recommender: Send + Sync {
    /// Submit a post for indexing
    async fn ingest(&self, item: IngestItem) -> Result<(), AppError>;

    /// Order `candidate_ids` for `viewer_id`, best first
    async fn rank(
        &self,
        viewer_id: String,
        candidate_ids: Vec<String>,
    ) -> Result<Vec<String>, AppError>;
}

/// HTTP implementation backed by `reqwest`
pub struct HttpRecommender {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecommender {
    pub fn new(config: &crate::config::RecommendationConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("Bird/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Recommender for HttpRecommender {
    async fn ingest(&self, item: IngestItem) -> Result<(), AppError> {
        let started = Instant::now();
        let url = format!("{}/api/v1/events/ingest", self.base_url);

        let result = self
            .client
            .post(&url)
            .json(&item)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => {
                observe_recommendation("ingest", "success", started.elapsed());
                Ok(())
            }
            Err(error) => {
                observe_recommendation("ingest", "error", started.elapsed());
                Err(error.into())
            }
        }
    }

    async fn rank(
        &self,
        viewer_id: String,
        candidate_ids: Vec<String>,
    ) -> Result<Vec<String>, AppError> {
        let started = Instant::now();
        let url = format!("{}/api/v1/feed/rank", self.base_url);

        let request = RankRequest {
            user_id: &viewer_id,
            candidate_ids: &candidate_ids,
        };

        let response = match self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
        {
            Ok(response) => response,
            Err(error) => {
                observe_recommendation("rank", "error", started.elapsed());
                return Err(error.into());
            }
        };

        match response.json::<RankResponse>().await {
            Ok(body) => {
                observe_recommendation("rank", "success", started.elapsed());
                Ok(body.ranked_ids)
            }
            Err(error) => {
                observe_recommendation("rank", "invalid", started.elapsed());
                Err(AppError::Upstream(format!("invalid rank response: {error}")))
            }
        }
    }
}

/// Used when the integration is switched off in config
pub struct DisabledRecommender;

#[async_trait]
impl Recommender for DisabledRecommender {
    async fn ingest(&self, _item: IngestItem) -> Result<(), AppError> {
        Ok(())
    }

    async fn rank(
        &self,
        _viewer_id: String,
        candidate_ids: Vec<String>,
    ) -> Result<Vec<String>, AppError> {
        Ok(candidate_ids)
    }
}
