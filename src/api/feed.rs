//! Feed endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;

use super::extract::RequestMetrics;
use crate::AppState;
use crate::api::dto::{BirdResponse, SearchResponse};
use crate::api::{birds_to_response, search_to_response};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::FeedService;

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub max_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

fn build_feed_service(state: &AppState) -> FeedService {
    let recommendation = &state.config.recommendation;
    FeedService::new(
        state.db.clone(),
        state.ranking_cache.clone(),
        state.recommender.clone(),
        recommendation.enabled && recommendation.rank_feed,
    )
}

/// GET /api/feed
pub async fn home_feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<BirdResponse>>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/feed");

    let entries = build_feed_service(&state)
        .home(&user, params.max_id.as_deref(), params.limit)
        .await?;
    Ok(metrics.ok(Json(birds_to_response(&entries, &state.storage))))
}

/// GET /api/stories
pub async fn stories(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<BirdResponse>>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/stories");
    let entries = build_feed_service(&state).stories(&user).await?;
    Ok(metrics.ok(Json(birds_to_response(&entries, &state.storage))))
}

/// GET /api/explore
pub async fn explore(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<BirdResponse>>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/explore");
    let entries = build_feed_service(&state).explore(&user).await?;
    Ok(metrics.ok(Json(birds_to_response(&entries, &state.storage))))
}

/// GET /api/reels
pub async fn reels(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<BirdResponse>>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/reels");
    let entries = build_feed_service(&state).reels(&user).await?;
    Ok(metrics.ok(Json(birds_to_response(&entries, &state.storage))))
}

/// GET /api/search?q=
pub async fn search(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/search");
    let results = build_feed_service(&state).search(&user, &params.q).await?;
    Ok(metrics.ok(Json(search_to_response(&results, &state.storage))))
}

/// GET /api/hashtags/:tag
pub async fn hashtag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tag): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<BirdResponse>>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/hashtags/:tag");
    let entries = build_feed_service(&state)
        .hashtag(&user, &tag, params.max_id.as_deref(), params.limit)
        .await?;
    Ok(metrics.ok(Json(birds_to_response(&entries, &state.storage))))
}

/// GET /api/saved
pub async fn saved(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<BirdResponse>>, AppError> {
    let entries = build_feed_service(&state).saved(&user, params.limit).await?;
    Ok(Json(birds_to_response(&entries, &state.storage)))
}
