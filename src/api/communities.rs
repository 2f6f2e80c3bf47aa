//! Community endpoints

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use super::extract::RequestMetrics;
use crate::AppState;
use crate::api::dto::{AckResponse, CommunityDetailResponse, CommunityResponse};
use crate::api::{community_detail_to_response, community_to_response};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::CommunityService;

#[derive(Debug, Deserialize)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// GET /api/communities
pub async fn list_communities(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<CommunityResponse>>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/communities");
    let communities = CommunityService::new(state.db.clone()).list(&user).await?;
    Ok(metrics.ok(Json(
        communities
            .iter()
            .map(|summary| community_to_response(summary, &state.storage))
            .collect(),
    )))
}

/// POST /api/communities
pub async fn create_community(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateCommunityRequest>,
) -> Result<Json<CommunityResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/communities");
    let summary = CommunityService::new(state.db.clone())
        .create(&user, &request.name, request.description, request.is_private)
        .await?;
    Ok(metrics.ok(Json(community_to_response(&summary, &state.storage))))
}

/// GET /api/communities/:slug
pub async fn get_community(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<CommunityDetailResponse>, AppError> {
    let detail = CommunityService::new(state.db.clone())
        .detail(&user, &slug)
        .await?;
    Ok(Json(community_detail_to_response(&detail, &state.storage)))
}

/// POST /api/communities/:slug/join
pub async fn join_community(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<CommunityResponse>, AppError> {
    let summary = CommunityService::new(state.db.clone())
        .join(&user, &slug)
        .await?;
    Ok(Json(community_to_response(&summary, &state.storage)))
}

/// POST /api/communities/:slug/leave
pub async fn leave_community(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<AckResponse>, AppError> {
    CommunityService::new(state.db.clone())
        .leave(&user, &slug)
        .await?;
    Ok(Json(AckResponse::ok()))
}
