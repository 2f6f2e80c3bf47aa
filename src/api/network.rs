//! Follow, block and bond endpoints plus the network dashboard

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use super::extract::RequestMetrics;
use crate::AppState;
use crate::api::dto::*;
use crate::api::{network_to_response, requests_to_response, user_to_response};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{BondAction, NetworkService};

fn build_network_service(state: &AppState) -> NetworkService {
    NetworkService::new(state.db.clone(), state.storage.clone())
}

#[derive(Debug, Deserialize)]
pub struct BondRequest {
    pub bond_type: String,
}

/// POST /api/users/:username/follow
pub async fn toggle_follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<FollowResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/users/:username/follow");
    let follow = build_network_service(&state)
        .toggle_follow(&user, &username)
        .await?;
    Ok(metrics.ok(Json(FollowResponse {
        following: follow.following,
        followers_count: follow.followers_count,
    })))
}

/// POST /api/users/:username/block
pub async fn toggle_block(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<BlockResponse>, AppError> {
    let blocking = build_network_service(&state)
        .toggle_block(&user, &username)
        .await?;
    Ok(Json(BlockResponse { blocking }))
}

/// POST /api/users/:username/bond
pub async fn request_bond(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
    Json(request): Json<BondRequest>,
) -> Result<Json<BondActionResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/users/:username/bond");
    let bond = build_network_service(&state)
        .request_bond(&user, &username, &request.bond_type)
        .await?;
    Ok(metrics.ok(Json(BondActionResponse { bond: Some(bond) })))
}

/// POST /api/bonds/:id/:action
///
/// `action` is one of `accept`, `reject`, `block`, `remove`.
pub async fn manage_bond(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<BondActionResponse>, AppError> {
    let action = BondAction::parse(&action)
        .ok_or_else(|| AppError::Validation(format!("Unknown bond action: {action}")))?;
    let bond = build_network_service(&state)
        .manage_bond(&user, &id, action)
        .await?;
    Ok(Json(BondActionResponse { bond }))
}

/// GET /api/network
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<NetworkResponse>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/network");
    let dashboard = build_network_service(&state).dashboard(&user).await?;
    Ok(metrics.ok(Json(network_to_response(&dashboard, &state.storage))))
}

/// GET /api/network/suggestions
pub async fn suggestions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = build_network_service(&state).suggestions(&user).await?;
    Ok(Json(
        users
            .iter()
            .map(|summary| user_to_response(summary, &state.storage))
            .collect(),
    ))
}

/// GET /api/network/requests
pub async fn requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<RequestsResponse>, AppError> {
    let requests = build_network_service(&state).requests(&user).await?;
    Ok(Json(requests_to_response(&requests, &state.storage)))
}
