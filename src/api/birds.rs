//! Bird endpoints
//!
//! Posting, the bird page and interactions (likes, saves, comments,
//! shares, reports).

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use serde::Deserialize;

use super::extract::{RequestMetrics, read_text, read_upload};
use crate::AppState;
use crate::api::dto::*;
use crate::api::{bird_to_response, comment_to_response};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{NewBird, PostService};

fn build_post_service(state: &AppState) -> PostService {
    PostService::new(
        state.db.clone(),
        state.storage.clone(),
        state.thumbnails.clone(),
        state.recommender.clone(),
    )
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    pub reason: Option<String>,
}

/// Collect the multipart bird form
async fn read_bird_form(mut multipart: Multipart) -> Result<NewBird, AppError> {
    let mut form = NewBird::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => form.image = Some(read_upload(field).await?),
            "video" => form.video = Some(read_upload(field).await?),
            "content" => form.content = read_text(field).await?,
            "post_type" => form.post_type = read_text(field).await?,
            "visibility" => form.visibility = read_text(field).await?,
            "location" => form.location = read_text(field).await?,
            other => tracing::debug!(field = other, "Ignoring unknown bird form field"),
        }
    }

    Ok(form)
}

/// POST /api/birds
///
/// Multipart form: `content`, `image`, `video`, `post_type`, `visibility`,
/// `location`. Uploads with an empty body are treated as absent.
pub async fn create_bird(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Json<BirdResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/birds");

    let mut form = read_bird_form(multipart).await?;
    form.image = form.image.filter(|upload| !upload.data.is_empty());
    form.video = form.video.filter(|upload| !upload.data.is_empty());

    let entry = build_post_service(&state).create(&user, form).await?;
    Ok(metrics.ok(Json(bird_to_response(&entry, &state.storage))))
}

/// GET /api/birds/:id
pub async fn get_bird(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<BirdDetailResponse>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/birds/:id");

    let detail = build_post_service(&state).detail(&user, &id).await?;
    Ok(metrics.ok(Json(BirdDetailResponse {
        bird: bird_to_response(&detail.entry, &state.storage),
        comments: detail
            .comments
            .iter()
            .map(|comment| comment_to_response(comment, &state.storage))
            .collect(),
    })))
}

/// DELETE /api/birds/:id
pub async fn delete_bird(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<AckResponse>, AppError> {
    let metrics = RequestMetrics::start("DELETE", "/api/birds/:id");
    build_post_service(&state).delete(&user, &id).await?;
    Ok(metrics.ok(Json(AckResponse::ok())))
}

/// POST /api/birds/:id/like
pub async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<LikeResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/birds/:id/like");
    let like = build_post_service(&state).toggle_like(&user, &id).await?;
    Ok(metrics.ok(Json(LikeResponse {
        liked: like.liked,
        like_count: like.like_count,
    })))
}

/// POST /api/birds/:id/save
pub async fn toggle_save(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<SaveResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/birds/:id/save");
    let save = build_post_service(&state).toggle_save(&user, &id).await?;
    Ok(metrics.ok(Json(SaveResponse {
        saved: save.saved,
        save_count: save.save_count,
    })))
}

/// POST /api/birds/:id/comments
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/birds/:id/comments");
    let comment = build_post_service(&state)
        .add_comment(&user, &id, &request.content)
        .await?;
    Ok(metrics.ok(Json(comment_to_response(&comment, &state.storage))))
}

/// POST /api/comments/:id/replies
pub async fn reply_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/comments/:id/replies");
    let reply = build_post_service(&state)
        .reply_comment(&user, &id, &request.content)
        .await?;
    Ok(metrics.ok(Json(comment_to_response(&reply, &state.storage))))
}

/// DELETE /api/comments/:id
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<AckResponse>, AppError> {
    let metrics = RequestMetrics::start("DELETE", "/api/comments/:id");
    build_post_service(&state).delete_comment(&user, &id).await?;
    Ok(metrics.ok(Json(AckResponse::ok())))
}

/// POST /api/birds/:id/share
pub async fn share_bird(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<AckResponse>, AppError> {
    build_post_service(&state).share(&user, &id).await?;
    Ok(Json(AckResponse::ok()))
}

/// POST /api/birds/:id/report
///
/// The body is optional.
pub async fn report_bird(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    request: Option<Json<ReportRequest>>,
) -> Result<Json<AckResponse>, AppError> {
    let reason = request.and_then(|Json(request)| request.reason);
    build_post_service(&state)
        .report(&user, &id, reason.as_deref())
        .await?;
    Ok(Json(AckResponse::ok()))
}
