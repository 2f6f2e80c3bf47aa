//! Notification endpoints

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::api::dto::AckResponse;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{NotificationList, NotificationService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAllResponse {
    pub marked: u64,
}

fn build_notification_service(state: &AppState) -> NotificationService {
    NotificationService::new(state.db.clone(), state.storage.clone())
}

/// GET /api/notifications
///
/// Newest first, already formatted for display, with the unread count.
pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<NotificationList>, AppError> {
    let list = build_notification_service(&state).list(&user.id).await?;
    Ok(Json(list))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<AckResponse>, AppError> {
    build_notification_service(&state)
        .mark_read(&user.id, &id)
        .await?;
    Ok(Json(AckResponse::ok()))
}

/// POST /api/notifications/read_all
pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MarkAllResponse>, AppError> {
    let marked = build_notification_service(&state)
        .mark_all_read(&user.id)
        .await?;
    Ok(Json(MarkAllResponse { marked }))
}
