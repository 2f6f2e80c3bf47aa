//! Event endpoints

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::extract::RequestMetrics;
use crate::AppState;
use crate::api::dto::{EventDetailResponse, EventResponse};
use crate::api::{event_detail_to_response, event_to_response};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{EventService, NewEvent};

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub starts_at: DateTime<Utc>,
}

/// GET /api/events
///
/// Upcoming events only, soonest first.
pub async fn list_events(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/events");
    let events = EventService::new(state.db.clone()).list_upcoming(&user).await?;
    Ok(metrics.ok(Json(
        events
            .iter()
            .map(|summary| event_to_response(summary, &state.storage))
            .collect(),
    )))
}

/// POST /api/events
pub async fn create_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateEventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/events");
    let summary = EventService::new(state.db.clone())
        .create(
            &user,
            NewEvent {
                title: request.title,
                description: request.description,
                location: request.location,
                starts_at: request.starts_at,
            },
        )
        .await?;
    Ok(metrics.ok(Json(event_to_response(&summary, &state.storage))))
}

/// GET /api/events/:id
pub async fn get_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<EventDetailResponse>, AppError> {
    let detail = EventService::new(state.db.clone()).detail(&user, &id).await?;
    Ok(Json(event_detail_to_response(&detail, &state.storage)))
}

/// POST /api/events/:id/attend
///
/// Toggles participation.
pub async fn toggle_attend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, AppError> {
    let summary = EventService::new(state.db.clone()).attend(&user, &id).await?;
    Ok(Json(event_to_response(&summary, &state.storage)))
}
