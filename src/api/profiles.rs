//! Profile endpoints

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::extract::{RequestMetrics, read_upload};
use crate::AppState;
use crate::api::dto::{AckResponse, MediaUrlResponse, ProfileResponse};
use crate::api::profile_to_response;
use crate::auth::CurrentUser;
use crate::data::{Education, WorkExperience};
use crate::error::AppError;
use crate::service::{EducationInput, MediaUpload, ProfileService, ProfileUpdate, WorkInput};

fn build_profile_service(state: &AppState) -> ProfileService {
    ProfileService::new(state.db.clone(), state.storage.clone())
}

/// Partial profile update; absent fields are left alone
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub document: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub show_birth_year: Option<bool>,
    pub current_city: Option<String>,
    pub hometown: Option<String>,
    pub visited_places: Option<Vec<String>>,
    pub phone: Option<String>,
    pub public_email: Option<String>,
    pub bio: Option<String>,
    pub interests: Option<serde_json::Value>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(request: UpdateProfileRequest) -> Self {
        ProfileUpdate {
            full_name: request.full_name,
            document: request.document,
            gender: request.gender,
            birth_date: request.birth_date,
            show_birth_year: request.show_birth_year,
            current_city: request.current_city,
            hometown: request.hometown,
            visited_places: request.visited_places,
            phone: request.phone,
            public_email: request.public_email,
            bio: request.bio,
            interests: request.interests,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkRequest {
    pub company: String,
    pub position: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EducationRequest {
    pub institution: String,
    pub course: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// GET /api/profiles/:username
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/profiles/:username");
    let view = build_profile_service(&state).view(&user, &username).await?;
    Ok(metrics.ok(Json(profile_to_response(&view, &state.storage))))
}

/// PATCH /api/profile
///
/// Returns the refreshed profile page.
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let metrics = RequestMetrics::start("PATCH", "/api/profile");

    let service = build_profile_service(&state);
    service.update(&user, request.into()).await?;
    let view = service.view(&user, &user.username).await?;
    Ok(metrics.ok(Json(profile_to_response(&view, &state.storage))))
}

/// First file field of a multipart body
async fn single_upload(mut multipart: Multipart) -> Result<MediaUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to parse multipart: {}", e)))?
    {
        if field.file_name().is_some() || field.content_type().is_some() {
            let upload = read_upload(field).await?;
            if !upload.data.is_empty() {
                return Ok(upload);
            }
        }
    }
    Err(AppError::Validation("No file provided".to_string()))
}

/// POST /api/profile/avatar
pub async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Json<MediaUrlResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/profile/avatar");
    let upload = single_upload(multipart).await?;
    let url = build_profile_service(&state).update_avatar(&user, upload).await?;
    Ok(metrics.ok(Json(MediaUrlResponse { url })))
}

/// POST /api/profile/cover
pub async fn upload_cover(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Json<MediaUrlResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/profile/cover");
    let upload = single_upload(multipart).await?;
    let url = build_profile_service(&state).update_cover(&user, upload).await?;
    Ok(metrics.ok(Json(MediaUrlResponse { url })))
}

/// POST /api/profile/work
pub async fn add_work(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<WorkRequest>,
) -> Result<Json<WorkExperience>, AppError> {
    let work = build_profile_service(&state)
        .add_work(
            &user,
            WorkInput {
                company: request.company,
                position: request.position,
                start_date: request.start_date,
                end_date: request.end_date,
                is_current: request.is_current,
                description: request.description,
            },
        )
        .await?;
    Ok(Json(work))
}

/// DELETE /api/profile/work/:id
pub async fn delete_work(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<AckResponse>, AppError> {
    build_profile_service(&state).delete_work(&user, &id).await?;
    Ok(Json(AckResponse::ok()))
}

/// POST /api/profile/education
pub async fn add_education(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<EducationRequest>,
) -> Result<Json<Education>, AppError> {
    let education = build_profile_service(&state)
        .add_education(
            &user,
            EducationInput {
                institution: request.institution,
                course: request.course,
                start_date: request.start_date,
                end_date: request.end_date,
            },
        )
        .await?;
    Ok(Json(education))
}

/// DELETE /api/profile/education/:id
pub async fn delete_education(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<AckResponse>, AppError> {
    build_profile_service(&state).delete_education(&user, &id).await?;
    Ok(Json(AckResponse::ok()))
}
