//! Account settings endpoints
//!
//! Each form is its own endpoint. Every change is written to the `audit`
//! log target together with the client address.

use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::extract::{ClientIp, RequestMetrics};
use crate::AppState;
use crate::api::dto::{AccountResponse, AckResponse, SettingsResponse, ThemeResponse};
use crate::api::{account_to_response, settings_to_response};
use crate::auth::{CurrentUser, clear_session_cookie};
use crate::error::AppError;
use crate::service::{PrivacyUpdate, SettingsService};

pub const THEME_COOKIE: &str = "theme";
const THEME_COOKIE_MAX_AGE_DAYS: i64 = 365;

fn build_settings_service(state: &AppState) -> SettingsService {
    SettingsService::new(state.db.clone(), state.payments.is_configured())
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Privacy switches; a missing switch counts as off
#[derive(Debug, Default, Deserialize)]
pub struct PrivacyRequest {
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub tracking_protection: bool,
    #[serde(default)]
    pub recommendation_indexing: bool,
}

/// Readable by client scripts so the page can style itself before load
fn theme_cookie(theme: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((THEME_COOKIE, theme.to_string()))
        .path("/")
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(THEME_COOKIE_MAX_AGE_DAYS))
        .build()
}

/// GET /api/settings
pub async fn get_settings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<SettingsResponse>, AppError> {
    let metrics = RequestMetrics::start("GET", "/api/settings");
    let view = build_settings_service(&state).view(&user).await?;
    Ok(metrics.ok(Json(settings_to_response(&view))))
}

/// PATCH /api/settings/account
pub async fn update_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    Json(request): Json<AccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let updated = build_settings_service(&state)
        .update_account(&user, request.email, request.first_name, &ip)
        .await?;
    Ok(Json(account_to_response(&updated)))
}

/// POST /api/settings/password
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    Json(request): Json<PasswordRequest>,
) -> Result<Json<AckResponse>, AppError> {
    build_settings_service(&state)
        .change_password(
            &user,
            &request.old_password,
            &request.new_password,
            &request.new_password_confirm,
            &ip,
        )
        .await?;
    Ok(Json(AckResponse::ok()))
}

/// PUT /api/settings/privacy
///
/// Returns the merged privacy document.
pub async fn update_privacy(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    Json(request): Json<PrivacyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let update = PrivacyUpdate {
        is_private: request.is_private,
        tracking_protection: request.tracking_protection,
        recommendation_indexing: request.recommendation_indexing,
    };
    let privacy = build_settings_service(&state)
        .update_privacy(&user, update, &ip)
        .await?;
    Ok(Json(privacy))
}

/// POST /api/settings/theme/:name
///
/// Unknown names fall back to the default theme.
pub async fn set_theme(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Result<(CookieJar, Json<ThemeResponse>), AppError> {
    let theme = build_settings_service(&state)
        .set_theme(&user, &name, &ip)
        .await?;
    let jar = jar.add(theme_cookie(theme, state.config.should_use_secure_cookies()));
    Ok((
        jar,
        Json(ThemeResponse {
            theme: theme.to_string(),
        }),
    ))
}

/// POST /api/settings/deactivate
///
/// Deactivates the account and ends the session.
pub async fn deactivate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AckResponse>), AppError> {
    build_settings_service(&state).deactivate(&user, &ip).await?;
    Ok((jar.add(clear_session_cookie()), Json(AckResponse::ok())))
}
