//! Password login flow
//!
//! Registration, login and logout. A successful login sets the signed
//! session cookie and also returns the token for bearer clients.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::session::{SESSION_COOKIE, Session, create_session_token};
use super::CurrentUser;
use crate::AppState;
use crate::api::{AccountResponse, AckResponse, AuthResponse, RequestMetrics, account_to_response};
use crate::data::User;
use crate::error::AppError;
use crate::service::{AccountService, RegisterInput};

/// Create authentication router
///
/// Routes (nested under `/auth`):
/// - POST /register - Create an account and sign in
/// - POST /login - Sign in
/// - POST /logout - Clear the session
/// - GET /me - Current account
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

/// Post-login target: `next` unless empty or the literal `"None"`
pub fn redirect_target(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(next) if !next.is_empty() && next != "None" => next.to_string(),
        _ => "/".to_string(),
    }
}

pub(crate) fn session_cookie(token: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}

pub(crate) fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").http_only(true).build();
    cookie.make_removal();
    cookie
}

/// Issue a session for `user` and attach the cookie
fn sign_in(
    state: &AppState,
    jar: CookieJar,
    user: &User,
    redirect: String,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let max_age = state.config.auth.session_max_age;
    let session = Session::new(&user.id, &user.username, max_age);
    let token = create_session_token(&session, &state.config.auth.session_secret)?;

    let jar = jar.add(session_cookie(
        token.clone(),
        max_age,
        state.config.should_use_secure_cookies(),
    ));

    Ok((
        jar,
        Json(AuthResponse {
            user: account_to_response(user),
            redirect,
            token,
        }),
    ))
}

/// POST /auth/register
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let metrics = RequestMetrics::start("POST", "/auth/register");

    let user = AccountService::new(state.db.clone())
        .register(RegisterInput {
            username: request.username,
            password: request.password,
            password_confirm: request.password_confirm,
            email: request.email,
        })
        .await?;

    Ok(metrics.ok(sign_in(&state, jar, &user, "/".to_string())?))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let metrics = RequestMetrics::start("POST", "/auth/login");

    let user = AccountService::new(state.db.clone())
        .authenticate(&request.username, &request.password)
        .await?;
    tracing::info!(user_id = %user.id, "User logged in");

    let redirect = redirect_target(request.next.as_deref());
    Ok(metrics.ok(sign_in(&state, jar, &user, redirect)?))
}

/// POST /auth/logout
async fn logout(jar: CookieJar) -> (CookieJar, Json<AckResponse>) {
    (jar.add(clear_session_cookie()), Json(AckResponse::ok()))
}

/// GET /auth/me
async fn me(CurrentUser(user): CurrentUser) -> Json<AccountResponse> {
    Json(account_to_response(&user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_ignores_empty_and_none() {
        assert_eq!(redirect_target(None), "/");
        assert_eq!(redirect_target(Some("")), "/");
        assert_eq!(redirect_target(Some("None")), "/");
        assert_eq!(redirect_target(Some("/settings")), "/settings");
    }

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = session_cookie("token".to_string(), 60, true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(60)));
    }
}
