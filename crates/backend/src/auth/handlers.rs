//! Authentication HTTP handlers.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use record_types::{LoginRequest, LoginResponse, RegisterRequest, StatusResponse, UserResponse};
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::models::NewUser;
use crate::AppState;

use super::cookies::{append_set_cookies, removal_cookies, session_cookies};
use super::middleware::AuthClaims;

/// Register a new account.
///
/// Accounts start inactive and non-admin; activation happens out of band
/// (see the `record-admin` CLI).
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<StatusResponse>> {
    req.validate()?;

    if req.password != req.password_repeat {
        return Err(ApiError::PasswordMismatch);
    }

    if state.users.get_by_email(&req.email).await?.is_some() {
        return Err(ApiError::AlreadyExists);
    }

    let user = state
        .users
        .create(NewUser {
            name: req.name,
            email: req.email,
            password_hash: state.passwords.hash(&req.password),
            is_active: false,
            is_admin: false,
        })
        .await?;

    tracing::info!("Registered user {} ({})", user.id, user.email);
    Ok(Json(StatusResponse::ok()))
}

/// Log in with email and password.
///
/// Sets the `token` and `user_data` cookies and returns the token in the
/// body for bearer clients.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let user = match state.users.get_by_email(&req.email).await? {
        Some(user) if state.passwords.verify(&req.password, &user.password_hash) => user,
        Some(_) => {
            tracing::warn!("Login rejected for {}: wrong password", req.email);
            return Err(ApiError::InvalidCredentials);
        }
        None => {
            state.passwords.verify_absent(&req.password);
            tracing::warn!("Login rejected for {}: unknown email", req.email);
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !user.is_active {
        tracing::warn!("Login rejected for {}: account inactive", user.email);
        return Err(ApiError::InactiveAccount);
    }

    let token = state.tokens.sign(user.id, &user.name, &user.email)?;
    let cookies = session_cookies(
        &token,
        &user.display_data(),
        state.auth_config.cookie_max_age_secs,
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    tracing::info!("User {} logged in", user.id);

    let mut response = Json(LoginResponse {
        status: "ok".to_string(),
        token,
        user: user.name,
    })
    .into_response();
    append_set_cookies(response.headers_mut(), cookies);
    Ok(response)
}

/// Clear both session cookies. Always succeeds.
pub async fn logout() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    append_set_cookies(&mut headers, removal_cookies());
    (headers, Json(StatusResponse::ok()))
}

/// Get current authenticated user.
pub async fn auth_me(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .users
        .get_by_id(claims.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
    Ok(Json(user.into()))
}
