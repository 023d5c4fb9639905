use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use record_types::{ListUsersQuery, PaginatedUsers, UpdateUserRequest, UserResponse};
use validator::Validate;

use crate::auth::AuthClaims;
use crate::error::{ApiError, ApiResult};
use crate::models::User;
use crate::repository::UserFilter;
use crate::AppState;

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Load the caller and refuse anyone who is not an active admin.
async fn require_admin(state: &AppState, claims: &AuthClaims) -> ApiResult<User> {
    let caller = state
        .users
        .get_by_id(claims.0.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    if !(caller.is_admin && caller.is_active) {
        tracing::warn!("User {} denied admin access", caller.id);
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(caller)
}

// User handlers
pub async fn list_users(
    State(state): State<AppState>,
    claims: AuthClaims,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<PaginatedUsers>> {
    require_admin(&state, &claims).await?;

    let filter = UserFilter { name: query.name };
    let page = state
        .users
        .list_page(&filter, query.limit, query.page)
        .await?;
    Ok(Json(page))
}

pub async fn get_user(
    State(state): State<AppState>,
    claims: AuthClaims,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserResponse>> {
    require_admin(&state, &claims).await?;

    let user = state
        .users
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User {}", user_id)))?;
    Ok(Json(user.into()))
}

pub async fn update_user(
    State(state): State<AppState>,
    claims: AuthClaims,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    require_admin(&state, &claims).await?;
    payload.validate()?;

    let mut user = state
        .users
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User {}", user_id)))?;

    if let Some(name) = payload.name {
        user.name = name;
    }
    if let Some(email) = payload.email {
        user.email = email;
    }
    if let Some(is_active) = payload.is_active {
        user.is_active = is_active;
    }
    if let Some(is_admin) = payload.is_admin {
        user.is_admin = is_admin;
    }

    let saved = state.users.update(user).await?;
    tracing::info!("User {} updated by admin {}", saved.id, claims.0.id);
    Ok(Json(saved.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    claims: AuthClaims,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let caller = require_admin(&state, &claims).await?;
    if caller.id == user_id {
        return Err(ApiError::bad_request("Admins cannot delete their own account"));
    }

    state.users.delete(user_id).await?;
    tracing::info!("User {} deleted by admin {}", user_id, caller.id);
    Ok(StatusCode::NO_CONTENT)
}
