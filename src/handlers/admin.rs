use crate::{
    AppState,
    auth::{AuthUser, Capability},
    error::{AppError, ErrorBody, Result},
    models::{Analytics, FeaturedResponse, UserListResponse, UserStatusResponse},
};
use axum::{
    Json,
    extract::{Path, State},
};

/// Number of files listed under `recent_uploads` on the dashboard.
const RECENT_UPLOADS: i64 = 10;

// Each handler checks the admin capability itself in addition to the admin middleware.

/// list_users
///
/// [Admin Route] Every account, newest first.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = UserListResponse),
        (status = 401, description = "Not logged in", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn list_users(
    admin: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>> {
    admin.authorize(Capability::Admin, None)?;
    let users = state.repo.list_users().await?;
    Ok(Json(UserListResponse { users }))
}

/// toggle_user_status
///
/// [Admin Route] Activates or deactivates a regular account. Admin accounts cannot be
/// toggled; the flip itself is one conditional UPDATE.
#[utoipa::path(
    post,
    path = "/admin/users/{id}/toggle-status",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Status flipped", body = UserStatusResponse),
        (status = 400, description = "Target is an admin", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn toggle_user_status(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserStatusResponse>> {
    admin.authorize(Capability::Admin, None)?;

    let not_found = || AppError::NotFound("User not found".to_string());

    let target = state.repo.get_user(id).await?.ok_or_else(not_found)?;
    if target.is_admin {
        return Err(AppError::BadRequest("Cannot modify admin user".to_string()));
    }

    // None here means the row vanished or was promoted since the read above.
    let user = state
        .repo
        .toggle_user_active(id)
        .await?
        .ok_or_else(not_found)?;

    let verb = if user.is_active { "activated" } else { "deactivated" };
    tracing::info!(user_id = user.id, admin = %admin.username, "User {}", verb);

    Ok(Json(UserStatusResponse {
        message: format!("User {} successfully", verb),
        user,
    }))
}

/// toggle_featured
///
/// [Admin Route] Flips a file's featured flag.
#[utoipa::path(
    post,
    path = "/admin/files/featured/{id}",
    params(("id" = i64, Path, description = "File id")),
    responses(
        (status = 200, description = "Flag flipped", body = FeaturedResponse),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Unknown file", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn toggle_featured(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FeaturedResponse>> {
    admin.authorize(Capability::Admin, None)?;

    let file = state
        .repo
        .toggle_featured(id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let verb = if file.is_featured { "featured" } else { "unfeatured" };
    tracing::info!(file_id = file.id, admin = %admin.username, "File {}", verb);

    Ok(Json(FeaturedResponse {
        message: format!("File {} successfully", verb),
        file: file.into(),
    }))
}

/// get_analytics
///
/// [Admin Route] Dashboard figures: totals, per-category counts and recent uploads.
#[utoipa::path(
    get,
    path = "/analytics",
    responses(
        (status = 200, description = "Dashboard figures", body = Analytics),
        (status = 401, description = "Not logged in", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn get_analytics(
    admin: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Analytics>> {
    admin.authorize(Capability::Admin, None)?;
    let analytics = state.repo.get_analytics(RECENT_UPLOADS).await?;
    Ok(Json(analytics))
}
