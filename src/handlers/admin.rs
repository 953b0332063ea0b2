use axum::extract::State;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    cascade::{COMMENT_NOT_FOUND, POST_NOT_FOUND, USER_NOT_FOUND},
    error::ApiError,
    extract::{ValidatedJson, ValidatedPath},
    models::{Comment, Post, Role, SetRoleRequest, UserAudit, UserView},
    repository::Visibility,
    response::ApiResponse,
};

// The admin router is gated; each handler still checks the role itself.

/// set_user_role
///
/// [Admin Route] Changes a user's role. Tokens already issued to that user
/// pick up the new role on their next verification.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = UserView),
        (status = 403, description = "Not admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_user_role(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<SetRoleRequest>,
) -> Result<ApiResponse<UserView>, ApiError> {
    auth.require_any(&[Role::Admin])?;

    state
        .repo
        .find_role(payload.role)
        .await?
        .ok_or_else(|| ApiError::internal("System roles are not generated yet."))?;

    let user = state
        .repo
        .set_user_role(id, payload.role)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

    tracing::info!(user_id = %user.id, role = %user.role, by = %auth.id, "role changed");
    Ok(ApiResponse::ok(UserView::from(&user)))
}

/// audit_user
///
/// [Admin Route] Reads a user whether or not it is soft-deleted.
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User incl. audit fields", body = UserAudit),
        (status = 404, description = "Not Found")
    )
)]
pub async fn audit_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<UserAudit>, ApiError> {
    auth.require_any(&[Role::Admin])?;

    let user = state
        .repo
        .get_user(id, Visibility::IncludeDeleted)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

    Ok(ApiResponse::ok(UserAudit::from(user)))
}

#[utoipa::path(
    get,
    path = "/admin/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post incl. audit fields", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn audit_post(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Post>, ApiError> {
    auth.require_any(&[Role::Admin])?;

    let post = state
        .repo
        .get_post(id, Visibility::IncludeDeleted)
        .await?
        .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;

    Ok(ApiResponse::ok(post))
}

#[utoipa::path(
    get,
    path = "/admin/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment incl. audit fields", body = Comment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn audit_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Comment>, ApiError> {
    auth.require_any(&[Role::Admin])?;

    let comment = state
        .repo
        .get_comment(id, Visibility::IncludeDeleted)
        .await?
        .ok_or_else(|| ApiError::not_found(COMMENT_NOT_FOUND))?;

    Ok(ApiResponse::ok(comment))
}
