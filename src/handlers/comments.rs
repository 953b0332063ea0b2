use axum::{
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use super::{comment_detail, link_step};
use crate::{
    AppState,
    auth::AuthUser,
    cascade::{COMMENT_NOT_FOUND, CascadeCoordinator},
    error::ApiError,
    extract::{ValidatedJson, ValidatedPath},
    models::{CommentDetail, CommentView, CreateCommentRequest, UpdateCommentRequest},
    repository::{NewComment, RefSet, Visibility},
    response::ApiResponse,
};

/// list_comments
///
/// [Authenticated Route] Every live comment with its author and post.
#[utoipa::path(
    get,
    path = "/comments",
    responses((status = 200, description = "Comments", body = [CommentDetail]))
)]
pub async fn list_comments(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<CommentDetail>>, ApiError> {
    let comments = state.repo.list_comments().await?;

    let mut details = Vec::with_capacity(comments.len());
    for comment in comments {
        details.push(comment_detail(state.repo.as_ref(), comment).await?);
    }
    Ok(ApiResponse::ok(details))
}

#[utoipa::path(
    get,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment", body = CommentDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_comment(
    _auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<CommentDetail>, ApiError> {
    let comment = state
        .repo
        .get_comment(id, Visibility::Active)
        .await?
        .ok_or_else(|| ApiError::not_found(COMMENT_NOT_FOUND))?;

    Ok(ApiResponse::ok(comment_detail(state.repo.as_ref(), comment).await?))
}

/// create_comment
///
/// [Authenticated Route] Writes a comment against a live post. The post check
/// happens inside the store write, so a post deleted a moment earlier still
/// yields 400 and no orphan row. On success the id is added to the author's
/// and the post's `comments` sets.
#[utoipa::path(
    post,
    path = "/comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Created", body = CommentView),
        (status = 400, description = "Please provide a valid post id."),
        (status = 422, description = "Invalid payload"),
        (status = 500, description = "Created but not linked")
    )
)]
pub async fn create_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCommentRequest>,
) -> Result<ApiResponse<CommentView>, ApiError> {
    let comment = state
        .repo
        .create_comment(NewComment {
            comment: payload.comment,
            user: auth.id,
            post: payload.post,
        })
        .await?;

    link_step(
        "Comment",
        "link to author",
        state
            .repo
            .push_user_ref(auth.id, RefSet::Comments, comment.id)
            .await,
    )?;
    link_step(
        "Comment",
        "link to post",
        state.repo.push_post_comment(comment.post, comment.id).await,
    )?;

    tracing::info!(comment_id = %comment.id, post_id = %comment.post, "comment created");
    Ok(ApiResponse::created(CommentView::from(&comment)))
}

/// update_comment
///
/// [Authenticated Route] Author only. Admins and post owners may delete a
/// comment but never rewrite it.
#[utoipa::path(
    put,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = CommentView),
        (status = 403, description = "Not Author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateCommentRequest>,
) -> Result<ApiResponse<CommentView>, ApiError> {
    let comment = state
        .repo
        .get_comment(id, Visibility::Active)
        .await?
        .ok_or_else(|| ApiError::not_found(COMMENT_NOT_FOUND))?;

    if comment.user != auth.id {
        return Err(ApiError::forbidden("You can't update someone else's comment"));
    }

    let updated = state
        .repo
        .update_comment(id, payload.comment)
        .await?
        .ok_or_else(|| ApiError::not_found(COMMENT_NOT_FOUND))?;

    Ok(ApiResponse::ok(CommentView::from(&updated)))
}

/// delete_comment
///
/// [Authenticated Route] Author, post owner or admin. Runs the comment cascade.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted successfully"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    CascadeCoordinator::new(state.repo.as_ref())
        .delete_comment(&auth, id)
        .await?;

    Ok(ApiResponse::message(StatusCode::OK, "Comment deleted successfully"))
}
