//! Request handlers, one module per resource. Every handler returns
//! `Result<ApiResponse<T>, ApiError>` so success and failure share one envelope.

pub mod admin;
pub mod comments;
pub mod posts;
pub mod users;

use std::collections::HashMap;

use axum::http::StatusCode;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        AuthorView, Comment, CommentDetail, CommentOnPost, CommentSummary, Post, PostDetail,
        PostSummary, User, UserProfile,
    },
    repository::{Repository, StoreResult, Visibility},
    response::ApiResponse,
};

/// health
///
/// [Public Route] Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> ApiResponse<()> {
    ApiResponse::message(StatusCode::OK, "ok")
}

/// page_not_found
///
/// Router fallback for every unmatched path.
pub async fn page_not_found() -> ApiError {
    ApiError::not_found("Page not found")
}

/// Maps a failed reference-set update that ran after the record itself was
/// written, so the caller learns the write happened.
pub(crate) fn link_step(entity: &str, name: &str, result: StoreResult<()>) -> Result<(), ApiError> {
    result.map_err(|err| {
        tracing::error!(entity, step = name, error = %err, "record created but not linked");
        ApiError::partial_create(entity, name)
    })
}

// --- Projection Helpers ---

/// Live comments of `post`, each with its author's username (`None` once the
/// author is deleted). Resolved through the post's reference set.
pub(crate) async fn comments_on_post(
    repo: &dyn Repository,
    post: &Post,
) -> Result<Vec<CommentOnPost>, ApiError> {
    let comments = repo.get_comments(&post.comments).await?;
    let usernames = usernames_of(repo, &comments).await?;

    Ok(comments
        .into_iter()
        .map(|c| CommentOnPost {
            id: c.id,
            user: usernames.get(&c.user).cloned(),
            comment: c.comment,
        })
        .collect())
}

async fn usernames_of(
    repo: &dyn Repository,
    comments: &[Comment],
) -> Result<HashMap<Uuid, String>, ApiError> {
    let mut author_ids: Vec<Uuid> = comments.iter().map(|c| c.user).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    Ok(repo
        .get_users(&author_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect())
}

pub(crate) async fn post_detail(repo: &dyn Repository, post: Post) -> Result<PostDetail, ApiError> {
    let owner = repo.get_user(post.user, Visibility::Active).await?;
    let comments = comments_on_post(repo, &post).await?;

    Ok(PostDetail {
        id: post.id,
        title: post.title,
        content: post.content,
        user: owner.as_ref().map(AuthorView::from),
        comments,
    })
}

pub(crate) async fn comment_detail(
    repo: &dyn Repository,
    comment: Comment,
) -> Result<CommentDetail, ApiError> {
    let author = repo.get_user(comment.user, Visibility::Active).await?;
    let post = repo.get_post(comment.post, Visibility::Active).await?;

    Ok(CommentDetail {
        id: comment.id,
        comment: comment.comment,
        user: author.as_ref().map(AuthorView::from),
        post: post.as_ref().map(PostSummary::from),
    })
}

/// A user with both reference sets resolved to live records.
pub(crate) async fn user_profile(repo: &dyn Repository, user: User) -> Result<UserProfile, ApiError> {
    let posts = repo.get_posts(&user.posts).await?;
    let comments = repo.get_comments(&user.comments).await?;

    Ok(UserProfile {
        id: user.id,
        name: user.name,
        username: user.username,
        posts: posts.iter().map(PostSummary::from).collect(),
        comments: comments.iter().map(CommentSummary::from).collect(),
    })
}
