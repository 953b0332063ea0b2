use axum::{
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use super::{comments_on_post, link_step, post_detail};
use crate::{
    AppState,
    auth::AuthUser,
    cascade::{CascadeCoordinator, POST_NOT_FOUND},
    error::ApiError,
    extract::{ValidatedJson, ValidatedPath},
    models::{CreatePostRequest, PostComments, PostDetail, PostView, UpdatePostRequest},
    repository::{NewPost, PostFilter, PostPatch, RefSet, Visibility},
    response::ApiResponse,
};

// --- Public ---

/// public_list_posts
///
/// [Public Route] Every live post, newest first, without comments.
#[utoipa::path(
    get,
    path = "/public/posts",
    responses((status = 200, description = "Posts", body = [PostView]))
)]
pub async fn public_list_posts(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<PostView>>, ApiError> {
    let posts = state.repo.list_posts(PostFilter::default()).await?;
    Ok(ApiResponse::ok(posts.iter().map(PostView::from).collect()))
}

#[utoipa::path(
    get,
    path = "/public/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = PostView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn public_get_post(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<PostView>, ApiError> {
    let post = state
        .repo
        .get_post(id, Visibility::Active)
        .await?
        .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;

    Ok(ApiResponse::ok(PostView::from(&post)))
}

/// public_post_comments
///
/// [Public Route] A live post with its live comments and their authors'
/// usernames.
#[utoipa::path(
    get,
    path = "/public/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post with comments", body = PostComments),
        (status = 404, description = "Not Found")
    )
)]
pub async fn public_post_comments(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<PostComments>, ApiError> {
    let post = state
        .repo
        .get_post(id, Visibility::Active)
        .await?
        .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;

    let comments = comments_on_post(state.repo.as_ref(), &post).await?;

    Ok(ApiResponse::ok(PostComments {
        id: post.id,
        title: post.title,
        content: post.content,
        user: post.user,
        comments,
    }))
}

// --- Authenticated ---

/// list_posts
///
/// [Authenticated Route] Live posts written by anyone except the caller, with
/// the owner and live comments populated.
#[utoipa::path(
    get,
    path = "/posts",
    responses((status = 200, description = "Other users' posts", body = [PostDetail]))
)]
pub async fn list_posts(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<PostDetail>>, ApiError> {
    let posts = state
        .repo
        .list_posts(PostFilter {
            exclude_owner: Some(auth.id),
        })
        .await?;

    let mut details = Vec::with_capacity(posts.len());
    for post in posts {
        details.push(post_detail(state.repo.as_ref(), post).await?);
    }
    Ok(ApiResponse::ok(details))
}

#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = PostDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    _auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<PostDetail>, ApiError> {
    let post = state
        .repo
        .get_post(id, Visibility::Active)
        .await?
        .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;

    Ok(ApiResponse::ok(post_detail(state.repo.as_ref(), post).await?))
}

/// create_post
///
/// [Authenticated Route] The caller becomes the owner and the post id is
/// added to their `posts` set.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = PostView),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePostRequest>,
) -> Result<ApiResponse<PostView>, ApiError> {
    let post = state
        .repo
        .create_post(NewPost {
            title: payload.title,
            content: payload.content,
            user: auth.id,
        })
        .await?;

    link_step(
        "Post",
        "link to owner",
        state.repo.push_user_ref(auth.id, RefSet::Posts, post.id).await,
    )?;

    tracing::info!(post_id = %post.id, owner = %auth.id, "post created");
    Ok(ApiResponse::created(PostView::from(&post)))
}

/// update_post
///
/// [Authenticated Route] Owner or admin.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = PostView),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdatePostRequest>,
) -> Result<ApiResponse<PostView>, ApiError> {
    let post = state
        .repo
        .get_post(id, Visibility::Active)
        .await?
        .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;

    if post.user != auth.id && !auth.is_admin() {
        return Err(ApiError::forbidden("You can't update someone else's post"));
    }

    let updated = state
        .repo
        .update_post(
            id,
            PostPatch {
                title: payload.title,
                content: payload.content,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;

    Ok(ApiResponse::ok(PostView::from(&updated)))
}

/// delete_post
///
/// [Authenticated Route] Owner or admin. Runs the post cascade.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post deleted successfully"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    CascadeCoordinator::new(state.repo.as_ref())
        .delete_post(&auth, id)
        .await?;

    Ok(ApiResponse::message(StatusCode::OK, "Post deleted successfully"))
}
