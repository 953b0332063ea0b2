use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints open to anonymous clients: the liveness probe, the two identity
/// endpoints, and read-only views of live posts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(handlers::health))
        // POST /users/register
        // Creates an account with the default `user` role.
        .route("/users/register", post(handlers::users::register_user))
        // POST /users/login
        // Exchanges credentials for a signed token.
        .route("/users/login", post(handlers::users::login))
        // GET /public/posts
        .route("/public/posts", get(handlers::posts::public_list_posts))
        // GET /public/posts/{id}
        .route("/public/posts/{id}", get(handlers::posts::public_get_post))
        // GET /public/posts/{id}/comments
        // The post with its live comments and their authors' usernames.
        .route(
            "/public/posts/{id}/comments",
            get(handlers::posts::public_post_comments),
        )
}
