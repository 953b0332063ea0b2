use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Role management and audit reads. The audit reads are the only paths that
/// see soft-deleted records.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /admin/users/{id}/role
        .route("/users/{id}/role", put(handlers::admin::set_user_role))
        // GET /admin/users/{id}
        .route("/users/{id}", get(handlers::admin::audit_user))
        // GET /admin/posts/{id}
        .route("/posts/{id}", get(handlers::admin::audit_post))
        // GET /admin/comments/{id}
        .route("/comments/{id}", get(handlers::admin::audit_comment))
}
