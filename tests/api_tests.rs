use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use blog_api::{
    AppConfig, AppState, InMemoryRepository, create_router,
    error::GENERIC_FAILURE_MESSAGE,
    models::Role,
    repository::{Repository, RepositoryState},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- Test App ---

struct TestApp {
    router: Router,
    repo: Arc<InMemoryRepository>,
}

fn spawn_app() -> TestApp {
    spawn_app_with(InMemoryRepository::seeded())
}

fn spawn_app_with(repo: InMemoryRepository) -> TestApp {
    let repo = Arc::new(repo);
    let state = AppState::new(repo.clone() as RepositoryState, AppConfig::default());
    TestApp {
        router: create_router(state),
        repo,
    }
}

impl TestApp {
    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Registers `username` and logs in, returning `(user id, token)`.
    async fn sign_up(&self, username: &str) -> (Uuid, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/users/register",
                None,
                Some(json!({ "name": username, "username": username, "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id: Uuid = serde_json::from_value(body["data"]["id"].clone()).unwrap();

        let (status, body) = self
            .call(
                Method::POST,
                "/users/login",
                None,
                Some(json!({ "username": username, "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let token = body["data"]["token"].as_str().unwrap().to_string();

        (id, token)
    }

    async fn create_post(&self, token: &str) -> Uuid {
        let (status, body) = self
            .call(
                Method::POST,
                "/posts",
                Some(token),
                Some(json!({ "title": "T", "content": "C" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        serde_json::from_value(body["data"]["id"].clone()).unwrap()
    }
}

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

// --- Tests ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": true, "message": "ok" }));
}

#[tokio::test]
async fn test_unknown_route_is_enveloped_404() {
    let app = spawn_app();
    let (status, body) = app.call(Method::GET, "/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "status": false, "message": "Page not found" }));
}

#[tokio::test]
async fn test_alice_posts_and_bob_sees_it() {
    let app = spawn_app();
    let (alice_id, alice) = app.sign_up("alice").await;
    let (_, bob) = app.sign_up("bob").await;

    let post_id = app.create_post(&alice).await;

    let (_, body) = app
        .call(Method::GET, &format!("/posts/{post_id}"), Some(&bob), None)
        .await;
    assert_eq!(body["data"]["user"]["username"], "alice");

    let (_, body) = app
        .call(Method::GET, &format!("/public/posts/{post_id}"), None, None)
        .await;
    assert_eq!(body["data"]["user"], json!(alice_id));

    let (_, as_alice) = app.call(Method::GET, "/posts", Some(&alice), None).await;
    assert!(!ids(&as_alice["data"]).contains(&post_id.to_string()));

    let (_, as_bob) = app.call(Method::GET, "/posts", Some(&bob), None).await;
    assert!(ids(&as_bob["data"]).contains(&post_id.to_string()));
}

#[tokio::test]
async fn test_deleted_post_and_its_comments_vanish() {
    let app = spawn_app();
    let (_, alice) = app.sign_up("alice").await;
    let (_, bob) = app.sign_up("bob").await;
    let post_id = app.create_post(&alice).await;

    let (status, _) = app
        .call(
            Method::POST,
            "/comments",
            Some(&bob),
            Some(json!({ "post": post_id, "comment": "first" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call(Method::DELETE, &format!("/posts/{post_id}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Post deleted successfully");

    let (status, body) = app
        .call(Method::GET, &format!("/posts/{post_id}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], false);

    let (status, _) = app
        .call(Method::GET, &format!("/public/posts/{post_id}/comments"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.call(Method::GET, "/comments", Some(&bob), None).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_user_listing_populates_live_posts() {
    let app = spawn_app();
    let (alice_id, alice) = app.sign_up("alice").await;
    let kept = app.create_post(&alice).await;
    let dropped = app.create_post(&alice).await;
    app.call(Method::DELETE, &format!("/posts/{dropped}"), Some(&alice), None)
        .await;

    let (status, body) = app.call(Method::GET, "/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let users = body["data"].as_array().unwrap();
    let profile = users
        .iter()
        .find(|u| u["id"] == json!(alice_id))
        .unwrap();
    assert_eq!(ids(&profile["posts"]), vec![kept.to_string()]);
    assert!(profile.get("password_hash").is_none());
}

#[tokio::test]
async fn test_protected_routes_require_a_valid_token() {
    let app = spawn_app();

    let (status, body) = app.call(Method::GET, "/posts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "status": false, "message": "missing token" }));

    let (status, body) = app.call(Method::GET, "/posts", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid token");
}

#[tokio::test]
async fn test_admin_routes_and_role_staleness() {
    let app = spawn_app();
    let (alice_id, alice) = app.sign_up("alice").await;

    let (status, _) = app
        .call(Method::GET, &format!("/admin/users/{alice_id}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Promote out of band; the token issued before still works with the new role.
    app.repo.set_user_role(alice_id, Role::Admin).await.unwrap();

    let (status, body) = app
        .call(Method::GET, &format!("/admin/users/{alice_id}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_admin_can_promote_and_audit_deleted_records() {
    let app = spawn_app();
    let (root_id, root) = app.sign_up("root").await;
    let (bob_id, bob) = app.sign_up("bob").await;
    app.repo.set_user_role(root_id, Role::Admin).await.unwrap();

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/admin/users/{bob_id}/role"),
            Some(&root),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");

    let post_id = app.create_post(&bob).await;
    app.call(Method::DELETE, &format!("/users/{bob_id}"), Some(&bob), None)
        .await;

    let (status, body) = app
        .call(Method::GET, &format!("/admin/posts/{post_id}"), Some(&root), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_deleted"], true);
    assert_eq!(body["data"]["deleted_by"], json!(bob_id));

    // Bob's token died with his account.
    let (status, _) = app.call(Method::GET, "/posts", Some(&bob), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_comment_ownership_over_http() {
    let app = spawn_app();
    let (_, alice) = app.sign_up("alice").await;
    let (_, bob) = app.sign_up("bob").await;
    let (_, carol) = app.sign_up("carol").await;
    let post_id = app.create_post(&bob).await;

    let comment = |token: String| {
        let app = &app;
        async move {
            let (_, body) = app
                .call(
                    Method::POST,
                    "/comments",
                    Some(&token),
                    Some(json!({ "post": post_id, "comment": "hi" })),
                )
                .await;
            body["data"]["id"].as_str().unwrap().to_string()
        }
    };

    let by_alice = comment(alice.clone()).await;
    let (status, _) = app
        .call(Method::DELETE, &format!("/comments/{by_alice}"), Some(&carol), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::DELETE, &format!("/comments/{by_alice}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let second = comment(alice.clone()).await;
    let (status, body) = app
        .call(Method::DELETE, &format!("/comments/{second}"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Comment deleted successfully");

    let (status, _) = app
        .call(Method::DELETE, &format!("/comments/{second}"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_failures_are_422_with_field_message() {
    let app = spawn_app();

    let (status, body) = app
        .call(
            Method::POST,
            "/users/register",
            None,
            Some(json!({ "name": "Al", "username": "al", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "username must be 3 to 32 characters");

    let (status, body) = app
        .call(Method::POST, "/users/register", None, Some(json!({ "name": "Al" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_malformed_path_id_is_enveloped_422() {
    let app = spawn_app();
    let (_, alice) = app.sign_up("alice").await;

    let (status, body) = app
        .call(Method::GET, "/public/posts/not-a-uuid", None, None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({ "status": false, "message": "Please provide a valid id." })
    );

    for uri in ["/posts/not-a-uuid", "/users/42", "/comments/not-a-uuid"] {
        let (status, body) = app.call(Method::GET, uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert_eq!(body["status"], false, "{uri}");
    }

    // The gate still runs first on protected routes.
    let (status, _) = app.call(Method::GET, "/posts/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_comment_against_unknown_post_is_400() {
    let app = spawn_app();
    let (_, alice) = app.sign_up("alice").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/comments",
            Some(&alice),
            Some(json!({ "post": Uuid::new_v4(), "comment": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide a valid post id.");
}

#[tokio::test]
async fn test_missing_role_seed_is_masked() {
    let app = spawn_app_with(InMemoryRepository::without_roles());

    let (status, body) = app
        .call(
            Method::POST,
            "/users/register",
            None,
            Some(json!({ "name": "Alice", "username": "alice", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], GENERIC_FAILURE_MESSAGE);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = spawn_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
