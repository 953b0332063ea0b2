use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod cascade;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod response;
pub mod store;

// Route groups, one per gate (public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{AccessGate, AuthUser, TokenService};
pub use config::AppConfig;
pub use error::ApiError;
pub use password::PasswordPolicy;
pub use repository::RepositoryState;
pub use store::{InMemoryRepository, PostgresRepository};

use models::Role;

/// ApiDoc
///
/// OpenAPI document for every handler and wire model, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::users::register_user, handlers::users::login, handlers::users::list_users,
        handlers::users::get_user, handlers::users::update_user, handlers::users::delete_user,
        handlers::posts::public_list_posts, handlers::posts::public_get_post,
        handlers::posts::public_post_comments, handlers::posts::list_posts,
        handlers::posts::get_post, handlers::posts::create_post, handlers::posts::update_post,
        handlers::posts::delete_post,
        handlers::comments::list_comments, handlers::comments::get_comment,
        handlers::comments::create_comment, handlers::comments::update_comment,
        handlers::comments::delete_comment,
        handlers::admin::set_user_role, handlers::admin::audit_user,
        handlers::admin::audit_post, handlers::admin::audit_comment
    ),
    components(
        schemas(
            models::Role, models::Post, models::Comment, models::RegisterRequest,
            models::LoginRequest, models::UpdateUserRequest, models::CreatePostRequest,
            models::UpdatePostRequest, models::CreateCommentRequest, models::UpdateCommentRequest,
            models::SetRoleRequest, models::TokenResponse, models::UserView, models::PostSummary,
            models::CommentSummary, models::UserProfile, models::AuthorView, models::PostView,
            models::CommentOnPost, models::PostDetail, models::PostComments, models::CommentView,
            models::CommentDetail, models::UserAudit,
        )
    ),
    tags(
        (name = "blog-api", description = "Users, posts and comments with soft delete")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request needs, built once at startup and cloned per request.
/// No component reaches for a global: the store handle, the configuration and
/// the token and password services all travel through here.
#[derive(Clone)]
pub struct AppState {
    /// Entity Store (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub tokens: TokenService,
    pub passwords: PasswordPolicy,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            tokens: TokenService::from_config(&config),
            passwords: PasswordPolicy::new(config.password_hash_cost),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for AccessGate {
    fn from_ref(app_state: &AppState) -> AccessGate {
        AccessGate::new(app_state.tokens.clone(), app_state.repo.clone())
    }
}

/// auth_middleware
///
/// Runs the gate with no required role and attaches the resolved `AuthUser`
/// to the request, where the `AuthUser` extractor picks it up.
async fn auth_middleware(
    State(gate): State<AccessGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = gate.authorize(request.headers(), &[]).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// admin_middleware
///
/// Same as `auth_middleware` but requires `Role::Admin` (403 otherwise).
async fn admin_middleware(
    State(gate): State<AccessGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = gate.authorize(request.headers(), &[Role::Admin]).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the route groups behind their gates, the 404 fallback, and the
/// request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_middleware)),
        )
        .fallback(handlers::page_not_found)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span per request carrying method, uri and the `x-request-id` header, so
/// every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
