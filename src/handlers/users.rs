use axum::{
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use super::user_profile;
use crate::{
    AppState,
    auth::AuthUser,
    cascade::{CascadeCoordinator, USER_NOT_FOUND},
    error::ApiError,
    extract::{ValidatedJson, ValidatedPath},
    models::{
        LoginRequest, RegisterRequest, Role, TokenResponse, UpdateUserRequest, UserProfile,
        UserView,
    },
    password::{CredentialError, verify_credentials},
    repository::{NewUser, UserPatch, Visibility},
    response::ApiResponse,
};

pub const INVALID_CREDENTIALS: &str = "Invalid Credentials";

/// register_user
///
/// [Public Route] Creates an account with the default `user` role. The
/// password is hashed before it reaches the store.
///
/// A missing `user` role row means the database was never seeded; that is a
/// deployment fault and is reported as a non-public 500.
#[utoipa::path(
    post,
    path = "/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = UserView),
        (status = 409, description = "Username taken"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<ApiResponse<UserView>, ApiError> {
    let role = state
        .repo
        .find_role(Role::User)
        .await?
        .ok_or_else(|| ApiError::internal("System roles are not generated yet."))?;

    let password_hash = state
        .passwords
        .hash(&payload.password)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let user = state
        .repo
        .create_user(NewUser {
            name: payload.name,
            username: payload.username,
            password_hash,
            role,
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(ApiResponse::created(UserView::from(&user)))
}

/// login
///
/// [Public Route] Exchanges a username/password pair for a signed token. An
/// unknown user and a wrong password get the same 401.
#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid Credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<TokenResponse>, ApiError> {
    let identity = match verify_credentials(
        state.repo.as_ref(),
        &state.passwords,
        &payload.username,
        &payload.password,
    )
    .await
    {
        Ok(identity) => identity,
        Err(CredentialError::NoSuchUser | CredentialError::BadCredentials) => {
            tracing::debug!(username = %payload.username, "login rejected");
            return Err(ApiError::unauthenticated(INVALID_CREDENTIALS));
        }
        Err(CredentialError::Store(err)) => return Err(err.into()),
        Err(CredentialError::Hash(err)) => return Err(ApiError::internal(err.to_string())),
    };

    let token = state
        .tokens
        .issue(&identity)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(ApiResponse::ok(TokenResponse { token }))
}

/// list_users
///
/// [Authenticated Route] All live users with their live posts and comments.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "Users", body = [UserProfile]))
)]
pub async fn list_users(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<UserProfile>>, ApiError> {
    let users = state.repo.list_users().await?;

    let mut profiles = Vec::with_capacity(users.len());
    for user in users {
        profiles.push(user_profile(state.repo.as_ref(), user).await?);
    }
    Ok(ApiResponse::ok(profiles))
}

/// get_user
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    _auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state
        .repo
        .get_user(id, Visibility::Active)
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

    Ok(ApiResponse::ok(user_profile(state.repo.as_ref(), user).await?))
}

/// update_user
///
/// [Authenticated Route] Self-edit only; admins cannot edit other accounts
/// through this route. A new password is re-hashed.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserView),
        (status = 403, description = "Not yourself"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<ApiResponse<UserView>, ApiError> {
    if auth.id != id {
        return Err(ApiError::forbidden("You can't update another user's details"));
    }

    let password_hash = payload
        .password
        .as_deref()
        .map(|plaintext| state.passwords.hash(plaintext))
        .transpose()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let user = state
        .repo
        .update_user(
            id,
            UserPatch {
                name: payload.name,
                username: payload.username,
                password_hash,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

    Ok(ApiResponse::ok(UserView::from(&user)))
}

/// delete_user
///
/// [Authenticated Route] Self or admin. Runs the user cascade.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted successfully"),
        (status = 403, description = "Not yourself and not admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    CascadeCoordinator::new(state.repo.as_ref())
        .delete_user(&auth, id)
        .await?;

    Ok(ApiResponse::message(StatusCode::OK, "User deleted successfully"))
}
