use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{ApiError, StoreError},
    models::Role,
    repository::{Repository, RepositoryState, Visibility},
};

pub const MISSING_TOKEN: &str = "missing token";
pub const INVALID_TOKEN: &str = "invalid token";
pub const INSUFFICIENT_RIGHTS: &str = "You have not sufficient rights to access this route.";

/// Claims
///
/// The signed claim set. `role` is informational: verification always replaces
/// it with the role currently stored for `sub`. `exp` is only present when a
/// token lifetime is configured, and unknown claims are ignored on decode so
/// the set can grow without invalidating issued tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    /// The subject is unknown or soft-deleted.
    #[error("token subject is no longer active")]
    InactiveSubject,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// AuthUser
///
/// The resolved identity of an authenticated request: `{id, username, role}`
/// with `role` read fresh from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Role membership test. An empty set admits every role.
    pub fn require_any(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.is_empty() || roles.contains(&self.role) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.id, role = %self.role, "role check failed");
            Err(ApiError::forbidden(INSUFFICIENT_RIGHTS))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// TokenService
///
/// HS256 issuance and verification with a server-held secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: Option<u64>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: Option<u64>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.token_secret, config.token_ttl_secs)
    }

    /// issue
    ///
    /// Signs the claim set for `identity`.
    pub fn issue(&self, identity: &AuthUser) -> Result<String, TokenError> {
        let iat = unix_now();
        let claims = Claims {
            sub: identity.id,
            username: identity.username.clone(),
            role: identity.role,
            iat,
            exp: self.ttl_secs.map(|ttl| iat + ttl),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Signing)
    }

    /// decode
    ///
    /// Signature and expiry check only. `exp` is required when a lifetime is
    /// configured and checked whenever it is present.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        if self.ttl_secs.is_none() {
            validation.required_spec_claims.clear();
        }

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })
    }

    /// verify
    ///
    /// Decodes `token`, then re-resolves the subject against the store. The
    /// returned role is the one stored now, not the one in the token.
    pub async fn verify(&self, token: &str, repo: &dyn Repository) -> Result<AuthUser, TokenError> {
        let claims = self.decode(token)?;

        let user = repo
            .get_user(claims.sub, Visibility::Active)
            .await?
            .ok_or(TokenError::InactiveSubject)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// AccessGate
///
/// Token verification followed by a role check. With no required roles it only
/// authenticates.
#[derive(Clone)]
pub struct AccessGate {
    tokens: TokenService,
    repo: RepositoryState,
}

impl AccessGate {
    pub fn new(tokens: TokenService, repo: RepositoryState) -> Self {
        Self { tokens, repo }
    }

    /// authorize
    ///
    /// `Unauthenticated -> TokenChecked -> RoleChecked -> Authorized`. Fails
    /// with 401 for a missing or rejected token and 403 for a role mismatch.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        required: &[Role],
    ) -> Result<AuthUser, ApiError> {
        let token = bearer_token(headers).ok_or_else(|| {
            tracing::debug!("request carried no bearer token");
            ApiError::unauthenticated(MISSING_TOKEN)
        })?;

        let user = match self.tokens.verify(token, self.repo.as_ref()).await {
            Ok(user) => user,
            Err(TokenError::Store(err)) => return Err(err.into()),
            Err(err) => {
                tracing::debug!(reason = %err, "token rejected");
                return Err(ApiError::unauthenticated(INVALID_TOKEN));
            }
        };

        user.require_any(required)?;
        Ok(user)
    }
}

/// AuthUser Extractor
///
/// Reuses the identity a gate middleware already attached to the request;
/// otherwise runs the gate with no required roles.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AccessGate: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let gate = AccessGate::from_ref(state);
        let user = gate.authorize(&parts.headers, &[]).await?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
