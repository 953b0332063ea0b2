use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, Request, StatusCode, header},
};
use blog_api::{
    AppConfig, AppState, InMemoryRepository,
    auth::{
        AccessGate, AuthUser, Claims, INSUFFICIENT_RIGHTS, INVALID_TOKEN, MISSING_TOKEN,
        TokenError, TokenService,
    },
    models::{Role, User},
    password::{CredentialError, PasswordPolicy, verify_credentials},
    repository::{DeletionStamp, NewUser, Repository, RepositoryState},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

const SECRET: &str = "auth-test-secret";

// --- Helpers ---

async fn seed_user(repo: &InMemoryRepository, username: &str, password: &str) -> User {
    let role = repo.find_role(Role::User).await.unwrap().unwrap();
    repo.create_user(NewUser {
        name: username.to_uppercase(),
        username: username.to_string(),
        password_hash: PasswordPolicy::new(1).hash(password).unwrap(),
        role,
    })
    .await
    .unwrap()
}

fn identity(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        username: user.username.clone(),
        role: user.role,
    }
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// --- Token Service ---

#[tokio::test]
async fn test_verify_resolves_current_role_not_issued_role() {
    let repo = InMemoryRepository::seeded();
    let alice = seed_user(&repo, "alice", "secret1").await;
    let tokens = TokenService::new(SECRET, None);

    let token = tokens.issue(&identity(&alice)).unwrap();
    assert_eq!(tokens.decode(&token).unwrap().role, Role::User);

    repo.set_user_role(alice.id, Role::Admin).await.unwrap();

    let verified = tokens.verify(&token, &repo).await.unwrap();
    assert_eq!(verified.id, alice.id);
    assert_eq!(verified.role, Role::Admin);
}

#[tokio::test]
async fn test_verify_rejects_soft_deleted_subject() {
    let repo = InMemoryRepository::seeded();
    let alice = seed_user(&repo, "alice", "secret1").await;
    let tokens = TokenService::new(SECRET, None);
    let token = tokens.issue(&identity(&alice)).unwrap();

    repo.soft_delete_user(alice.id, DeletionStamp::now(alice.id))
        .await
        .unwrap();

    assert!(matches!(
        tokens.verify(&token, &repo).await,
        Err(TokenError::InactiveSubject)
    ));
}

#[tokio::test]
async fn test_expired_token_is_rejected_when_ttl_configured() {
    let repo = InMemoryRepository::seeded();
    let alice = seed_user(&repo, "alice", "secret1").await;

    let stale = Claims {
        sub: alice.id,
        username: alice.username.clone(),
        role: Role::User,
        iat: now() - 7200,
        exp: Some(now() - 3600),
    };
    let token = encode(
        &Header::default(),
        &stale,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let tokens = TokenService::new(SECRET, Some(600));
    assert!(matches!(
        tokens.verify(&token, &repo).await,
        Err(TokenError::Expired)
    ));
}

#[tokio::test]
async fn test_ttl_tokens_carry_exp_and_verify() {
    let repo = InMemoryRepository::seeded();
    let alice = seed_user(&repo, "alice", "secret1").await;
    let tokens = TokenService::new(SECRET, Some(600));

    let token = tokens.issue(&identity(&alice)).unwrap();
    let claims = tokens.decode(&token).unwrap();
    assert_eq!(claims.exp, Some(claims.iat + 600));
    assert!(tokens.verify(&token, &repo).await.is_ok());
}

#[tokio::test]
async fn test_ttl_service_rejects_tokens_without_exp() {
    let repo = InMemoryRepository::seeded();
    let alice = seed_user(&repo, "alice", "secret1").await;
    let unbounded = TokenService::new(SECRET, None)
        .issue(&identity(&alice))
        .unwrap();

    assert!(matches!(
        TokenService::new(SECRET, Some(600)).decode(&unbounded),
        Err(TokenError::Malformed)
    ));
}

#[test]
fn test_garbage_token_is_malformed() {
    assert!(matches!(
        TokenService::new(SECRET, None).decode("not.a.jwt"),
        Err(TokenError::Malformed)
    ));
}

// --- Access Control Gate ---

fn gate_for(repo: Arc<InMemoryRepository>) -> (AccessGate, TokenService) {
    let tokens = TokenService::new(SECRET, None);
    let gate = AccessGate::new(tokens.clone(), repo as RepositoryState);
    (gate, tokens)
}

#[tokio::test]
async fn test_gate_missing_token_is_401() {
    let (gate, _) = gate_for(Arc::new(InMemoryRepository::seeded()));

    let err = gate.authorize(&HeaderMap::new(), &[]).await.unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(err.message, MISSING_TOKEN);
}

#[tokio::test]
async fn test_gate_invalid_token_is_401() {
    let (gate, _) = gate_for(Arc::new(InMemoryRepository::seeded()));

    let err = gate.authorize(&bearer("forged"), &[]).await.unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(err.message, INVALID_TOKEN);
}

#[tokio::test]
async fn test_gate_role_mismatch_is_403() {
    let repo = Arc::new(InMemoryRepository::seeded());
    let alice = seed_user(&repo, "alice", "secret1").await;
    let (gate, tokens) = gate_for(repo);
    let token = tokens.issue(&identity(&alice)).unwrap();

    let err = gate
        .authorize(&bearer(&token), &[Role::Admin])
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);
    assert_eq!(err.message, INSUFFICIENT_RIGHTS);
}

#[tokio::test]
async fn test_gate_admits_any_listed_role() {
    let repo = Arc::new(InMemoryRepository::seeded());
    let alice = seed_user(&repo, "alice", "secret1").await;
    let (gate, tokens) = gate_for(repo.clone());
    let token = tokens.issue(&identity(&alice)).unwrap();

    let user = gate
        .authorize(&bearer(&token), &[Role::User, Role::Admin])
        .await
        .unwrap();
    assert_eq!(user.id, alice.id);

    // Promotion is visible on the very next request with the same token.
    repo.set_user_role(alice.id, Role::Admin).await.unwrap();
    let user = gate.authorize(&bearer(&token), &[Role::Admin]).await.unwrap();
    assert_eq!(user.role, Role::Admin);
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn test_auth_user_extractor_resolves_identity_from_state() {
    let repo = Arc::new(InMemoryRepository::seeded());
    let alice = seed_user(&repo, "alice", "secret1").await;
    let state = AppState::new(repo as RepositoryState, AppConfig::default());
    let token = state.tokens.issue(&identity(&alice)).unwrap();

    let request = Request::builder()
        .uri("/posts")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(())
        .unwrap();
    let (mut parts, _) = request.into_parts();

    let user = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();
    assert_eq!(user, identity(&alice));
    // Cached for later extractors in the same request.
    assert_eq!(parts.extensions.get::<AuthUser>(), Some(&user));
}

#[tokio::test]
async fn test_auth_user_extractor_rejects_without_header() {
    let state = AppState::new(
        Arc::new(InMemoryRepository::seeded()) as RepositoryState,
        AppConfig::default(),
    );
    let (mut parts, _) = Request::builder().uri("/posts").body(()).unwrap().into_parts();

    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

// --- Credential Verifier ---

#[tokio::test]
async fn test_credentials_accept_correct_password() {
    let repo = InMemoryRepository::seeded();
    let alice = seed_user(&repo, "alice", "secret1").await;

    let verified = verify_credentials(&repo, &PasswordPolicy::new(1), "alice", "secret1")
        .await
        .unwrap();
    assert_eq!(verified, identity(&alice));
}

#[tokio::test]
async fn test_credentials_reject_unknown_user_and_wrong_password() {
    let repo = InMemoryRepository::seeded();
    seed_user(&repo, "alice", "secret1").await;
    let policy = PasswordPolicy::new(1);

    assert!(matches!(
        verify_credentials(&repo, &policy, "mallory", "secret1").await,
        Err(CredentialError::NoSuchUser)
    ));
    assert!(matches!(
        verify_credentials(&repo, &policy, "alice", "wrong-pass").await,
        Err(CredentialError::BadCredentials)
    ));
    // Username match is exact.
    assert!(matches!(
        verify_credentials(&repo, &policy, "Alice", "secret1").await,
        Err(CredentialError::NoSuchUser)
    ));
}

#[tokio::test]
async fn test_credentials_ignore_soft_deleted_users() {
    let repo = InMemoryRepository::seeded();
    let alice = seed_user(&repo, "alice", "secret1").await;
    repo.soft_delete_user(alice.id, DeletionStamp::now(alice.id))
        .await
        .unwrap();

    assert!(matches!(
        verify_credentials(&repo, &PasswordPolicy::new(1), "alice", "secret1").await,
        Err(CredentialError::NoSuchUser)
    ));
}
