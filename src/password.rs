use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use crate::{auth::AuthUser, error::StoreError, repository::Repository};

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    HashingFailed(String),

    #[error("stored password hash is malformed")]
    InvalidHashFormat,

    #[error("failed to verify password: {0}")]
    VerificationFailed(String),
}

/// PasswordPolicy
///
/// Argon2id with the default memory and lane settings and a configurable time
/// cost. The cost of an existing hash is read back from the hash itself, so
/// raising it only affects new hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub cost: u32,
}

impl PasswordPolicy {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    fn hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(
            Params::DEFAULT_M_COST,
            self.cost,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Returns a salted PHC string safe to store.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Constant-time comparison of `plaintext` against a stored digest.
    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(digest).map_err(|_| PasswordError::InvalidHashFormat)?;

        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
        }
    }
}

/// CredentialError
///
/// Why a username/password pair was rejected. `NoSuchUser` and `BadCredentials`
/// are told apart here for logging only; callers answer both the same way.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no such user")]
    NoSuchUser,

    #[error("bad credentials")]
    BadCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hash(#[from] PasswordError),
}

/// verify_credentials
///
/// The Credential Verifier. Looks up an active user by exact username and
/// checks the password against the stored hash. Read-only.
pub async fn verify_credentials(
    repo: &dyn Repository,
    policy: &PasswordPolicy,
    username: &str,
    plaintext: &str,
) -> Result<AuthUser, CredentialError> {
    let user = repo
        .get_user_by_username(username)
        .await?
        .ok_or(CredentialError::NoSuchUser)?;

    if !policy.verify(plaintext, &user.password_hash)? {
        return Err(CredentialError::BadCredentials);
    }

    Ok(AuthUser {
        id: user.id,
        username: user.username,
        role: user.role,
    })
}
