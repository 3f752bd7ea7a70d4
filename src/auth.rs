use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    config::AppConfig,
    error::AppError,
    models::User,
    repository::{RepositoryState, StoreError},
};

/// Claims
///
/// Payload of every issued token. Signed with HS256; `exp` is always validated.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id, as a decimal string.
    pub sub: String,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: u64,
    /// Issued At (iat), seconds since the epoch.
    pub iat: u64,
}

/// TokenKeys
///
/// Signing material. New tokens are always signed with `current`; `previous` is only
/// accepted on verification.
#[derive(Clone)]
pub struct TokenKeys {
    pub current: String,
    pub previous: Option<String>,
    pub ttl_secs: u64,
}

impl From<&AppConfig> for TokenKeys {
    fn from(config: &AppConfig) -> Self {
        Self {
            current: config.jwt_secret.clone(),
            previous: config.jwt_previous_secret.clone(),
            ttl_secs: config.token_ttl_secs,
        }
    }
}

/// AuthService
///
/// Sole issuer and verifier of bearer tokens, and owner of password hashing.
#[derive(Clone)]
pub struct AuthService {
    repo: RepositoryState,
    keys: TokenKeys,
}

fn missing_token() -> AppError {
    AppError::Unauthorized("Missing or malformed token".to_string())
}

fn invalid_token() -> AppError {
    AppError::Unauthorized("Invalid token".to_string())
}

impl AuthService {
    pub fn new(repo: RepositoryState, keys: TokenKeys) -> Self {
        Self { repo, keys }
    }

    /// register
    ///
    /// Hashes the password with Argon2id (random salt) and stores the user.
    /// A taken username is reported as a conflict and leaves the existing row untouched.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AppError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let password_hash = hash_password(password.to_string()).await?;

        let user = self
            .repo
            .create_user(username, &password_hash)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation => {
                    AppError::Conflict("Username already exists".to_string())
                }
                other => AppError::from(other),
            })?;

        tracing::info!(user_id = user.id, "user_registered");
        Ok(user)
    }

    /// login
    ///
    /// Returns a signed token for valid credentials. An unknown username and a wrong
    /// password fail identically.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .repo
            .find_user_by_username(username)
            .await?
            .ok_or_else(AppError::invalid_credentials)?;

        if !verify_password(password.to_string(), user.password_hash).await? {
            return Err(AppError::invalid_credentials());
        }

        tracing::info!(user_id = user.id, "user_logged_in");
        self.issue_token(user.id)
    }

    /// Signs a fresh token for `user_id` valid for the configured TTL.
    pub fn issue_token(&self, user_id: i64) -> Result<String, AppError> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.keys.ttl_secs),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.keys.current.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "token signing failed");
            AppError::Internal
        })
    }

    /// verify
    ///
    /// Checks signature and expiry against the current secret, then the previous one,
    /// and returns the embedded user id.
    pub fn verify(&self, token: &str) -> Result<i64, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let secrets = std::iter::once(&self.keys.current).chain(self.keys.previous.as_ref());

        for secret in secrets {
            let key = DecodingKey::from_secret(secret.as_bytes());
            match decode::<Claims>(token, &key, &validation) {
                Ok(data) => return data.claims.sub.parse().map_err(|_| invalid_token()),
                Err(e) => tracing::debug!(kind = ?e.kind(), "token rejected"),
            }
        }

        Err(invalid_token())
    }
}

async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "hashing task failed");
        AppError::Internal
    })?
    .map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        AppError::Internal
    })
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "verification task failed");
        AppError::Internal
    })
}

/// AuthUser
///
/// The verified identity of a request. Usable as a handler argument on any protected
/// route; rejects with 401 and a `{message}` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by the route-level auth layer.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(missing_token)?;

        let id = AuthService::from_ref(state).verify(token)?;
        Ok(AuthUser { id })
    }
}
