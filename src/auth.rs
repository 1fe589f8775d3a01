use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, Result},
    models::Role,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of every bearer token. The subject is the account login; the role is
/// embedded so clients can render the right UI without another round trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (sub): the login of the account.
    pub sub: String,
    pub role: Role,
    /// Expiration Time (exp): seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat): seconds since the epoch.
    pub iat: usize,
}

/// TokenService
///
/// Issues and validates HS256 tokens signed with the shared secret. A token stays
/// valid until it expires; there is no refresh or revocation.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, Duration::minutes(config.token_ttl_minutes))
    }

    /// issue
    ///
    /// Signs a token for `login` that expires `ttl` after now.
    pub fn issue(&self, login: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: login.to_string(),
            role,
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// validate
    ///
    /// Any failure (bad signature, malformed payload, expiry in the past) collapses
    /// into `InvalidToken`.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // Expiry is exact; an expired token is rejected immediately.
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AppError::InvalidToken
            })
    }
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Handlers take it as an
/// argument; its presence guarantees the token was valid and the account exists.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub login: String,
    /// Role as currently stored for the account, not as claimed in the token.
    pub role: Role,
}

impl AuthUser {
    /// Fails with `Forbidden` unless the caller is an admin.
    pub fn require_admin(&self) -> Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Moderator | Role::User => {
                Err(AppError::Forbidden("Only admins can add users".to_string()))
            }
        }
    }
}

/// Token part of an `Authorization` value. The scheme name is case-insensitive,
/// so `Bearer`, `bearer` and `BEARER` are all accepted.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// AuthUser Extractor Implementation
///
/// 1. Extracts the `Authorization: Bearer <token>` header (any scheme casing).
/// 2. Validates the token through the `TokenService`.
/// 3. Looks the subject up in the credential store, so a token for an account that
///    no longer exists is refused.
///
/// Rejection: `AppError::InvalidToken` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let repo = RepositoryState::from_ref(state);
        let tokens = TokenService::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AppError::InvalidToken)?;

        let claims = tokens.validate(token)?;

        let user = repo
            .find_user_by_login(&claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        Ok(AuthUser {
            id: user.id,
            login: user.login,
            role: user.role,
        })
    }
}
