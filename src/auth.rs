use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

use crate::{config::AppConfig, error::ApiError};

/// Claims
///
/// Payload carried inside every admin bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the admin username the token was issued to.
    pub sub: String,
    /// Expiration Time (exp): absolute expiry, seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat): seconds since the epoch.
    pub iat: usize,
}

#[derive(Error, Debug)]
pub enum CredentialError {
    /// Bad signature, elapsed expiry, malformed token or missing subject.
    #[error("invalid token")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

static DECOY_HASH: LazyLock<String> = LazyLock::new(|| {
    bcrypt::hash("keny-cafe-decoy-password", bcrypt::DEFAULT_COST).unwrap_or_default()
});

/// CredentialService
///
/// Password hashing and stateless bearer-token issuance/verification. There is no
/// revocation list: a token stays valid until its `exp` passes.
#[derive(Clone)]
pub struct CredentialService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl CredentialService {
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

    /// One-way salted bcrypt hash at the library's default cost.
    pub fn hash_password(plaintext: &str) -> Result<String, CredentialError> {
        Ok(bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)?)
    }

    /// Delegates to bcrypt's own verify. A malformed stored hash never verifies.
    pub fn verify_password(plaintext: &str, hash: &str) -> bool {
        bcrypt::verify(plaintext, hash).unwrap_or(false)
    }

    /// A real hash at the default cost, for checking logins of unknown usernames.
    pub fn decoy_hash() -> &'static str {
        DECOY_HASH.as_str()
    }

    pub fn issue_token(&self, subject: &str) -> Result<String, CredentialError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp().max(0) as usize,
            exp: (now + self.ttl).timestamp().max(0) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(CredentialError::Signing)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, CredentialError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| CredentialError::InvalidToken)?;

        if data.claims.sub.trim().is_empty() {
            return Err(CredentialError::InvalidToken);
        }
        Ok(data.claims)
    }
}

/// AdminPrincipal
///
/// The resolved identity of an authenticated admin request. There is exactly one
/// principal kind, so handlers only need to know that one is present.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminPrincipal {
    pub username: String,
}

/// Resolves the principal from the `Authorization: Bearer <token>` header.
///
/// A missing (or non-Bearer) header is rejected as "Not authenticated"; a token that
/// fails verification is rejected as "Invalid token". Both are 401s.
impl<S> FromRequestParts<S> for AdminPrincipal
where
    S: Send + Sync,
    CredentialService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by the access gate for this request.
        if let Some(principal) = parts.extensions.get::<AdminPrincipal>() {
            return Ok(principal.clone());
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::Unauthenticated("Not authenticated".to_string()))?;

        let credentials = CredentialService::from_ref(state);
        let claims = credentials.verify_token(token)?;

        Ok(AdminPrincipal {
            username: claims.sub,
        })
    }
}

/// Extracts the credentials from a `Bearer` authorization value. The scheme is
/// matched case-insensitively; an empty credential counts as absent.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
