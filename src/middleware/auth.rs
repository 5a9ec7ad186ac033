use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::UserId,
};

/// Claims carried by the bearer token; `id` is the user identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub exp: usize,
}

/// Verifies HS256 bearer tokens issued by the identity service
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Extracts the user id from an `Authorization` header value.
    /// The `Bearer ` prefix is optional.
    pub fn user_id(&self, header_value: &str) -> AppResult<UserId> {
        let token = header_value
            .strip_prefix("Bearer ")
            .unwrap_or(header_value)
            .trim();

        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        if data.claims.id.is_empty() {
            return Err(AppError::Unauthorized("Token carries no user id".to_string()));
        }

        Ok(data.claims.id)
    }

    /// Signs a token for `user_id`, used by tooling and tests
    pub fn issue(&self, user_id: &str, ttl: Duration) -> AppResult<String> {
        let claims = Claims {
            id: user_id.to_string(),
            exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }
}

/// Authenticated caller, extracted from the `Authorization` header
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let verifier = Arc::<JwtVerifier>::from_ref(state);
        verifier.user_id(header).map(CurrentUser)
    }
}
