use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{config::AppConfig, error::ApiError, models::Role, repository::RepositoryState, tokens};

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "x-token";

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request: just what the policy and
/// the create-listing handler need, nothing loaded beyond the user row.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub role: Role,
}

/// Reads the token from `x-token`, falling back to `Authorization: Bearer <token>`.
/// Anything that is not a UUID is treated as missing.
pub fn token_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    let raw = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
        })?;
    Uuid::parse_str(raw.trim()).ok()
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses an identity already resolved earlier in the same request (the auth
///    middleware stores it in the request extensions).
/// 2. Extracts the token from the headers.
/// 3. Validates it against the token store with the configured TTL.
///
/// Rejection: `ApiError::Authentication` (401) for every token problem.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let value = token_from_headers(&parts.headers).ok_or_else(ApiError::invalid_token)?;

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let user = tokens::validate(repo.as_ref(), value, Utc::now(), config.token_ttl)
            .await
            .inspect_err(|e| tracing::debug!(reason = %e, "token rejected"))?;

        let auth_user = AuthUser {
            id: user.id,
            name: user.name,
            role: user.role,
        };
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}
