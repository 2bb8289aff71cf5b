//! Session tokens: issuance and TTL-bound validation.

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{NewToken, Token, User},
    repository::{RepoError, Repository},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Live,
    Expired,
}

/// A token is live while `now - creation_time <= ttl`; the boundary itself is live.
pub fn liveness(token: &Token, now: DateTime<Utc>, ttl: TimeDelta) -> Liveness {
    if now - token.creation_time <= ttl {
        Liveness::Live
    } else {
        Liveness::Expired
    }
}

/// AuthError
///
/// Why a token was refused. `Absent` and `Expired` stay separate internally so the
/// decision can be audited, but both surface as the same 401.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token not found")]
    Absent,
    #[error("token expired")]
    Expired,
    #[error(transparent)]
    Storage(#[from] RepoError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Absent | AuthError::Expired => ApiError::invalid_token(),
            AuthError::Storage(e) => e.into(),
        }
    }
}

/// Persists a fresh session for `user_id`, stamped with the current time.
pub async fn issue(repo: &dyn Repository, user_id: i64) -> Result<Token, RepoError> {
    let token = repo
        .create_token(NewToken {
            token: Uuid::new_v4(),
            user_id,
            creation_time: Utc::now(),
        })
        .await?;
    tracing::info!(user_id, token_id = token.id, "session token issued");
    Ok(token)
}

/// Resolves a presented token value to its owning user, as of `now`.
pub async fn validate(
    repo: &dyn Repository,
    value: Uuid,
    now: DateTime<Utc>,
    ttl: TimeDelta,
) -> Result<User, AuthError> {
    let token = repo.find_token(value).await?.ok_or(AuthError::Absent)?;

    if liveness(&token, now, ttl) == Liveness::Expired {
        tracing::debug!(token_id = token.id, user_id = token.user_id, "token expired");
        return Err(AuthError::Expired);
    }

    match repo.get_user(token.user_id).await {
        Ok(user) => Ok(user),
        Err(RepoError::NotFound { .. }) => Err(AuthError::Absent),
        Err(e) => Err(e.into()),
    }
}
