use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{
    auth::token::hash_token,
    error::ApiError,
    state::AppState,
    users::repo_types::User,
};

/// Resolves `Authorization: Bearer <api_token>` to the user it was issued to.
pub struct ApiUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for ApiUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthenticated)?;

        match state.store.find_by_api_token(&hash_token(token)).await? {
            Some(user) => Ok(ApiUser(user)),
            None => {
                warn!("unknown api token");
                Err(ApiError::Unauthenticated)
            }
        }
    }
}
