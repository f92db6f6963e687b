use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;

use crate::error::AppError;

/// Header carrying the caller identity established by the upstream gateway.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Already-authenticated caller. Authentication happens upstream; this only
/// lifts the identity out of the request.
#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(AppError::unauthorized)?;

        Ok(Actor {
            user_id: user_id.to_string(),
        })
    }
}
