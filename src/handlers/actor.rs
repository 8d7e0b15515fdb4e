//! Acting user, as asserted by the upstream session provider.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;

pub const ACTOR_HEADER: &str = "x-user-id";

/// Authenticated user id taken from the `x-user-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::unauthorized("Missing x-user-id header"))?;

        Ok(Actor(user_id.to_string()))
    }
}
