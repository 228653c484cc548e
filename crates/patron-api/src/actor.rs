//! The acting user, taken from the `X-Actor-Id` header.
//!
//! The service credential in front of the API authenticates the caller; this
//! header only says on whose behalf it acts. Roles are checked by the engine.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Uuid);

impl<S> FromRequestParts<S> for Actor
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let raw = parts
      .headers
      .get(ACTOR_HEADER)
      .ok_or_else(|| ApiError::Unauthenticated("missing X-Actor-Id header".into()))?
      .to_str()
      .map_err(|_| ApiError::Unauthenticated("X-Actor-Id is not valid ASCII".into()))?;
    let id = Uuid::parse_str(raw.trim())
      .map_err(|_| ApiError::Unauthenticated(format!("X-Actor-Id is not a UUID: {raw:?}")))?;
    Ok(Actor(id))
  }
}
