//! Acting identity, as asserted by the upstream auth layer.
//!
//! The auth proxy sets `x-user-id` (and optionally `x-user-name`) on every
//! authenticated request. Requests without them act as guests.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use sketchroom_core::Actor;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn actor_from(headers: &HeaderMap) -> Option<Actor> {
    let user_id = header(headers, USER_ID_HEADER)?;
    let name = header(headers, USER_NAME_HEADER).unwrap_or_else(|| user_id.clone());
    Some(Actor::new(user_id, name))
}

/// An authenticated caller; rejects with 401 when absent.
pub struct Identity(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from(&parts.headers)
            .map(Identity)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// An authenticated caller or a guest.
pub struct MaybeIdentity(pub Option<Actor>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(actor_from(&parts.headers)))
    }
}
