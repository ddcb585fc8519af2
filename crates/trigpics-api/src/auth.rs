//! Caller identity.
//!
//! Authentication happens upstream; the gateway in front of the API forwards
//! the user id and admin flag as headers. Every photo route requires them.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use trigpics_core::models::Actor;
use trigpics_core::AppError;

use crate::constants::{USER_ADMIN_HEADER, USER_ID_HEADER};
use crate::error::HttpAppError;

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy)]
pub struct RequestActor(pub Actor);

impl<S> FromRequestParts<S> for RequestActor
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
            .map(RequestActor)
            .map_err(HttpAppError::from)
    }
}

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header".to_string()))?;

    let user_id = raw
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Unauthorized("Invalid X-User-Id header".to_string()))?;

    let is_admin = headers
        .get(USER_ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);

    Ok(Actor::new(user_id, is_admin))
}
