use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use uuid::Uuid;

use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod booking;
pub mod event;

/// Set by the upstream auth layer to the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "booking-api",
    };

    success(payload, "Health check successful").into_response()
}

/// The acting user, taken from the `X-User-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::AuthError("missing X-User-Id header".into()))?
            .to_str()
            .map_err(|_| AppError::AuthError("X-User-Id header is not valid text".into()))?;

        Uuid::parse_str(raw.trim())
            .map(UserId)
            .map_err(|_| AppError::AuthError("X-User-Id header is not a valid UUID".into()))
    }
}
