pub mod bookings;
pub mod calendar;
pub mod events;
pub mod health;
pub mod listings;
pub mod ops;
pub mod reviews;

use axum::http::HeaderMap;

use crate::errors::AppError;

/// Bearer-token check shared by the JSON API surface.
pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthenticated);
    }
    Ok(())
}
