use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::sweeper;
use crate::state::AppState;

use super::check_auth;

// POST /internal/sweeps/expire-bookings
//
// Meant to be hit hourly by an external scheduler; safe to call more often.
pub async fn run_expire_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let now = Utc::now().naive_utc();
    let expired = sweeper::expire_pending_bookings(&state, now).await?;
    Ok(Json(serde_json::json!({ "ok": true, "expired": expired })))
}

// POST /internal/sweeps/publish-reviews
//
// Meant to be hit daily by an external scheduler; safe to call more often.
pub async fn run_publish_reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let now = Utc::now().naive_utc();
    let published = sweeper::publish_expired_reviews(&state, now).await?;
    Ok(Json(serde_json::json!({ "ok": true, "published": published })))
}

// GET /api/ops/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let (by_status, unpublished_reviews) = {
        let db = state.store.conn.lock().unwrap();
        (
            queries::count_bookings_by_status(&db)?,
            queries::count_unpublished_reviews(&db)?,
        )
    };

    let bookings_by_status: serde_json::Map<String, serde_json::Value> = by_status
        .into_iter()
        .map(|(status, count)| (status, serde_json::json!(count)))
        .collect();

    Ok(Json(serde_json::json!({
        "bookings_by_status": bookings_by_status,
        "unpublished_reviews": unpublished_reviews,
    })))
}
