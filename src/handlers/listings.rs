use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Listing, Profile};
use crate::state::AppState;

use super::check_auth;

// PUT /api/listings/:id
#[derive(Deserialize)]
pub struct UpsertListingRequest {
    pub host_id: String,
    pub title: String,
    pub price_cents: i64,
    pub service_type: String,
    pub active: Option<bool>,
}

pub async fn upsert_listing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpsertListingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let listing = Listing {
        id,
        host_id: body.host_id,
        title: body.title,
        price_cents: body.price_cents,
        service_type: body.service_type,
        active: body.active.unwrap_or(true),
        updated_at: Utc::now().naive_utc(),
    };
    {
        let db = state.store.conn.lock().unwrap();
        queries::upsert_listing(&db, &listing)?;
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

// PUT /api/profiles/:id
#[derive(Deserialize)]
pub struct UpsertProfileRequest {
    pub display_name: String,
    pub photo_url: Option<String>,
}

pub async fn upsert_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpsertProfileRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let profile = Profile {
        id,
        display_name: body.display_name,
        photo_url: body.photo_url,
        updated_at: Utc::now().naive_utc(),
    };
    {
        let db = state.store.conn.lock().unwrap();
        queries::upsert_profile(&db, &profile)?;
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
