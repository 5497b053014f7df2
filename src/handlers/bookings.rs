use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Booking, Role, ServiceLocation};
use crate::services::lifecycle::{self, CreateInquiryInput};
use crate::state::AppState;

use super::check_auth;

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub client_id: String,
    pub host_id: String,
    pub listing_id: String,
    pub scheduled_date: NaiveDateTime,
    pub estimated_duration_minutes: i32,
    pub service_location: ServiceLocation,
    pub pricing: Option<serde_json::Value>,
    pub cancellation_policy: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let booking = lifecycle::create_inquiry(
        &state,
        CreateInquiryInput {
            client_id: body.client_id,
            host_id: body.host_id,
            listing_id: body.listing_id,
            scheduled_date: body.scheduled_date,
            estimated_duration_minutes: body.estimated_duration_minutes,
            service_location: body.service_location,
            pricing: body.pricing,
            cancellation_policy: body.cancellation_policy,
        },
    )
    .await?;
    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct ActorRequest {
    pub actor_id: String,
}

// POST /api/bookings/:id/request
pub async fn request_to_book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let booking = lifecycle::request_to_book(&state, &id, &body.actor_id).await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/instant-book
pub async fn instant_book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let booking = lifecycle::instant_book(&state, &id, &body.actor_id).await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/approve
pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let booking = lifecycle::approve_booking(&state, &id, &body.actor_id).await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/confirm-payment
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let booking = lifecycle::confirm_payment(&state, &id, &body.actor_id).await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/check-in
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let booking = lifecycle::check_in(&state, &id, &body.actor_id).await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/check-out
pub async fn check_out(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let booking = lifecycle::check_out(&state, &id, &body.actor_id).await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    pub actor_id: String,
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let booking = lifecycle::cancel_booking(&state, &id, &body.actor_id, body.reason).await?;
    Ok(Json(booking))
}

// GET /api/bookings/:id
#[derive(Deserialize)]
pub struct ActorQuery {
    pub actor_id: String,
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let booking = lifecycle::get_booking_for(&state, &id, &query.actor_id)?;
    Ok(Json(booking))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct ListQuery {
    pub user_id: String,
    pub role: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let role = match query.role.as_deref() {
        None => None,
        Some(s) => Some(
            Role::parse(s).ok_or_else(|| AppError::Validation(format!("unknown role: {s}")))?,
        ),
    };
    let bookings = lifecycle::list_bookings(&state, &query.user_id, role, query.limit.unwrap_or(50))?;
    Ok(Json(bookings))
}
