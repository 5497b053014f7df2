use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::Review;
use crate::services::reviews::{self, ReviewChanges, SubmitReviewInput};
use crate::state::AppState;

use super::check_auth;

// POST /api/reviews
#[derive(Deserialize)]
pub struct SubmitReviewRequest {
    pub booking_id: String,
    pub author_id: String,
    pub rating: i32,
    pub category_ratings: Option<BTreeMap<String, i32>>,
    pub content: String,
}

pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SubmitReviewRequest>,
) -> Result<Json<Review>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let review = reviews::submit_review(
        &state,
        SubmitReviewInput {
            booking_id: body.booking_id,
            author_id: body.author_id,
            rating: body.rating,
            category_ratings: body.category_ratings,
            content: body.content,
        },
    )
    .await?;
    Ok(Json(review))
}

// PATCH /api/reviews/:id
#[derive(Deserialize)]
pub struct UpdateReviewRequest {
    pub author_id: String,
    pub rating: Option<i32>,
    pub category_ratings: Option<BTreeMap<String, i32>>,
    pub content: Option<String>,
}

pub async fn update_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateReviewRequest>,
) -> Result<Json<Review>, AppError> {
    check_auth(&headers, &state.config.api_token)?;

    let review = reviews::update_review(
        &state,
        &id,
        &body.author_id,
        ReviewChanges {
            rating: body.rating,
            category_ratings: body.category_ratings,
            content: body.content,
        },
    )?;
    Ok(Json(review))
}

// GET /api/bookings/:id/reviews
#[derive(Deserialize)]
pub struct ViewerQuery {
    pub viewer_id: String,
}

pub async fn get_booking_reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<Vec<Review>>, AppError> {
    check_auth(&headers, &state.config.api_token)?;
    let visible = reviews::get_reviews_visible_to(&state, &id, &query.viewer_id)?;
    Ok(Json(visible))
}
