use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Review, Role};
use crate::state::AppState;

pub struct SubmitReviewInput {
    pub booking_id: String,
    pub author_id: String,
    pub rating: i32,
    pub category_ratings: Option<BTreeMap<String, i32>>,
    pub content: String,
}

/// Author-editable fields of an unpublished review. Absent fields are left
/// as they are.
pub struct ReviewChanges {
    pub rating: Option<i32>,
    pub category_ratings: Option<BTreeMap<String, i32>>,
    pub content: Option<String>,
}

fn validate_ratings(
    rating: i32,
    categories: Option<&BTreeMap<String, i32>>,
) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".into()));
    }
    if let Some(categories) = categories {
        for (name, value) in categories {
            if !(1..=5).contains(value) {
                return Err(AppError::Validation(format!(
                    "category rating {name} must be between 1 and 5"
                )));
            }
        }
    }
    Ok(())
}

/// Submission preconditions, evaluated against current state: the booking
/// is COMPLETED, the author is one of its participants, the review window
/// is still open, and the author has not already reviewed this booking.
/// Returns the author's role on success.
pub fn can_submit_review(
    conn: &Connection,
    booking: &Booking,
    author_id: &str,
    now: NaiveDateTime,
) -> Result<Role, AppError> {
    let role = booking
        .role_of(author_id)
        .ok_or_else(|| AppError::Unauthorized("not a participant in this booking".into()))?;
    if booking.status != BookingStatus::Completed {
        return Err(AppError::Validation(
            "reviews require a completed booking".into(),
        ));
    }
    let window_end = booking
        .review_window_ends_at
        .ok_or_else(|| anyhow!("completed booking {} has no review window", booking.id))?;
    if now > window_end {
        return Err(AppError::WindowExpired);
    }
    if queries::get_review_by_author(conn, &booking.id, author_id)?.is_some() {
        return Err(AppError::AlreadyExists(
            "review by this author for this booking".into(),
        ));
    }
    Ok(role)
}

/// Persists an unpublished review after re-validating against the booking
/// inside the transaction, then runs the reveal protocol for the booking.
/// The returned review reflects any publish the reveal just performed.
pub async fn submit_review(
    state: &Arc<AppState>,
    input: SubmitReviewInput,
) -> Result<Review, AppError> {
    validate_ratings(input.rating, input.category_ratings.as_ref())?;
    let now = Utc::now().naive_utc();

    let review = state.store.run_transaction(|tx| {
        let booking = queries::get_booking(tx, &input.booking_id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {}", input.booking_id)))?;

        let role = can_submit_review(tx, &booking, &input.author_id, now)?;
        let target_id = match role {
            Role::Client => booking.host_id.clone(),
            Role::Host => booking.client_id.clone(),
        };
        let review = Review::new(
            booking.id.clone(),
            input.author_id.clone(),
            role,
            target_id,
            input.rating,
            input.category_ratings.clone(),
            input.content.clone(),
            now,
        );
        queries::insert_review(tx, &review)?;
        Ok(review)
    })?;

    tracing::info!(
        review_id = %review.id,
        booking_id = %review.booking_id,
        author_role = review.author_role.as_str(),
        "review submitted"
    );

    // Pairing runs right after the insert commits, in its own transaction.
    publish_pair_if_complete(state, &input.booking_id).await?;

    let refreshed = {
        let db = state.store.conn.lock().unwrap();
        queries::get_review(&db, &review.id)?
    };
    Ok(refreshed.unwrap_or(review))
}

/// Double-blind reveal. If the booking has one review from each side and at
/// least one is unpublished, both are published in a single transaction so
/// no reader can ever observe one side visible and the other hidden.
/// Returns whether a publish happened.
pub async fn publish_pair_if_complete(
    state: &Arc<AppState>,
    booking_id: &str,
) -> Result<bool, AppError> {
    let now = Utc::now().naive_utc();

    let published_targets = state.store.run_transaction(|tx| {
        let reviews = queries::get_reviews_for_booking(tx, booking_id)?;
        if reviews.len() < 2 {
            return Ok(None);
        }
        let one_per_side = reviews.iter().any(|r| r.author_role == Role::Client)
            && reviews.iter().any(|r| r.author_role == Role::Host);
        if !one_per_side {
            return Ok(None);
        }
        if reviews.iter().all(|r| r.published) {
            return Ok(None);
        }

        for review in &reviews {
            queries::mark_review_published(tx, &review.id, true, &now)?;
        }
        Ok(Some(
            reviews.iter().map(|r| r.target_id.clone()).collect::<Vec<_>>(),
        ))
    })?;

    let Some(targets) = published_targets else {
        return Ok(false);
    };

    tracing::info!(booking_id = %booking_id, "review pair published");
    for target_id in targets {
        if let Err(e) = state.ratings.recompute(&target_id).await {
            tracing::warn!(target_id = %target_id, error = %e, "failed to trigger rating recompute");
        }
    }
    Ok(true)
}

pub fn update_review(
    state: &Arc<AppState>,
    review_id: &str,
    author_id: &str,
    changes: ReviewChanges,
) -> Result<Review, AppError> {
    let now = Utc::now().naive_utc();

    state.store.run_transaction(|tx| {
        let mut review = queries::get_review(tx, review_id)?
            .ok_or_else(|| AppError::NotFound(format!("review {review_id}")))?;

        if review.author_id != author_id {
            return Err(AppError::Unauthorized(
                "only the author may edit a review".into(),
            ));
        }
        if review.published {
            return Err(AppError::Validation("published reviews are immutable".into()));
        }

        if let Some(rating) = changes.rating {
            review.rating = rating;
        }
        if let Some(categories) = changes.category_ratings.clone() {
            review.category_ratings = Some(categories);
        }
        if let Some(content) = changes.content.clone() {
            review.content = content;
        }
        validate_ratings(review.rating, review.category_ratings.as_ref())?;

        review.updated_at = now;
        queries::update_review_content(tx, &review)?;
        Ok(review)
    })
}

/// Reviews of a booking as `viewer_id` is allowed to see them: everything
/// published, plus the viewer's own unpublished review.
pub fn get_reviews_visible_to(
    state: &Arc<AppState>,
    booking_id: &str,
    viewer_id: &str,
) -> Result<Vec<Review>, AppError> {
    let db = state.store.conn.lock().unwrap();
    if queries::get_booking(&db, booking_id)?.is_none() {
        return Err(AppError::NotFound(format!("booking {booking_id}")));
    }
    let reviews = queries::get_reviews_for_booking(&db, booking_id)?;
    Ok(reviews
        .into_iter()
        .filter(|r| r.visible_to(viewer_id))
        .collect())
}
