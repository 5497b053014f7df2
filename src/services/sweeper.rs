use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::BookingStatus;
use crate::services::lifecycle::{self, SYSTEM_ACTOR};
use crate::services::{events, reviews};
use crate::state::AppState;

/// Hours a booking may wait in PENDING_APPROVAL before it expires.
pub const APPROVAL_TIMEOUT_HOURS: i64 = 24;

/// Expires bookings stuck in PENDING_APPROVAL past the timeout. Each
/// candidate is re-checked and transitioned in its own transaction through
/// the same guarded path user actions take, so a host approval racing the
/// sweep simply wins or loses atomically. Idempotent: already-moved
/// bookings are skipped. Returns how many bookings were expired.
pub async fn expire_pending_bookings(
    state: &Arc<AppState>,
    now: NaiveDateTime,
) -> Result<usize, AppError> {
    let cutoff = now - Duration::hours(APPROVAL_TIMEOUT_HOURS);
    let candidates = {
        let db = state.store.conn.lock().unwrap();
        queries::list_pending_approval_older_than(&db, &cutoff)?
    };

    let mut expired = 0;
    for booking_id in candidates {
        let result = state.store.run_transaction(|tx| {
            let Some(mut booking) = queries::get_booking(tx, &booking_id)? else {
                return Ok(false);
            };
            // Fresh read wins over the candidate list.
            if booking.status != BookingStatus::PendingApproval || booking.created_at > cutoff {
                return Ok(false);
            }
            lifecycle::apply_transition_tx(
                tx,
                &mut booking,
                BookingStatus::Expired,
                SYSTEM_ACTOR,
                Some(format!(
                    "no host response within {APPROVAL_TIMEOUT_HOURS} hours"
                )),
                now,
            )?;
            Ok(true)
        });

        match result {
            Ok(true) => {
                expired += 1;
                events::emit(state, &booking_id, BookingStatus::Expired, SYSTEM_ACTOR);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(booking_id = %booking_id, error = %e, "failed to expire booking");
            }
        }
    }

    if expired > 0 {
        tracing::info!(expired, "expired stale pending-approval bookings");
    }
    Ok(expired)
}

/// Time-based reveal fallback. Any review still unpublished past the window
/// length is published even without a pairing partner. A pair where both
/// sides aged out unpublished goes through the normal pair reveal instead,
/// keeping its atomicity. Returns how many reviews were published.
pub async fn publish_expired_reviews(
    state: &Arc<AppState>,
    now: NaiveDateTime,
) -> Result<usize, AppError> {
    let cutoff = now - Duration::days(lifecycle::REVIEW_WINDOW_DAYS);
    let candidates = {
        let db = state.store.conn.lock().unwrap();
        queries::list_unpublished_older_than(&db, &cutoff)?
    };

    let mut published = 0;
    for (review_id, booking_id) in candidates {
        match reviews::publish_pair_if_complete(state, &booking_id).await {
            Ok(true) => {
                published += 2;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(booking_id = %booking_id, error = %e, "pair reveal failed during sweep");
            }
        }

        let result = state.store.run_transaction(|tx| {
            let Some(review) = queries::get_review(tx, &review_id)? else {
                return Ok(None);
            };
            if review.published || review.created_at > cutoff {
                return Ok(None);
            }
            queries::mark_review_published(tx, &review.id, false, &now)?;
            Ok(Some(review.target_id))
        });

        match result {
            Ok(Some(target_id)) => {
                published += 1;
                tracing::info!(review_id = %review_id, booking_id = %booking_id, "force published lone review");
                if let Err(e) = state.ratings.recompute(&target_id).await {
                    tracing::warn!(target_id = %target_id, error = %e, "failed to trigger rating recompute");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(review_id = %review_id, error = %e, "failed to force publish review");
            }
        }
    }

    Ok(published)
}
