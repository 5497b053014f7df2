use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::models::BookingStatus;
use crate::services::calendar;
use crate::state::AppState;

// GET /calendar/:booking_id
//
// Serves an .ics file for a booking so either side can add the appointment
// to their phone calendar. Unauthenticated: the booking id is an unguessable
// UUID and the feed only exists once the booking is confirmed.
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Response {
    // Allow links like /calendar/<id>.ics as well as the bare id.
    let booking_id = booking_id.trim_end_matches(".ics");

    let booking = {
        let db = state.store.conn.lock().unwrap();
        queries::get_booking(&db, booking_id)
    };

    let booking = match booking {
        Ok(Some(b)) => b,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "booking not found").into_response();
        }
        Err(err) => {
            tracing::error!(booking_id, error = %err, "failed to load booking for calendar");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    if !matches!(
        booking.status,
        BookingStatus::Confirmed | BookingStatus::Active
    ) {
        return (
            StatusCode::CONFLICT,
            "calendar is only available for confirmed bookings",
        )
            .into_response();
    }

    let ics = calendar::generate_ics(&booking);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"booking-{}.ics\"", booking.booking_hash),
            ),
        ],
        ics,
    )
        .into_response()
}
