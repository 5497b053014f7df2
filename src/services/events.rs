use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::BookingStatus;
use crate::state::AppState;

/// One status change, as seen by SSE subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    pub booking_id: String,
    pub status: BookingStatus,
    pub changed_by: String,
    pub occurred_at: String,
}

pub fn emit(state: &Arc<AppState>, booking_id: &str, status: BookingStatus, changed_by: &str) {
    let event = BookingEvent {
        booking_id: booking_id.to_string(),
        status,
        changed_by: changed_by.to_string(),
        occurred_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };
    // Broadcast to SSE subscribers; ignore if no receivers
    let _ = state.events_tx.send(event);
}
