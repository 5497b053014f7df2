use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::db::{queries, Store};
use crate::models::{Booking, Listing, Profile, ServiceLocation};
use crate::services::chat::{ChatProvider, NoopChat};
use crate::services::lifecycle::{self, CreateInquiryInput};
use crate::services::ratings::NoopRatings;
use crate::state::AppState;

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

pub fn test_config() -> AppConfig {
    AppConfig {
        port: 0,
        database_url: ":memory:".into(),
        api_token: "test-token".into(),
        chat_service_url: String::new(),
        ratings_service_url: String::new(),
    }
}

pub fn test_state() -> Arc<AppState> {
    test_state_with_chat(Box::new(NoopChat))
}

pub fn test_state_with_chat(chat: Box<dyn ChatProvider>) -> Arc<AppState> {
    let store = Store::open(":memory:").unwrap();
    seed_catalog(&store);
    let (events_tx, _) = broadcast::channel(16);
    Arc::new(AppState {
        store,
        config: test_config(),
        chat,
        ratings: Box::new(NoopRatings),
        events_tx,
    })
}

/// Seeds the listing and both party profiles every test booking hangs off.
pub fn seed_catalog(store: &Store) {
    let db = store.conn.lock().unwrap();
    queries::upsert_profile(
        &db,
        &Profile {
            id: "client-1".into(),
            display_name: "Ana".into(),
            photo_url: Some("https://example.com/ana.jpg".into()),
            updated_at: dt("2025-06-01 10:00"),
        },
    )
    .unwrap();
    queries::upsert_profile(
        &db,
        &Profile {
            id: "host-1".into(),
            display_name: "Bo".into(),
            photo_url: None,
            updated_at: dt("2025-06-01 10:00"),
        },
    )
    .unwrap();
    queries::upsert_listing(
        &db,
        &Listing {
            id: "listing-1".into(),
            host_id: "host-1".into(),
            title: "Deep clean".into(),
            price_cents: 12_000,
            service_type: "cleaning".into(),
            active: true,
            updated_at: dt("2025-06-01 10:00"),
        },
    )
    .unwrap();
}

pub fn inquiry_input() -> CreateInquiryInput {
    CreateInquiryInput {
        client_id: "client-1".into(),
        host_id: "host-1".into(),
        listing_id: "listing-1".into(),
        scheduled_date: dt("2025-07-01 09:00"),
        estimated_duration_minutes: 120,
        service_location: ServiceLocation {
            lat: 40.4168,
            lng: -3.7038,
            address: "Calle Mayor 1".into(),
        },
        pricing: None,
        cancellation_policy: None,
    }
}

/// Drives a fresh booking through the whole happy path to COMPLETED.
pub async fn completed_booking(state: &Arc<AppState>) -> Booking {
    let booking = lifecycle::create_inquiry(state, inquiry_input()).await.unwrap();
    let booking = lifecycle::request_to_book(state, &booking.id, "client-1")
        .await
        .unwrap();
    let booking = lifecycle::approve_booking(state, &booking.id, "host-1")
        .await
        .unwrap();
    let booking = lifecycle::confirm_payment(state, &booking.id, "client-1")
        .await
        .unwrap();
    let booking = lifecycle::check_in(state, &booking.id, "host-1").await.unwrap();
    lifecycle::check_out(state, &booking.id, "host-1").await.unwrap()
}
