use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::Transaction;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingAction, BookingStatus, PaymentStatus, Role, ServiceLocation, StatusEntry,
};
use crate::services::{events, guard};
use crate::state::AppState;

/// Actor recorded in history entries written by sweeps rather than a user.
pub const SYSTEM_ACTOR: &str = "system";

/// Days after checkout during which reviews may be submitted.
pub const REVIEW_WINDOW_DAYS: i64 = 14;

pub struct CreateInquiryInput {
    pub client_id: String,
    pub host_id: String,
    pub listing_id: String,
    pub scheduled_date: NaiveDateTime,
    pub estimated_duration_minutes: i32,
    pub service_location: ServiceLocation,
    pub pricing: Option<serde_json::Value>,
    pub cancellation_policy: Option<String>,
}

/// Creates a booking in INQUIRY with its snapshots and linked chat thread.
/// The thread is created before the booking row so a booking never exists
/// without its conversation; if the insert then fails the thread is orphaned,
/// which the chat subsystem tolerates.
pub async fn create_inquiry(
    state: &Arc<AppState>,
    input: CreateInquiryInput,
) -> Result<Booking, AppError> {
    if input.client_id == input.host_id {
        return Err(AppError::Validation(
            "client and host must be different users".into(),
        ));
    }
    if input.estimated_duration_minutes <= 0 {
        return Err(AppError::Validation(
            "estimated duration must be positive".into(),
        ));
    }

    let (client, host, listing) = {
        let db = state.store.conn.lock().unwrap();
        let listing = queries::get_listing(&db, &input.listing_id)?
            .ok_or_else(|| AppError::NotFound(format!("listing {}", input.listing_id)))?;
        if !listing.active {
            return Err(AppError::Validation("listing is not active".into()));
        }
        if listing.host_id != input.host_id {
            return Err(AppError::Validation("host does not own this listing".into()));
        }
        let client = queries::get_profile(&db, &input.client_id)?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", input.client_id)))?;
        let host = queries::get_profile(&db, &input.host_id)?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", input.host_id)))?;
        (client, host, listing)
    };

    let id = uuid::Uuid::new_v4();
    let chat_id = state
        .chat
        .create_thread(&id.to_string(), &input.client_id, &input.host_id)
        .await
        .map_err(|e| AppError::Chat(e.to_string()))?;

    let now = Utc::now().naive_utc();
    let pricing = input
        .pricing
        .unwrap_or_else(|| serde_json::json!({ "total_cents": listing.price_cents }));
    let booking = Booking::create(
        id,
        &client,
        &host,
        &listing,
        input.scheduled_date,
        input.estimated_duration_minutes,
        input.service_location,
        pricing,
        input.cancellation_policy.unwrap_or_else(|| "flexible".into()),
        chat_id,
        now,
    );

    state.store.run_transaction(|tx| {
        queries::insert_booking(tx, &booking)?;
        queries::append_status_history(tx, &booking.id, &booking.status_history[0])?;
        Ok(())
    })?;

    tracing::info!(
        booking_id = %booking.id,
        client_id = %booking.client_id,
        host_id = %booking.host_id,
        listing_id = %booking.listing_id,
        "created booking inquiry"
    );
    events::emit(state, &booking.id, booking.status, &booking.client_id);

    Ok(booking)
}

/// Applies one table-validated transition inside an open transaction. The
/// status column, the history entry and updated_at move together or not at
/// all.
pub(crate) fn apply_transition_tx(
    tx: &Transaction,
    booking: &mut Booking,
    to: BookingStatus,
    changed_by: &str,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    if !booking.status.can_transition_to(to) {
        return Err(AppError::InvalidTransition {
            from: booking.status,
            to,
        });
    }

    queries::update_booking_status(tx, &booking.id, to, &now)?;
    let entry = StatusEntry {
        status: to,
        changed_at: now,
        changed_by: changed_by.to_string(),
        reason,
    };
    queries::append_status_history(tx, &booking.id, &entry)?;

    booking.status = to;
    booking.status_history.push(entry);
    booking.updated_at = now;
    Ok(())
}

/// Shared read-validate-write path for every guarded action. Re-reads the
/// booking inside the transaction so a validation can never commit against
/// stale state; a racing caller simply loses on the re-read.
async fn apply_action(
    state: &Arc<AppState>,
    booking_id: &str,
    actor_id: &str,
    action: BookingAction,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    let now = Utc::now().naive_utc();

    let booking = state.store.run_transaction(|tx| {
        let mut booking = queries::get_booking(tx, booking_id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

        let role = guard::can_perform(actor_id, &booking, action)?;
        let target = guard::target_status(action, role);
        apply_transition_tx(tx, &mut booking, target, actor_id, reason.clone(), now)?;

        match action {
            BookingAction::ConfirmPayment => {
                queries::set_payment_status(tx, &booking.id, PaymentStatus::Paid, &now)?;
                booking.payment_status = PaymentStatus::Paid;
            }
            BookingAction::CheckIn => {
                queries::set_check_in(tx, &booking.id, &now)?;
                booking.check_in_at = Some(now);
            }
            BookingAction::CheckOut => {
                let window_end = now + Duration::days(REVIEW_WINDOW_DAYS);
                queries::set_check_out(tx, &booking.id, &now, &window_end)?;
                booking.check_out_at = Some(now);
                booking.review_window_ends_at = Some(window_end);
            }
            _ => {}
        }

        Ok(booking)
    })?;

    tracing::info!(
        booking_id = %booking.id,
        action = action.as_str(),
        actor_id = %actor_id,
        status = %booking.status,
        "booking transition committed"
    );
    events::emit(state, &booking.id, booking.status, actor_id);

    // Chat notes go out after the commit and never block or undo it.
    match action {
        BookingAction::Approve => {
            post_chat_note(
                state,
                &booking,
                "Booking request accepted. Payment confirmation is the next step.",
            )
            .await
        }
        BookingAction::CheckOut => {
            post_chat_note(
                state,
                &booking,
                "Service completed. Both sides can now leave a review.",
            )
            .await
        }
        BookingAction::Cancel => post_chat_note(state, &booking, "Booking was canceled.").await,
        _ => {}
    }

    Ok(booking)
}

async fn post_chat_note(state: &Arc<AppState>, booking: &Booking, body: &str) {
    if let Err(e) = state.chat.post_system_message(&booking.chat_id, body).await {
        tracing::warn!(booking_id = %booking.id, error = %e, "failed to post chat system message");
    }
}

pub async fn request_to_book(
    state: &Arc<AppState>,
    booking_id: &str,
    actor_id: &str,
) -> Result<Booking, AppError> {
    apply_action(state, booking_id, actor_id, BookingAction::RequestToBook, None).await
}

pub async fn instant_book(
    state: &Arc<AppState>,
    booking_id: &str,
    actor_id: &str,
) -> Result<Booking, AppError> {
    apply_action(state, booking_id, actor_id, BookingAction::InstantBook, None).await
}

pub async fn approve_booking(
    state: &Arc<AppState>,
    booking_id: &str,
    actor_id: &str,
) -> Result<Booking, AppError> {
    apply_action(state, booking_id, actor_id, BookingAction::Approve, None).await
}

pub async fn confirm_payment(
    state: &Arc<AppState>,
    booking_id: &str,
    actor_id: &str,
) -> Result<Booking, AppError> {
    apply_action(state, booking_id, actor_id, BookingAction::ConfirmPayment, None).await
}

pub async fn check_in(
    state: &Arc<AppState>,
    booking_id: &str,
    actor_id: &str,
) -> Result<Booking, AppError> {
    apply_action(state, booking_id, actor_id, BookingAction::CheckIn, None).await
}

pub async fn check_out(
    state: &Arc<AppState>,
    booking_id: &str,
    actor_id: &str,
) -> Result<Booking, AppError> {
    apply_action(state, booking_id, actor_id, BookingAction::CheckOut, None).await
}

pub async fn cancel_booking(
    state: &Arc<AppState>,
    booking_id: &str,
    actor_id: &str,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    apply_action(state, booking_id, actor_id, BookingAction::Cancel, reason).await
}

/// Participant-only read of a single booking.
pub fn get_booking_for(
    state: &Arc<AppState>,
    booking_id: &str,
    actor_id: &str,
) -> Result<Booking, AppError> {
    let db = state.store.conn.lock().unwrap();
    let booking = queries::get_booking(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if !booking.is_participant(actor_id) {
        return Err(AppError::Unauthorized(
            "not a participant in this booking".into(),
        ));
    }
    Ok(booking)
}

pub fn list_bookings(
    state: &Arc<AppState>,
    user_id: &str,
    role: Option<Role>,
    limit: i64,
) -> Result<Vec<Booking>, AppError> {
    let db = state.store.conn.lock().unwrap();
    let bookings = queries::list_bookings_for_user(&db, user_id, role, limit)?;
    Ok(bookings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Listing, Profile};
    use crate::services::chat::ChatProvider;
    use crate::services::testutil::{dt, inquiry_input, test_state, test_state_with_chat};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FailingChat;

    #[async_trait]
    impl ChatProvider for FailingChat {
        async fn create_thread(&self, _: &str, _: &str, _: &str) -> anyhow::Result<String> {
            anyhow::bail!("chat service down")
        }
        async fn post_system_message(&self, _: &str, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("chat service down")
        }
    }

    struct CapturingChat {
        messages: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ChatProvider for CapturingChat {
        async fn create_thread(&self, _: &str, _: &str, _: &str) -> anyhow::Result<String> {
            Ok("chat-1".into())
        }
        async fn post_system_message(&self, _: &str, body: &str) -> anyhow::Result<()> {
            self.messages.lock().unwrap().push(body.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle_to_completed() {
        let state = test_state();
        let mut events_rx = state.events_tx.subscribe();

        let booking = create_inquiry(&state, inquiry_input()).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Inquiry);
        assert_eq!(booking.listing_snapshot.title, "Deep clean");
        assert_eq!(booking.client_snapshot.display_name, "Ana");
        assert!(booking.booking_hash.starts_with("GB-"));
        assert_eq!(events_rx.try_recv().unwrap().booking_id, booking.id);

        let booking = request_to_book(&state, &booking.id, "client-1").await.unwrap();
        assert_eq!(booking.status, BookingStatus::PendingApproval);

        let booking = approve_booking(&state, &booking.id, "host-1").await.unwrap();
        assert_eq!(booking.status, BookingStatus::PendingPayment);

        let booking = confirm_payment(&state, &booking.id, "client-1").await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_status, PaymentStatus::Paid);

        let booking = check_in(&state, &booking.id, "host-1").await.unwrap();
        assert_eq!(booking.status, BookingStatus::Active);
        assert!(booking.check_in_at.is_some());

        let booking = check_out(&state, &booking.id, "host-1").await.unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);

        let checkout = booking.check_out_at.unwrap();
        assert_eq!(
            booking.review_window_ends_at.unwrap(),
            checkout + Duration::days(REVIEW_WINDOW_DAYS)
        );

        let statuses: Vec<BookingStatus> =
            booking.status_history.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                BookingStatus::Inquiry,
                BookingStatus::PendingApproval,
                BookingStatus::PendingPayment,
                BookingStatus::Confirmed,
                BookingStatus::Active,
                BookingStatus::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_instant_book_skips_approval() {
        let state = test_state();
        let booking = create_inquiry(&state, inquiry_input()).await.unwrap();
        let booking = instant_book(&state, &booking.id, "client-1").await.unwrap();
        assert_eq!(booking.status, BookingStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_approve_from_inquiry_is_invalid() {
        let state = test_state();
        let booking = create_inquiry(&state, inquiry_input()).await.unwrap();
        let err = approve_booking(&state, &booking.id, "host-1").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: BookingStatus::Inquiry,
                to: BookingStatus::PendingPayment,
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_records_reason_and_role() {
        let state = test_state();
        let booking = create_inquiry(&state, inquiry_input()).await.unwrap();
        let booking = request_to_book(&state, &booking.id, "client-1").await.unwrap();

        let booking = cancel_booking(
            &state,
            &booking.id,
            "client-1",
            Some("found another provider".into()),
        )
        .await
        .unwrap();

        assert_eq!(booking.status, BookingStatus::CanceledByGuest);
        let last = booking.status_history.last().unwrap();
        assert_eq!(last.changed_by, "client-1");
        assert_eq!(last.reason.as_deref(), Some("found another provider"));

        // Terminal: nothing else can happen to it.
        let err = cancel_booking(&state, &booking.id, "host-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_create_inquiry_unknown_listing() {
        let state = test_state();
        let mut input = inquiry_input();
        input.listing_id = "listing-missing".into();
        let err = create_inquiry(&state, input).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_inquiry_rejects_same_party() {
        let state = test_state();
        let mut input = inquiry_input();
        input.client_id = "host-1".into();
        let err = create_inquiry(&state, input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_inquiry_rejects_wrong_host() {
        let state = test_state();
        {
            let db = state.store.conn.lock().unwrap();
            queries::upsert_profile(
                &db,
                &Profile {
                    id: "host-2".into(),
                    display_name: "Cam".into(),
                    photo_url: None,
                    updated_at: dt("2025-06-01 10:00"),
                },
            )
            .unwrap();
        }
        let mut input = inquiry_input();
        input.host_id = "host-2".into();
        let err = create_inquiry(&state, input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_chat_failure_aborts_creation() {
        let state = test_state_with_chat(Box::new(FailingChat));
        let err = create_inquiry(&state, inquiry_input()).await.unwrap_err();
        assert!(matches!(err, AppError::Chat(_)));

        let db = state.store.conn.lock().unwrap();
        let count: i64 = db
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_snapshots_survive_listing_edits() {
        let state = test_state();
        let booking = create_inquiry(&state, inquiry_input()).await.unwrap();

        {
            let db = state.store.conn.lock().unwrap();
            queries::upsert_listing(
                &db,
                &Listing {
                    id: "listing-1".into(),
                    host_id: "host-1".into(),
                    title: "Deep clean PLUS".into(),
                    price_cents: 20_000,
                    service_type: "cleaning".into(),
                    active: true,
                    updated_at: dt("2025-06-02 10:00"),
                },
            )
            .unwrap();
        }

        let reread = get_booking_for(&state, &booking.id, "client-1").unwrap();
        assert_eq!(reread.listing_snapshot.title, "Deep clean");
        assert_eq!(reread.listing_snapshot.price_cents, 12_000);
    }

    #[tokio::test]
    async fn test_get_booking_rejects_stranger() {
        let state = test_state();
        let booking = create_inquiry(&state, inquiry_input()).await.unwrap();
        let err = get_booking_for(&state, &booking.id, "stranger").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_chat_notes_on_accept_and_complete() {
        let messages = Arc::new(Mutex::new(vec![]));
        let state = test_state_with_chat(Box::new(CapturingChat {
            messages: messages.clone(),
        }));

        let booking = create_inquiry(&state, inquiry_input()).await.unwrap();
        request_to_book(&state, &booking.id, "client-1").await.unwrap();
        approve_booking(&state, &booking.id, "host-1").await.unwrap();
        confirm_payment(&state, &booking.id, "client-1").await.unwrap();
        check_in(&state, &booking.id, "host-1").await.unwrap();
        check_out(&state, &booking.id, "host-1").await.unwrap();

        let notes = messages.lock().unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("accepted"));
        assert!(notes[1].contains("completed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_approve_and_cancel_single_winner() {
        let state = test_state();
        let booking = create_inquiry(&state, inquiry_input()).await.unwrap();
        let booking = request_to_book(&state, &booking.id, "client-1").await.unwrap();

        // The host approves and cancels at once (say, two open tabs).
        // Whichever commits first leaves the other with no legal edge:
        // approval closes the host-cancel path, cancellation is terminal.
        let approve_state = state.clone();
        let cancel_state = state.clone();
        let id_a = booking.id.clone();
        let id_b = booking.id.clone();

        let approve = tokio::spawn(async move {
            approve_booking(&approve_state, &id_a, "host-1").await
        });
        let cancel = tokio::spawn(async move {
            cancel_booking(&cancel_state, &id_b, "host-1", None).await
        });

        let results = [approve.await.unwrap(), cancel.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one of the racing actions must commit");

        for result in &results {
            if let Err(e) = result {
                assert!(
                    matches!(e, AppError::InvalidTransition { .. } | AppError::Conflict),
                    "loser must see InvalidTransition or Conflict, got {e}"
                );
            }
        }

        let reread = get_booking_for(&state, &booking.id, "client-1").unwrap();
        assert!(matches!(
            reread.status,
            BookingStatus::PendingPayment | BookingStatus::CanceledByHost
        ));
        // Inquiry, request, and exactly one winning transition.
        assert_eq!(reread.status_history.len(), 3);
        assert_eq!(reread.status_history.last().unwrap().status, reread.status);
    }

    #[tokio::test]
    async fn test_list_bookings_by_role() {
        let state = test_state();
        let booking = create_inquiry(&state, inquiry_input()).await.unwrap();

        let as_client = list_bookings(&state, "client-1", Some(Role::Client), 50).unwrap();
        assert_eq!(as_client.len(), 1);
        assert_eq!(as_client[0].id, booking.id);

        let as_host = list_bookings(&state, "client-1", Some(Role::Host), 50).unwrap();
        assert!(as_host.is_empty());

        let any_side = list_bookings(&state, "host-1", None, 50).unwrap();
        assert_eq!(any_side.len(), 1);
    }
}
