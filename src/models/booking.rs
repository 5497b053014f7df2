use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{Listing, Profile};

/// One client–host service engagement, tracked through a closed set of
/// statuses. Bookings are never deleted; cancellation and expiry are
/// statuses like any other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub client_id: String,
    pub host_id: String,
    pub listing_id: String,
    pub status: BookingStatus,
    /// Append-only. The last entry always matches `status`; both are written
    /// in the same transaction.
    pub status_history: Vec<StatusEntry>,
    pub booking_hash: String,
    pub chat_id: String,
    pub scheduled_date: NaiveDateTime,
    pub estimated_duration_minutes: i32,
    pub check_in_at: Option<NaiveDateTime>,
    pub check_out_at: Option<NaiveDateTime>,
    pub review_window_ends_at: Option<NaiveDateTime>,
    pub listing_snapshot: ListingSnapshot,
    pub client_snapshot: PartySnapshot,
    pub host_snapshot: PartySnapshot,
    pub service_location: ServiceLocation,
    pub pricing: serde_json::Value,
    pub payment_status: PaymentStatus,
    pub cancellation_policy: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// Builds a new INQUIRY booking with creation-time snapshots of the
    /// listing and both parties. Snapshots are captured exactly once here
    /// and never follow later edits to their sources. The id is passed in
    /// because the chat thread is created against it before the booking row
    /// exists.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: uuid::Uuid,
        client: &Profile,
        host: &Profile,
        listing: &Listing,
        scheduled_date: NaiveDateTime,
        estimated_duration_minutes: i32,
        service_location: ServiceLocation,
        pricing: serde_json::Value,
        cancellation_policy: String,
        chat_id: String,
        now: NaiveDateTime,
    ) -> Self {
        let booking_hash = generate_booking_hash(&id);
        Booking {
            id: id.to_string(),
            client_id: client.id.clone(),
            host_id: host.id.clone(),
            listing_id: listing.id.clone(),
            status: BookingStatus::Inquiry,
            status_history: vec![StatusEntry {
                status: BookingStatus::Inquiry,
                changed_at: now,
                changed_by: client.id.clone(),
                reason: None,
            }],
            booking_hash,
            chat_id,
            scheduled_date,
            estimated_duration_minutes,
            check_in_at: None,
            check_out_at: None,
            review_window_ends_at: None,
            listing_snapshot: ListingSnapshot {
                title: listing.title.clone(),
                price_cents: listing.price_cents,
                service_type: listing.service_type.clone(),
            },
            client_snapshot: PartySnapshot {
                display_name: client.display_name.clone(),
                photo_url: client.photo_url.clone(),
            },
            host_snapshot: PartySnapshot {
                display_name: host.display_name.clone(),
                photo_url: host.photo_url.clone(),
            },
            service_location,
            pricing,
            payment_status: PaymentStatus::Unpaid,
            cancellation_policy,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn role_of(&self, actor_id: &str) -> Option<Role> {
        if actor_id == self.client_id {
            Some(Role::Client)
        } else if actor_id == self.host_id {
            Some(Role::Host)
        } else {
            None
        }
    }

    pub fn is_participant(&self, actor_id: &str) -> bool {
        self.role_of(actor_id).is_some()
    }
}

/// One entry in a booking's status history. Entries are written once and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: BookingStatus,
    pub changed_at: NaiveDateTime,
    pub changed_by: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Inquiry,
    PendingApproval,
    PendingPayment,
    Confirmed,
    Active,
    Completed,
    CanceledByGuest,
    CanceledByHost,
    Expired,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 9] = [
        BookingStatus::Inquiry,
        BookingStatus::PendingApproval,
        BookingStatus::PendingPayment,
        BookingStatus::Confirmed,
        BookingStatus::Active,
        BookingStatus::Completed,
        BookingStatus::CanceledByGuest,
        BookingStatus::CanceledByHost,
        BookingStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Inquiry => "INQUIRY",
            BookingStatus::PendingApproval => "PENDING_APPROVAL",
            BookingStatus::PendingPayment => "PENDING_PAYMENT",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Active => "ACTIVE",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::CanceledByGuest => "CANCELED_BY_GUEST",
            BookingStatus::CanceledByHost => "CANCELED_BY_HOST",
            BookingStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INQUIRY" => Some(BookingStatus::Inquiry),
            "PENDING_APPROVAL" => Some(BookingStatus::PendingApproval),
            "PENDING_PAYMENT" => Some(BookingStatus::PendingPayment),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "ACTIVE" => Some(BookingStatus::Active),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELED_BY_GUEST" => Some(BookingStatus::CanceledByGuest),
            "CANCELED_BY_HOST" => Some(BookingStatus::CanceledByHost),
            "EXPIRED" => Some(BookingStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::CanceledByGuest
                | BookingStatus::CanceledByHost
                | BookingStatus::Expired
        )
    }

    /// The transition table. Every edge not listed here is rejected,
    /// including every edge out of a terminal status.
    pub fn can_transition_to(self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Inquiry, PendingApproval)
                | (Inquiry, PendingPayment)
                | (Inquiry, CanceledByGuest)
                | (PendingApproval, PendingPayment)
                | (PendingApproval, Expired)
                | (PendingApproval, CanceledByHost)
                | (PendingApproval, CanceledByGuest)
                | (PendingPayment, Confirmed)
                | (PendingPayment, CanceledByGuest)
                | (Confirmed, Active)
                | (Confirmed, CanceledByGuest)
                | (Confirmed, CanceledByHost)
                | (Active, Completed)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Host,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Host => "host",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client" => Some(Role::Client),
            "host" => Some(Role::Host),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// Caller actions the authorization guard knows how to judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    RequestToBook,
    InstantBook,
    Approve,
    ConfirmPayment,
    CheckIn,
    CheckOut,
    Cancel,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::RequestToBook => "request_to_book",
            BookingAction::InstantBook => "instant_book",
            BookingAction::Approve => "approve",
            BookingAction::ConfirmPayment => "confirm_payment",
            BookingAction::CheckIn => "check_in",
            BookingAction::CheckOut => "check_out",
            BookingAction::Cancel => "cancel",
        }
    }
}

/// Listing fields frozen into the booking at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSnapshot {
    pub title: String,
    pub price_cents: i64,
    pub service_type: String,
}

/// Party display fields frozen into the booking at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartySnapshot {
    pub display_name: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

/// Human-presentable confirmation code, derived from the booking id so it is
/// generated exactly once and never reused (backed by a UNIQUE column).
pub fn generate_booking_hash(id: &uuid::Uuid) -> String {
    let simple = id.simple().to_string();
    format!("GB-{}", simple[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    // The full edge list from the lifecycle design. Everything else must be
    // rejected.
    const ALLOWED: [(BookingStatus, BookingStatus); 13] = [
        (BookingStatus::Inquiry, BookingStatus::PendingApproval),
        (BookingStatus::Inquiry, BookingStatus::PendingPayment),
        (BookingStatus::Inquiry, BookingStatus::CanceledByGuest),
        (BookingStatus::PendingApproval, BookingStatus::PendingPayment),
        (BookingStatus::PendingApproval, BookingStatus::Expired),
        (BookingStatus::PendingApproval, BookingStatus::CanceledByHost),
        (BookingStatus::PendingApproval, BookingStatus::CanceledByGuest),
        (BookingStatus::PendingPayment, BookingStatus::Confirmed),
        (BookingStatus::PendingPayment, BookingStatus::CanceledByGuest),
        (BookingStatus::Confirmed, BookingStatus::Active),
        (BookingStatus::Confirmed, BookingStatus::CanceledByGuest),
        (BookingStatus::Confirmed, BookingStatus::CanceledByHost),
        (BookingStatus::Active, BookingStatus::Completed),
    ];

    #[test]
    fn test_listed_edges_allowed() {
        for (from, to) in ALLOWED {
            assert!(
                from.can_transition_to(to),
                "{from} -> {to} should be allowed"
            );
        }
    }

    #[test]
    fn test_unlisted_edges_rejected() {
        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                let listed = ALLOWED.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    listed,
                    "{from} -> {to} disagrees with the edge list"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        for from in BookingStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in BookingStatus::ALL {
                assert!(
                    !from.can_transition_to(to),
                    "terminal {from} must not transition to {to}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_set() {
        let terminals: Vec<BookingStatus> = BookingStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminals,
            vec![
                BookingStatus::Completed,
                BookingStatus::CanceledByGuest,
                BookingStatus::CanceledByHost,
                BookingStatus::Expired,
            ]
        );
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert_eq!(
            BookingStatus::parse("CONFIRMED"),
            Some(BookingStatus::Confirmed)
        );
        assert_eq!(BookingStatus::parse("confirmed"), None);
        assert_eq!(BookingStatus::parse("DELETED"), None);
    }

    #[test]
    fn test_booking_hash_shape() {
        let id = uuid::Uuid::new_v4();
        let hash = generate_booking_hash(&id);
        assert!(hash.starts_with("GB-"));
        assert_eq!(hash.len(), 11);
        assert_eq!(hash, hash.to_uppercase());
        assert_eq!(hash, generate_booking_hash(&id));
    }
}
