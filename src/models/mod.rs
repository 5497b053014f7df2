pub mod booking;
pub mod listing;
pub mod review;

pub use booking::{
    generate_booking_hash, Booking, BookingAction, BookingStatus, ListingSnapshot, PartySnapshot,
    PaymentStatus, Role, ServiceLocation, StatusEntry,
};
pub use listing::{Listing, Profile};
pub use review::Review;
