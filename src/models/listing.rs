use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Listing record owned by the listing subsystem. The booking core reads it
/// exactly once, at booking creation, to capture a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub host_id: String,
    pub title: String,
    pub price_cents: i64,
    pub service_type: String,
    pub active: bool,
    pub updated_at: NaiveDateTime,
}

/// Profile record owned by the profile subsystem; read once at booking
/// creation for the party snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub updated_at: NaiveDateTime,
}
