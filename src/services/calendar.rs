use chrono::Duration;

use crate::models::Booking;

pub fn generate_ics(booking: &Booking) -> String {
    let dtstart = booking.scheduled_date.format("%Y%m%dT%H%M%S").to_string();
    let dtend = (booking.scheduled_date
        + Duration::minutes(booking.estimated_duration_minutes as i64))
    .format("%Y%m%dT%H%M%S")
    .to_string();
    let dtstamp = booking.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@gigbook", booking.id);

    let summary = format!(
        "{} with {}",
        booking.listing_snapshot.title, booking.host_snapshot.display_name
    );
    let location = &booking.service_location.address;
    let description = format!("Confirmation code {}", booking.booking_hash);

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Gigbook//Booking Core//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         LOCATION:{location}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Listing, Profile, ServiceLocation};
    use chrono::NaiveDateTime;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_generate_ics() {
        let client = Profile {
            id: "client-1".into(),
            display_name: "Ana".into(),
            photo_url: None,
            updated_at: dt("2025-03-10 10:00:00"),
        };
        let host = Profile {
            id: "host-1".into(),
            display_name: "Bo".into(),
            photo_url: None,
            updated_at: dt("2025-03-10 10:00:00"),
        };
        let listing = Listing {
            id: "listing-1".into(),
            host_id: "host-1".into(),
            title: "Deep clean".into(),
            price_cents: 12_000,
            service_type: "cleaning".into(),
            active: true,
            updated_at: dt("2025-03-10 10:00:00"),
        };
        let booking = Booking::create(
            uuid::Uuid::new_v4(),
            &client,
            &host,
            &listing,
            dt("2025-03-15 14:00:00"),
            90,
            ServiceLocation {
                lat: 40.4168,
                lng: -3.7038,
                address: "Calle Mayor 1".into(),
            },
            serde_json::json!({"total_cents": 12_000}),
            "flexible".into(),
            "chat-1".into(),
            dt("2025-03-10 10:00:00"),
        );

        let ics = generate_ics(&booking);
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("DTSTART:20250315T140000"));
        assert!(ics.contains("DTEND:20250315T153000"));
        assert!(ics.contains("SUMMARY:Deep clean with Bo"));
        assert!(ics.contains("LOCATION:Calle Mayor 1"));
        assert!(ics.contains(&format!("UID:{}@gigbook", booking.id)));
        assert!(ics.contains(&format!("DESCRIPTION:Confirmation code {}", booking.booking_hash)));
        assert!(ics.contains("END:VCALENDAR"));
    }
}
