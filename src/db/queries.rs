use anyhow::Context;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingStatus, Listing, PaymentStatus, Profile, Review, Role, StatusEntry,
};

pub fn ts(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("bad timestamp in database: {s}"))
}

// ── Bookings ──

const BOOKING_COLS: &str = "id, client_id, host_id, listing_id, status, booking_hash, chat_id, \
     scheduled_date, estimated_duration_minutes, check_in_at, check_out_at, review_window_ends_at, \
     listing_snapshot, client_snapshot, host_snapshot, service_location, pricing, payment_status, \
     cancellation_policy, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
        ),
        params![
            booking.id,
            booking.client_id,
            booking.host_id,
            booking.listing_id,
            booking.status.as_str(),
            booking.booking_hash,
            booking.chat_id,
            ts(&booking.scheduled_date),
            booking.estimated_duration_minutes,
            booking.check_in_at.as_ref().map(ts),
            booking.check_out_at.as_ref().map(ts),
            booking.review_window_ends_at.as_ref().map(ts),
            serde_json::to_string(&booking.listing_snapshot)?,
            serde_json::to_string(&booking.client_snapshot)?,
            serde_json::to_string(&booking.host_snapshot)?,
            serde_json::to_string(&booking.service_location)?,
            serde_json::to_string(&booking.pricing)?,
            booking.payment_status.as_str(),
            booking.cancellation_policy,
            ts(&booking.created_at),
            ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => {
            let mut booking = booking?;
            booking.status_history = get_status_history(conn, &booking.id)?;
            Ok(Some(booking))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn set_payment_status(
    conn: &Connection,
    id: &str,
    status: PaymentStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE bookings SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), ts(now), id],
    )?;
    Ok(())
}

pub fn set_check_in(conn: &Connection, id: &str, now: &NaiveDateTime) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE bookings SET check_in_at = ?1, updated_at = ?1 WHERE id = ?2",
        params![ts(now), id],
    )?;
    Ok(())
}

pub fn set_check_out(
    conn: &Connection,
    id: &str,
    now: &NaiveDateTime,
    window_end: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE bookings SET check_out_at = ?1, review_window_ends_at = ?2, updated_at = ?1
         WHERE id = ?3",
        params![ts(now), ts(window_end), id],
    )?;
    Ok(())
}

pub fn list_bookings_for_user(
    conn: &Connection,
    user_id: &str,
    role: Option<Role>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let sql = match role {
        Some(Role::Client) => format!(
            "SELECT {BOOKING_COLS} FROM bookings WHERE client_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        ),
        Some(Role::Host) => format!(
            "SELECT {BOOKING_COLS} FROM bookings WHERE host_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        ),
        None => format!(
            "SELECT {BOOKING_COLS} FROM bookings WHERE client_id = ?1 OR host_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, limit], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    for booking in &mut bookings {
        booking.status_history = get_status_history(conn, &booking.id)?;
    }
    Ok(bookings)
}

/// Ids of bookings still waiting on the host past the cutoff. The sweeper
/// re-checks each one inside its own transaction before expiring it.
pub fn list_pending_approval_older_than(
    conn: &Connection,
    cutoff: &NaiveDateTime,
) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM bookings WHERE status = 'PENDING_APPROVAL' AND created_at <= ?1
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![ts(cutoff)], |row| row.get(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn count_bookings_by_status(conn: &Connection) -> anyhow::Result<Vec<(String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status ORDER BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let status_str: String = row.get(4)?;
    let scheduled_date_str: String = row.get(7)?;
    let check_in_str: Option<String> = row.get(9)?;
    let check_out_str: Option<String> = row.get(10)?;
    let window_str: Option<String> = row.get(11)?;
    let listing_snapshot_json: String = row.get(12)?;
    let client_snapshot_json: String = row.get(13)?;
    let host_snapshot_json: String = row.get(14)?;
    let location_json: String = row.get(15)?;
    let pricing_json: String = row.get(16)?;
    let payment_str: String = row.get(17)?;
    let created_at_str: String = row.get(19)?;
    let updated_at_str: String = row.get(20)?;

    let status = BookingStatus::parse(&status_str)
        .with_context(|| format!("unknown booking status in database: {status_str}"))?;
    let payment_status = PaymentStatus::parse(&payment_str)
        .with_context(|| format!("unknown payment status in database: {payment_str}"))?;

    Ok(Booking {
        id,
        client_id: row.get(1)?,
        host_id: row.get(2)?,
        listing_id: row.get(3)?,
        status,
        // Hydrated by the caller from booking_status_history.
        status_history: vec![],
        booking_hash: row.get(5)?,
        chat_id: row.get(6)?,
        scheduled_date: parse_ts(&scheduled_date_str)?,
        estimated_duration_minutes: row.get(8)?,
        check_in_at: check_in_str.as_deref().map(parse_ts).transpose()?,
        check_out_at: check_out_str.as_deref().map(parse_ts).transpose()?,
        review_window_ends_at: window_str.as_deref().map(parse_ts).transpose()?,
        listing_snapshot: serde_json::from_str(&listing_snapshot_json)
            .context("bad listing snapshot in database")?,
        client_snapshot: serde_json::from_str(&client_snapshot_json)
            .context("bad client snapshot in database")?,
        host_snapshot: serde_json::from_str(&host_snapshot_json)
            .context("bad host snapshot in database")?,
        service_location: serde_json::from_str(&location_json)
            .context("bad service location in database")?,
        pricing: serde_json::from_str(&pricing_json).context("bad pricing in database")?,
        payment_status,
        cancellation_policy: row.get(18)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Status History ──

pub fn append_status_history(
    conn: &Connection,
    booking_id: &str,
    entry: &StatusEntry,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_status_history (booking_id, seq, status, changed_at, changed_by, reason)
         VALUES (?1,
                 (SELECT COALESCE(MAX(seq), 0) + 1 FROM booking_status_history WHERE booking_id = ?1),
                 ?2, ?3, ?4, ?5)",
        params![
            booking_id,
            entry.status.as_str(),
            ts(&entry.changed_at),
            entry.changed_by,
            entry.reason,
        ],
    )?;
    Ok(())
}

pub fn get_status_history(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<StatusEntry>> {
    let mut stmt = conn.prepare(
        "SELECT status, changed_at, changed_by, reason FROM booking_status_history
         WHERE booking_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        let status_str: String = row.get(0)?;
        let changed_at_str: String = row.get(1)?;
        let changed_by: String = row.get(2)?;
        let reason: Option<String> = row.get(3)?;
        Ok((status_str, changed_at_str, changed_by, reason))
    })?;

    let mut entries = vec![];
    for row in rows {
        let (status_str, changed_at_str, changed_by, reason) = row?;
        entries.push(StatusEntry {
            status: BookingStatus::parse(&status_str)
                .with_context(|| format!("unknown status in history: {status_str}"))?,
            changed_at: parse_ts(&changed_at_str)?,
            changed_by,
            reason,
        });
    }
    Ok(entries)
}

// ── Reviews ──

const REVIEW_COLS: &str = "id, booking_id, author_id, author_role, target_id, rating, \
     category_ratings, content, published, pair_complete, published_at, created_at, updated_at";

pub fn insert_review(conn: &Connection, review: &Review) -> anyhow::Result<()> {
    let category_ratings = review
        .category_ratings
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        &format!(
            "INSERT INTO reviews ({REVIEW_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            review.id,
            review.booking_id,
            review.author_id,
            review.author_role.as_str(),
            review.target_id,
            review.rating,
            category_ratings,
            review.content,
            review.published as i32,
            review.pair_complete as i32,
            review.published_at.as_ref().map(ts),
            ts(&review.created_at),
            ts(&review.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_review(conn: &Connection, id: &str) -> anyhow::Result<Option<Review>> {
    let result = conn.query_row(
        &format!("SELECT {REVIEW_COLS} FROM reviews WHERE id = ?1"),
        params![id],
        |row| Ok(parse_review_row(row)),
    );

    match result {
        Ok(review) => Ok(Some(review?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_reviews_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLS} FROM reviews WHERE booking_id = ?1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![booking_id], |row| Ok(parse_review_row(row)))?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row??);
    }
    Ok(reviews)
}

pub fn get_review_by_author(
    conn: &Connection,
    booking_id: &str,
    author_id: &str,
) -> anyhow::Result<Option<Review>> {
    let result = conn.query_row(
        &format!("SELECT {REVIEW_COLS} FROM reviews WHERE booking_id = ?1 AND author_id = ?2"),
        params![booking_id, author_id],
        |row| Ok(parse_review_row(row)),
    );

    match result {
        Ok(review) => Ok(Some(review?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Publishes a review. COALESCE keeps the original publish time if the row
/// was already published, so re-marking is safe to repeat.
pub fn mark_review_published(
    conn: &Connection,
    id: &str,
    pair_complete: bool,
    now: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE reviews SET published = 1, pair_complete = ?1,
             published_at = COALESCE(published_at, ?2), updated_at = ?2
         WHERE id = ?3",
        params![pair_complete as i32, ts(now), id],
    )?;
    Ok(())
}

pub fn update_review_content(conn: &Connection, review: &Review) -> anyhow::Result<()> {
    let category_ratings = review
        .category_ratings
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "UPDATE reviews SET rating = ?1, category_ratings = ?2, content = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            review.rating,
            category_ratings,
            review.content,
            ts(&review.updated_at),
            review.id,
        ],
    )?;
    Ok(())
}

/// Unpublished reviews older than the cutoff, as (review id, booking id)
/// pairs. The sweeper re-checks each one inside its own transaction.
pub fn list_unpublished_older_than(
    conn: &Connection,
    cutoff: &NaiveDateTime,
) -> anyhow::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id FROM reviews WHERE published = 0 AND created_at <= ?1
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![ts(cutoff)], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut pairs = vec![];
    for row in rows {
        pairs.push(row?);
    }
    Ok(pairs)
}

pub fn count_unpublished_reviews(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM reviews WHERE published = 0", [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

fn parse_review_row(row: &rusqlite::Row) -> anyhow::Result<Review> {
    let author_role_str: String = row.get(3)?;
    let category_ratings_json: Option<String> = row.get(6)?;
    let published_at_str: Option<String> = row.get(10)?;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: String = row.get(12)?;

    let author_role = Role::parse(&author_role_str)
        .with_context(|| format!("unknown author role in database: {author_role_str}"))?;
    let category_ratings = category_ratings_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("bad category ratings in database")?;

    Ok(Review {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        author_id: row.get(2)?,
        author_role,
        target_id: row.get(4)?,
        rating: row.get(5)?,
        category_ratings,
        content: row.get(7)?,
        published: row.get::<_, i32>(8)? != 0,
        pair_complete: row.get::<_, i32>(9)? != 0,
        published_at: published_at_str.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Listings & Profiles ──

pub fn upsert_listing(conn: &Connection, listing: &Listing) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO listings (id, host_id, title, price_cents, service_type, active, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           host_id = excluded.host_id,
           title = excluded.title,
           price_cents = excluded.price_cents,
           service_type = excluded.service_type,
           active = excluded.active,
           updated_at = excluded.updated_at",
        params![
            listing.id,
            listing.host_id,
            listing.title,
            listing.price_cents,
            listing.service_type,
            listing.active as i32,
            ts(&listing.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_listing(conn: &Connection, id: &str) -> anyhow::Result<Option<Listing>> {
    let result = conn.query_row(
        "SELECT id, host_id, title, price_cents, service_type, active, updated_at
         FROM listings WHERE id = ?1",
        params![id],
        |row| {
            let updated_at_str: String = row.get(6)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i32>(5)? != 0,
                updated_at_str,
            ))
        },
    );

    match result {
        Ok((id, host_id, title, price_cents, service_type, active, updated_at_str)) => {
            Ok(Some(Listing {
                id,
                host_id,
                title,
                price_cents,
                service_type,
                active,
                updated_at: parse_ts(&updated_at_str)?,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn upsert_profile(conn: &Connection, profile: &Profile) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, display_name, photo_url, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
           display_name = excluded.display_name,
           photo_url = excluded.photo_url,
           updated_at = excluded.updated_at",
        params![
            profile.id,
            profile.display_name,
            profile.photo_url,
            ts(&profile.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &str) -> anyhow::Result<Option<Profile>> {
    let result = conn.query_row(
        "SELECT id, display_name, photo_url, updated_at FROM profiles WHERE id = ?1",
        params![id],
        |row| {
            let updated_at_str: String = row.get(3)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                updated_at_str,
            ))
        },
    );

    match result {
        Ok((id, display_name, photo_url, updated_at_str)) => Ok(Some(Profile {
            id,
            display_name,
            photo_url,
            updated_at: parse_ts(&updated_at_str)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
