use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, Customer, Location, LocationSetting};

const INSTANT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_instant(t: &DateTime<Utc>) -> String {
    t.naive_utc().format(INSTANT_FORMAT).to_string()
}

fn parse_instant(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, INSTANT_FORMAT)
        .with_context(|| format!("invalid stored instant: {s}"))?;
    Ok(naive.and_utc())
}

// ── Locations ──

pub fn create_location(conn: &Connection, location: &Location) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO locations (id, name, timezone, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            location.id,
            location.name,
            location.timezone,
            format_instant(&location.created_at),
            format_instant(&location.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_location(conn: &Connection, id: &str) -> anyhow::Result<Option<Location>> {
    let result = conn.query_row(
        "SELECT id, name, timezone, created_at, updated_at FROM locations WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );

    match result {
        Ok((id, name, timezone, created_at, updated_at)) => Ok(Some(Location {
            id,
            name,
            timezone,
            created_at: parse_instant(&created_at)?,
            updated_at: parse_instant(&updated_at)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_location_setting(conn: &Connection, setting: &LocationSetting) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO location_settings (location_id, daily_availability, time_zone,
            initial_booking_length, booking_length_increments, maximum_booking_length,
            time_slot_increments, buffer_time, same_day_lead_time_buffer,
            max_advance_booking_days, display_unavailable_slots)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(location_id) DO UPDATE SET
           daily_availability = excluded.daily_availability,
           time_zone = excluded.time_zone,
           initial_booking_length = excluded.initial_booking_length,
           booking_length_increments = excluded.booking_length_increments,
           maximum_booking_length = excluded.maximum_booking_length,
           time_slot_increments = excluded.time_slot_increments,
           buffer_time = excluded.buffer_time,
           same_day_lead_time_buffer = excluded.same_day_lead_time_buffer,
           max_advance_booking_days = excluded.max_advance_booking_days,
           display_unavailable_slots = excluded.display_unavailable_slots",
        params![
            setting.location_id,
            setting.daily_availability,
            setting.time_zone,
            setting.initial_booking_length,
            setting.booking_length_increments,
            setting.maximum_booking_length,
            setting.time_slot_increments,
            setting.buffer_time,
            setting.same_day_lead_time_buffer,
            setting.max_advance_booking_days,
            setting.display_unavailable_slots as i32,
        ],
    )?;
    Ok(())
}

pub fn get_location_setting(
    conn: &Connection,
    location_id: &str,
) -> anyhow::Result<Option<LocationSetting>> {
    let result = conn.query_row(
        "SELECT location_id, daily_availability, time_zone, initial_booking_length,
                booking_length_increments, maximum_booking_length, time_slot_increments,
                buffer_time, same_day_lead_time_buffer, max_advance_booking_days,
                display_unavailable_slots
         FROM location_settings WHERE location_id = ?1",
        params![location_id],
        |row| {
            Ok(LocationSetting {
                location_id: row.get(0)?,
                daily_availability: row.get(1)?,
                time_zone: row.get(2)?,
                initial_booking_length: row.get(3)?,
                booking_length_increments: row.get(4)?,
                maximum_booking_length: row.get(5)?,
                time_slot_increments: row.get(6)?,
                buffer_time: row.get(7)?,
                same_day_lead_time_buffer: row.get(8)?,
                max_advance_booking_days: row.get(9)?,
                display_unavailable_slots: row.get::<_, i32>(10)? != 0,
            })
        },
    );

    match result {
        Ok(setting) => Ok(Some(setting)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, location_id, start_time, end_time, status,
            customer_name, customer_email, customer_phone, email_reminder_sent,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            booking.id,
            booking.location_id,
            format_instant(&booking.start_time),
            format_instant(&booking.end_time),
            booking.status.as_str(),
            booking.customer.name,
            booking.customer.email,
            booking.customer.phone,
            booking.email_reminder_sent as i32,
            format_instant(&booking.created_at),
            format_instant(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, location_id, start_time, end_time, status, customer_name,
                customer_email, customer_phone, email_reminder_sent, created_at, updated_at
         FROM bookings WHERE id = ?1",
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// ACTIVE bookings of a location whose interval intersects `[from, to)`,
/// chronological.
pub fn get_active_bookings_between(
    conn: &Connection,
    location_id: &str,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT id, location_id, start_time, end_time, status, customer_name,
                customer_email, customer_phone, email_reminder_sent, created_at, updated_at
         FROM bookings
         WHERE location_id = ?1 AND status = 'active' AND start_time < ?3 AND end_time > ?2
         ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(
        params![location_id, format_instant(from), format_instant(to)],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET start_time = ?1, end_time = ?2, status = ?3,
            customer_name = ?4, customer_email = ?5, customer_phone = ?6,
            email_reminder_sent = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            format_instant(&booking.start_time),
            format_instant(&booking.end_time),
            booking.status.as_str(),
            booking.customer.name,
            booking.customer.email,
            booking.customer.phone,
            booking.email_reminder_sent as i32,
            format_instant(&booking.updated_at),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

/// Flip ACTIVE bookings whose end has passed to COMPLETED. Driven by an
/// external sweep, never by the booking validator.
pub fn complete_elapsed(conn: &Connection, now: &DateTime<Utc>) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'completed', updated_at = ?1
         WHERE status = 'active' AND end_time <= ?1",
        params![format_instant(now)],
    )?;
    Ok(count)
}

pub fn mark_reminder_sent(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET email_reminder_sent = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let location_id: String = row.get(1)?;
    let start_time: String = row.get(2)?;
    let end_time: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let customer_name: String = row.get(5)?;
    let customer_email: String = row.get(6)?;
    let customer_phone: String = row.get(7)?;
    let email_reminder_sent: i32 = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    let status = BookingStatus::parse(&status_str)
        .with_context(|| format!("unknown booking status: {status_str}"))?;

    Ok(Booking {
        id,
        location_id,
        start_time: parse_instant(&start_time)?,
        end_time: parse_instant(&end_time)?,
        status,
        customer: Customer {
            name: customer_name,
            email: customer_email,
            phone: customer_phone,
        },
        email_reminder_sent: email_reminder_sent != 0,
        created_at: parse_instant(&created_at)?,
        updated_at: parse_instant(&updated_at)?,
    })
}
