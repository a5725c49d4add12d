use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Booking;

/// One candidate interval of the day's grid, annotated against the
/// existing bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_available: bool,
}

/// Padded-interval intersection. Each booking claims `buffer` on both sides
/// of its interval; equality at a padded boundary is not an overlap, so a
/// slot may start exactly at `booking.end + buffer`.
pub fn buffer_overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
    buffer: Duration,
) -> bool {
    a_start < b_end + buffer && b_start < a_end + buffer
}

/// True when `[start, end)` clears every ACTIVE booking's buffer-padded
/// interval. `exclude_booking_id` skips the booking being edited so it does
/// not conflict with itself.
pub fn interval_is_free(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bookings: &[Booking],
    buffer: Duration,
    exclude_booking_id: Option<&str>,
) -> bool {
    bookings
        .iter()
        .filter(|b| b.blocks_availability())
        .filter(|b| exclude_booking_id != Some(b.id.as_str()))
        .all(|b| !buffer_overlaps(start, end, b.start_time, b.end_time, buffer))
}

/// Annotate each candidate slot against the day's bookings. Output order
/// matches input order. O(slots x bookings); a day's cardinalities are
/// bounded by the operating window and the increment.
pub fn annotate(
    candidates: &[(DateTime<Utc>, DateTime<Utc>)],
    bookings: &[Booking],
    buffer: Duration,
    exclude_booking_id: Option<&str>,
) -> Vec<Slot> {
    candidates
        .iter()
        .map(|&(start, end)| Slot {
            start,
            end,
            is_available: interval_is_free(start, end, bookings, buffer, exclude_booking_id),
        })
        .collect()
}
