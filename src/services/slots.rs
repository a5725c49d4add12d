use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::errors::EngineError;
use crate::models::TimePolicy;

/// Candidate grid for one calendar date in the location's zone.
#[derive(Debug, Clone, PartialEq)]
pub enum DaySlots {
    /// The weekday is closed (or its window is empty).
    Closed,
    /// The date lies past the advance-booking horizon.
    BeyondHorizon,
    Open {
        open: DateTime<Utc>,
        close: DateTime<Utc>,
        slots: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    },
}

/// Resolve a local wall-clock time on `date` to a UTC instant. Ambiguous
/// times (fall-back) take the earliest mapping; nonexistent times
/// (spring-forward gap) shift forward to the first representable instant.
pub(crate) fn zone_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let mut naive = date.and_time(time);
    for _ in 0..16 {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => naive += Duration::minutes(15),
        }
    }
    // no real zone has a gap this wide; read the wall clock as UTC
    naive.and_utc()
}

/// Build the ordered candidate starts for `date`: from the weekday's open,
/// stepping by the slot increment, while the slot still ends by close. On
/// the current day, candidates inside the lead-time window are dropped.
/// Pure function of its inputs; display and commit both call it, so the
/// two can never disagree.
pub fn generate_candidate_slots(
    date: NaiveDate,
    duration_minutes: i64,
    policy: &TimePolicy,
    now: DateTime<Utc>,
) -> Result<DaySlots, EngineError> {
    if !policy.allowed_durations().contains(&duration_minutes) {
        return Err(EngineError::InvalidDuration(duration_minutes));
    }

    let today = now.with_timezone(&policy.time_zone).date_naive();
    if date > today + Duration::days(policy.max_advance_booking_days) {
        return Ok(DaySlots::BeyondHorizon);
    }

    let Some(hours) = policy.hours_for(date.weekday()) else {
        return Ok(DaySlots::Closed);
    };
    if hours.open >= hours.close {
        return Ok(DaySlots::Closed);
    }

    let open = zone_instant(policy.time_zone, date, hours.open);
    let close = zone_instant(policy.time_zone, date, hours.close);
    if open >= close {
        // spring-forward can swallow a window that sits inside the gap
        return Ok(DaySlots::Closed);
    }

    let duration = Duration::minutes(duration_minutes);
    let step = Duration::minutes(policy.time_slot_increments);
    let earliest = if date == today {
        Some(now + policy.lead_time())
    } else {
        None
    };

    let mut slots = Vec::new();
    let mut start = open;
    while start + duration <= close {
        if earliest.map_or(true, |e| start >= e) {
            slots.push((start, start + duration));
        }
        start += step;
    }

    Ok(DaySlots::Open { open, close, slots })
}
