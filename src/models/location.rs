use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw per-location scheduling settings as stored. `daily_availability` is a
/// JSON object keyed by lowercase weekday name; `TimePolicy::from_setting`
/// parses and validates the whole record once at load. All durations are
/// minutes. `time_zone` must match `Location::timezone`; they are two
/// copies of the same fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSetting {
    pub location_id: String,
    pub daily_availability: String,
    pub time_zone: String,
    pub initial_booking_length: i64,
    pub booking_length_increments: i64,
    pub maximum_booking_length: i64,
    pub time_slot_increments: i64,
    pub buffer_time: i64,
    pub same_day_lead_time_buffer: i64,
    pub max_advance_booking_days: i64,
    pub display_unavailable_slots: bool,
}
