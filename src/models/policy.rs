use std::collections::HashMap;

use chrono::{Duration, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::errors::EngineError;
use crate::models::LocationSetting;

/// Open/close window for one weekday, local to the policy's zone.
/// Invariant: `open < close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// Per-weekday operating hours, Monday first. A `None` entry is a closed day.
#[derive(Debug, Clone, Default)]
pub struct WeekSchedule {
    days: [Option<DayHours>; 7],
}

const DAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

#[derive(Deserialize)]
struct RawDayHours {
    open: String,
    close: String,
    #[serde(default = "default_open")]
    is_open: bool,
}

fn default_open() -> bool {
    true
}

impl WeekSchedule {
    /// Parse the stored weekday-hours JSON. Any malformation (bad JSON,
    /// an unknown day key, an unparseable time, `open >= close` on an open
    /// day) is a `Config` error; there are no silent defaults.
    pub fn from_json(s: &str) -> Result<Self, EngineError> {
        let raw: HashMap<String, RawDayHours> = serde_json::from_str(s)
            .map_err(|e| EngineError::Config(format!("invalid daily availability JSON: {e}")))?;

        let mut days: [Option<DayHours>; 7] = Default::default();
        for (day, hours) in &raw {
            let idx = parse_weekday(day)?;
            if !hours.is_open {
                continue;
            }
            let open = parse_time(&hours.open)?;
            let close = parse_time(&hours.close)?;
            if open >= close {
                return Err(EngineError::Config(format!(
                    "open time {} is not before close time {} on {day}",
                    hours.open, hours.close
                )));
            }
            days[idx] = Some(DayHours { open, close });
        }
        Ok(Self { days })
    }

    pub fn hours_for(&self, weekday: Weekday) -> Option<DayHours> {
        self.days[weekday.num_days_from_monday() as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.days.iter().all(|d| d.is_none())
    }
}

fn parse_weekday(s: &str) -> Result<usize, EngineError> {
    DAY_NAMES
        .iter()
        .position(|d| *d == s.to_lowercase())
        .ok_or_else(|| EngineError::Config(format!("invalid weekday: {s}")))
}

fn parse_time(s: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| EngineError::Config(format!("invalid time: {s}")))
}

/// A location's scheduling configuration, parsed and validated once from its
/// settings record. All durations are minutes; wall-clock fields are local
/// to `time_zone`, everything that crosses the engine boundary is UTC.
#[derive(Debug, Clone)]
pub struct TimePolicy {
    pub schedule: WeekSchedule,
    pub time_zone: Tz,
    pub initial_booking_length: i64,
    pub booking_length_increments: i64,
    pub maximum_booking_length: i64,
    pub time_slot_increments: i64,
    pub buffer_time: i64,
    pub same_day_lead_time_buffer: i64,
    pub max_advance_booking_days: i64,
    pub display_unavailable_slots: bool,
}

impl TimePolicy {
    pub fn from_setting(setting: &LocationSetting) -> Result<Self, EngineError> {
        let time_zone: Tz = setting
            .time_zone
            .parse()
            .map_err(|_| EngineError::Config(format!("unknown timezone: {}", setting.time_zone)))?;

        let schedule = WeekSchedule::from_json(&setting.daily_availability)?;

        if setting.initial_booking_length <= 0 {
            return Err(EngineError::Config(
                "initial booking length must be positive".to_string(),
            ));
        }
        if setting.maximum_booking_length < setting.initial_booking_length {
            return Err(EngineError::Config(
                "maximum booking length is shorter than the initial length".to_string(),
            ));
        }
        if setting.time_slot_increments <= 0 {
            return Err(EngineError::Config(
                "time slot increment must be positive".to_string(),
            ));
        }
        if setting.booking_length_increments < 0
            || setting.buffer_time < 0
            || setting.same_day_lead_time_buffer < 0
            || setting.max_advance_booking_days < 0
        {
            return Err(EngineError::Config(
                "scheduling durations must not be negative".to_string(),
            ));
        }

        Ok(Self {
            schedule,
            time_zone,
            initial_booking_length: setting.initial_booking_length,
            booking_length_increments: setting.booking_length_increments,
            maximum_booking_length: setting.maximum_booking_length,
            time_slot_increments: setting.time_slot_increments,
            buffer_time: setting.buffer_time,
            same_day_lead_time_buffer: setting.same_day_lead_time_buffer,
            max_advance_booking_days: setting.max_advance_booking_days,
            display_unavailable_slots: setting.display_unavailable_slots,
        })
    }

    pub fn hours_for(&self, weekday: Weekday) -> Option<DayHours> {
        self.schedule.hours_for(weekday)
    }

    /// Durations a customer may book: the initial length stepped by the
    /// increment up to the configured maximum. A zero increment offers only
    /// the initial length.
    pub fn allowed_durations(&self) -> Vec<i64> {
        let mut durations = vec![self.initial_booking_length];
        if self.booking_length_increments > 0 {
            let mut next = self.initial_booking_length + self.booking_length_increments;
            while next <= self.maximum_booking_length {
                durations.push(next);
                next += self.booking_length_increments;
            }
        }
        durations
    }

    pub fn buffer(&self) -> Duration {
        Duration::minutes(self.buffer_time)
    }

    pub fn lead_time(&self) -> Duration {
        Duration::minutes(self.same_day_lead_time_buffer)
    }

    pub fn hours_summary(&self) -> String {
        let mut parts = Vec::new();
        for (idx, name) in DAY_NAMES.iter().enumerate() {
            if let Some(hours) = self.schedule.days[idx] {
                let day = capitalize(name);
                parts.push(format!(
                    "{day}: {}-{}",
                    hours.open.format("%H:%M"),
                    hours.close.format("%H:%M")
                ));
            }
        }
        parts.join(", ")
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}
