use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as LocationMutex;

use crate::errors::EngineError;
use crate::models::{Booking, BookingStatus, Customer, TimePolicy};
use crate::repo::BookingRepository;
use crate::services::availability::{annotate, Slot};
use crate::services::slots::{generate_candidate_slots, zone_instant, DaySlots};

/// A proposed booking, not yet validated or persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub location_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub customer: Customer,
}

/// One day's availability as reported to callers. Instants are UTC.
#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub is_open: bool,
    pub open_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub slots: Vec<Slot>,
}

impl DayAvailability {
    fn closed() -> Self {
        Self {
            is_open: false,
            open_time: None,
            close_time: None,
            slots: vec![],
        }
    }
}

/// The day's candidate grid after annotation against a fresh read of the
/// day's ACTIVE bookings.
enum AnnotatedDay {
    Closed,
    BeyondHorizon,
    Open {
        open: DateTime<Utc>,
        close: DateTime<Utc>,
        slots: Vec<Slot>,
    },
}

/// The validating committer. Availability shown to a caller is only a hint;
/// every create/update re-fetches the day's ACTIVE bookings and re-checks
/// the requested interval while holding that location's commit lock, so two
/// racing commits for the same location serialize and exactly one wins.
pub struct BookingEngine {
    repo: Arc<dyn BookingRepository>,
    location_locks: Mutex<HashMap<String, Arc<LocationMutex<()>>>>,
}

impl BookingEngine {
    pub fn new(repo: Arc<dyn BookingRepository>) -> Self {
        Self {
            repo,
            location_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_available_slots(
        &self,
        location_id: &str,
        date: NaiveDate,
        duration_minutes: i64,
        exclude_booking_id: Option<&str>,
    ) -> Result<DayAvailability, EngineError> {
        self.get_available_slots_at(
            location_id,
            date,
            duration_minutes,
            exclude_booking_id,
            Utc::now(),
        )
        .await
    }

    /// Testable version of `get_available_slots` with an explicit clock.
    pub async fn get_available_slots_at(
        &self,
        location_id: &str,
        date: NaiveDate,
        duration_minutes: i64,
        exclude_booking_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DayAvailability, EngineError> {
        let policy = self.policy_for(location_id).await?;
        let day = self
            .annotated_day(location_id, &policy, date, duration_minutes, exclude_booking_id, now)
            .await?;

        Ok(match day {
            AnnotatedDay::Closed | AnnotatedDay::BeyondHorizon => DayAvailability::closed(),
            AnnotatedDay::Open { open, close, mut slots } => {
                if !policy.display_unavailable_slots {
                    slots.retain(|s| s.is_available);
                }
                DayAvailability {
                    is_open: true,
                    open_time: Some(open),
                    close_time: Some(close),
                    slots,
                }
            }
        })
    }

    pub async fn create_booking(&self, new: NewBooking) -> Result<Booking, EngineError> {
        self.create_booking_at(new, Utc::now()).await
    }

    /// Testable version of `create_booking` with an explicit clock.
    pub async fn create_booking_at(
        &self,
        new: NewBooking,
        now: DateTime<Utc>,
    ) -> Result<Booking, EngineError> {
        validate_customer(&new.customer)?;
        let policy = self.policy_for(&new.location_id).await?;

        let lock = self.location_lock(&new.location_id);
        let _guard = lock.lock().await;

        validate_window(&policy, new.start_time, new.end_time, now)?;
        self.ensure_requested_slot(&new.location_id, &policy, new.start_time, new.end_time, None, now)
            .await?;

        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            location_id: new.location_id,
            start_time: new.start_time,
            end_time: new.end_time,
            status: BookingStatus::Active,
            customer: new.customer,
            email_reminder_sent: false,
            created_at: now,
            updated_at: now,
        };
        self.repo.insert_booking(&booking).await?;

        tracing::info!(
            booking_id = %booking.id,
            location_id = %booking.location_id,
            start = %booking.start_time,
            "booking created"
        );
        Ok(booking)
    }

    pub async fn update_booking(
        &self,
        booking_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        customer: Customer,
    ) -> Result<Booking, EngineError> {
        self.update_booking_at(booking_id, start_time, end_time, customer, Utc::now())
            .await
    }

    /// Testable version of `update_booking` with an explicit clock.
    pub async fn update_booking_at(
        &self,
        booking_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        customer: Customer,
        now: DateTime<Utc>,
    ) -> Result<Booking, EngineError> {
        validate_customer(&customer)?;

        let existing = self.require_booking(booking_id).await?;
        if existing.status != BookingStatus::Active {
            return Err(EngineError::InvalidState(existing.status));
        }
        let policy = self.policy_for(&existing.location_id).await?;

        let lock = self.location_lock(&existing.location_id);
        let _guard = lock.lock().await;

        // re-read under the lock so a concurrent cancel is not overwritten
        let existing = self.require_booking(booking_id).await?;
        if existing.status != BookingStatus::Active {
            return Err(EngineError::InvalidState(existing.status));
        }

        validate_window(&policy, start_time, end_time, now)?;
        self.ensure_requested_slot(
            &existing.location_id,
            &policy,
            start_time,
            end_time,
            Some(booking_id),
            now,
        )
        .await?;

        let updated = Booking {
            start_time,
            end_time,
            customer,
            updated_at: now,
            ..existing
        };
        self.repo.update_booking(&updated).await?;

        tracing::info!(
            booking_id = %updated.id,
            start = %updated.start_time,
            "booking rescheduled"
        );
        Ok(updated)
    }

    pub async fn cancel_booking(&self, booking_id: &str) -> Result<Booking, EngineError> {
        self.cancel_booking_at(booking_id, Utc::now()).await
    }

    /// Testable version of `cancel_booking` with an explicit clock.
    pub async fn cancel_booking_at(
        &self,
        booking_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking, EngineError> {
        let existing = self.require_booking(booking_id).await?;
        if existing.status != BookingStatus::Active {
            return Err(EngineError::InvalidState(existing.status));
        }

        let cancelled = Booking {
            status: BookingStatus::Cancelled,
            updated_at: now,
            ..existing
        };
        self.repo.update_booking(&cancelled).await?;

        tracing::info!(booking_id = %cancelled.id, "booking cancelled");
        Ok(cancelled)
    }

    // ── internals ──

    async fn require_booking(&self, booking_id: &str) -> Result<Booking, EngineError> {
        self.repo
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {booking_id}")))
    }

    async fn policy_for(&self, location_id: &str) -> Result<TimePolicy, EngineError> {
        let location = self
            .repo
            .get_location(location_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("location {location_id}")))?;
        let setting = self
            .repo
            .get_location_setting(location_id)
            .await?
            .ok_or_else(|| {
                EngineError::Config(format!("no settings for location {location_id}"))
            })?;

        let policy = TimePolicy::from_setting(&setting)?;
        tracing::debug!(
            location_id,
            zone = %policy.time_zone,
            hours = %policy.hours_summary(),
            "resolved scheduling policy"
        );
        if location.timezone != setting.time_zone {
            tracing::warn!(
                location_id,
                location_tz = %location.timezone,
                setting_tz = %setting.time_zone,
                "location timezone disagrees with its settings; using the settings zone"
            );
        }
        Ok(policy)
    }

    fn location_lock(&self, location_id: &str) -> Arc<LocationMutex<()>> {
        let mut locks = self.location_locks.lock().unwrap();
        locks.entry(location_id.to_string()).or_default().clone()
    }

    async fn annotated_day(
        &self,
        location_id: &str,
        policy: &TimePolicy,
        date: NaiveDate,
        duration_minutes: i64,
        exclude_booking_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AnnotatedDay, EngineError> {
        match generate_candidate_slots(date, duration_minutes, policy, now)? {
            DaySlots::Closed => Ok(AnnotatedDay::Closed),
            DaySlots::BeyondHorizon => Ok(AnnotatedDay::BeyondHorizon),
            DaySlots::Open { open, close, slots } => {
                let (from, to) = day_window(policy, date);
                let bookings = self
                    .repo
                    .active_bookings_between(location_id, from, to)
                    .await?;
                let slots = annotate(&slots, &bookings, policy.buffer(), exclude_booking_id);
                Ok(AnnotatedDay::Open { open, close, slots })
            }
        }
    }

    /// Commit-time re-validation: the requested interval must appear in the
    /// freshly generated grid as an available slot. Off-grid, out-of-window,
    /// closed-day, and conflicting intervals all reject the same way.
    async fn ensure_requested_slot(
        &self,
        location_id: &str,
        policy: &TimePolicy,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_booking_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let date = start.with_timezone(&policy.time_zone).date_naive();
        let duration_minutes = (end - start).num_minutes();

        let day = self
            .annotated_day(location_id, policy, date, duration_minutes, exclude_booking_id, now)
            .await?;
        let AnnotatedDay::Open { slots, .. } = day else {
            return Err(EngineError::SlotConflict);
        };

        let matches = slots
            .iter()
            .any(|s| s.start == start && s.end == end && s.is_available);
        if matches {
            Ok(())
        } else {
            Err(EngineError::SlotConflict)
        }
    }
}

fn validate_customer(customer: &Customer) -> Result<(), EngineError> {
    if customer.name.trim().is_empty() {
        return Err(EngineError::InvalidCustomer("name"));
    }
    if customer.email.trim().is_empty() {
        return Err(EngineError::InvalidCustomer("email"));
    }
    if customer.phone.trim().is_empty() {
        return Err(EngineError::InvalidCustomer("phone"));
    }
    Ok(())
}

fn validate_window(
    policy: &TimePolicy,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    let span = end - start;
    let minutes = span.num_minutes();
    if end <= start || span.num_seconds() % 60 != 0 {
        return Err(EngineError::InvalidDuration(minutes));
    }
    if !policy.allowed_durations().contains(&minutes) {
        return Err(EngineError::InvalidDuration(minutes));
    }
    if start < now {
        return Err(EngineError::PastStartTime);
    }

    let today = now.with_timezone(&policy.time_zone).date_naive();
    let start_date = start.with_timezone(&policy.time_zone).date_naive();
    if start_date > today + Duration::days(policy.max_advance_booking_days) {
        return Err(EngineError::BeyondAdvanceWindow);
    }
    if start_date == today && start < now + policy.lead_time() {
        return Err(EngineError::LeadTimeViolation);
    }
    Ok(())
}

/// UTC window covering the local calendar day plus slop on both edges, so
/// neighbors whose buffer-padded interval reaches into the day are seen.
fn day_window(policy: &TimePolicy, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let slop = Duration::minutes(policy.buffer_time + policy.maximum_booking_length);
    let start = zone_instant(policy.time_zone, date, NaiveTime::MIN);
    let end = zone_instant(policy.time_zone, date + Duration::days(1), NaiveTime::MIN);
    (start - slop, end + slop)
}
