pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::EngineError;
use crate::models::{Booking, Location, LocationSetting};

pub use sqlite::SqliteBookingRepository;

/// Storage collaborator for the booking engine. The set of ACTIVE bookings
/// per location is the only shared mutable state the engine reasons about,
/// and it is mutated exclusively through this interface; the calculation
/// layers never touch storage.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn get_location(&self, id: &str) -> Result<Option<Location>, EngineError>;

    async fn get_location_setting(
        &self,
        location_id: &str,
    ) -> Result<Option<LocationSetting>, EngineError>;

    async fn create_location(
        &self,
        location: &Location,
        setting: &LocationSetting,
    ) -> Result<(), EngineError>;

    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, EngineError>;

    /// ACTIVE bookings of the location whose interval intersects
    /// `[from, to)`, chronological.
    async fn active_bookings_between(
        &self,
        location_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, EngineError>;

    async fn insert_booking(&self, booking: &Booking) -> Result<(), EngineError>;

    /// Returns false when no row matched the booking id.
    async fn update_booking(&self, booking: &Booking) -> Result<bool, EngineError>;

    /// Flip ACTIVE bookings whose end has passed to COMPLETED. Called by an
    /// external time-based sweep, never by the validator.
    async fn complete_elapsed(&self, now: DateTime<Utc>) -> Result<usize, EngineError>;

    async fn mark_reminder_sent(&self, id: &str) -> Result<bool, EngineError>;
}
