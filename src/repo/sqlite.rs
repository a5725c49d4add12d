use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::EngineError;
use crate::models::{Booking, Location, LocationSetting};

use super::BookingRepository;

/// SQLite-backed repository. A single shared connection behind a mutex;
/// every operation runs as one statement (or one implicit transaction) on
/// that connection.
#[derive(Clone)]
pub struct SqliteBookingRepository {
    db: Arc<Mutex<Connection>>,
}

impl SqliteBookingRepository {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::from_connection(db::init_db(path)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn get_location(&self, id: &str) -> Result<Option<Location>, EngineError> {
        let db = self.db.lock().unwrap();
        Ok(queries::get_location(&db, id)?)
    }

    async fn get_location_setting(
        &self,
        location_id: &str,
    ) -> Result<Option<LocationSetting>, EngineError> {
        let db = self.db.lock().unwrap();
        Ok(queries::get_location_setting(&db, location_id)?)
    }

    async fn create_location(
        &self,
        location: &Location,
        setting: &LocationSetting,
    ) -> Result<(), EngineError> {
        let db = self.db.lock().unwrap();
        queries::create_location(&db, location)?;
        queries::save_location_setting(&db, setting)?;
        Ok(())
    }

    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, EngineError> {
        let db = self.db.lock().unwrap();
        Ok(queries::get_booking_by_id(&db, id)?)
    }

    async fn active_bookings_between(
        &self,
        location_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, EngineError> {
        let db = self.db.lock().unwrap();
        Ok(queries::get_active_bookings_between(
            &db,
            location_id,
            &from,
            &to,
        )?)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), EngineError> {
        let db = self.db.lock().unwrap();
        Ok(queries::create_booking(&db, booking)?)
    }

    async fn update_booking(&self, booking: &Booking) -> Result<bool, EngineError> {
        let db = self.db.lock().unwrap();
        Ok(queries::update_booking(&db, booking)?)
    }

    async fn complete_elapsed(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let db = self.db.lock().unwrap();
        Ok(queries::complete_elapsed(&db, &now)?)
    }

    async fn mark_reminder_sent(&self, id: &str) -> Result<bool, EngineError> {
        let db = self.db.lock().unwrap();
        Ok(queries::mark_reminder_sent(&db, id)?)
    }
}
