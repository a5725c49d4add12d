//! Booking availability engine: computes which time slots a customer may
//! book at a location from its operating hours, scheduling policy, and
//! existing bookings, then commits new or changed bookings against a fresh
//! availability check so no two active bookings ever overlap.

pub mod db;
pub mod errors;
pub mod models;
pub mod repo;
pub mod services;

pub use errors::EngineError;
pub use models::{Booking, BookingStatus, Customer, Location, LocationSetting, TimePolicy};
pub use repo::{BookingRepository, SqliteBookingRepository};
pub use services::availability::Slot;
pub use services::booking::{BookingEngine, DayAvailability, NewBooking};
pub use services::slots::DaySlots;
