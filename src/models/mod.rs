pub mod booking;
pub mod location;
pub mod policy;

pub use booking::{Booking, BookingStatus, Customer};
pub use location::{Location, LocationSetting};
pub use policy::{DayHours, TimePolicy, WeekSchedule};
