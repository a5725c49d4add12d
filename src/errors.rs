use crate::models::BookingStatus;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed or missing policy configuration. Fatal for that location's
    /// scheduling until the settings record is corrected; never retried and
    /// never papered over with defaults.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid booking duration: {0} minutes")]
    InvalidDuration(i64),

    #[error("booking start time is in the past")]
    PastStartTime,

    #[error("booking date is beyond the advance booking window")]
    BeyondAdvanceWindow,

    #[error("booking start is inside the same-day lead time window")]
    LeadTimeViolation,

    /// The requested interval is not an available slot. Recoverable: the
    /// caller should re-fetch availability and pick again.
    #[error("requested slot is no longer available")]
    SlotConflict,

    #[error("booking is {0} and cannot be modified")]
    InvalidState(BookingStatus),

    #[error("customer {0} is required")]
    InvalidCustomer(&'static str),

    #[error("not found: {0}")]
    NotFound(String),

    /// Opaque storage-layer failure, surfaced as-is.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
