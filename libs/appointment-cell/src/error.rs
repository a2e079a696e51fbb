use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::providers::{FacilityError, ProviderError, StoreError};

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Scheduling configuration invalid: {0}")]
    Configuration(String),

    #[error("Naive datetime not allowed, got '{0}' (an explicit UTC offset is required)")]
    NaiveDatetime(String),

    #[error("Reference weekday must be between 1 and 7, got {0}")]
    InvalidWeekday(u32),

    #[error("No valid appointment date within {max_steps} steps of {candidate}")]
    UnresolvableDate {
        candidate: DateTime<Utc>,
        max_steps: u32,
    },

    #[error("Every date between {from} and {to} has reached the daily cap of {cap} appointments")]
    CapacityExceeded {
        from: NaiveDate,
        to: NaiveDate,
        cap: u32,
    },

    #[error("An appointment already exists for {identity}: {message}")]
    CreationConflict { identity: String, message: String },

    #[error("{source}. Try enabling best-effort availability on the facility")]
    DateUnavailable {
        #[source]
        source: FacilityError,
    },

    #[error("Appointment store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}
