use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::models::{Appointment, AppointmentIdentity, AppointmentSeries, AppointmentStatus, VisitWindow};

// ==============================================================================
// PROVIDER ERROR TYPES
// ==============================================================================

/// Failure of a read-only data provider (holiday calendar, appointment load).
#[derive(Error, Debug)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// The facility could not offer an appointment datetime.
#[derive(Error, Debug)]
#[error("Facility '{facility_name}' has no available datetime near {suggested}")]
pub struct FacilityError {
    pub facility_name: String,
    pub suggested: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The identity key is already taken, e.g. a concurrent creator won the race.
    #[error("Unique constraint violated for appointment {identity}")]
    UniqueViolation { identity: String },

    #[error("Appointment store query failed: {0}")]
    Query(String),
}

// ==============================================================================
// COLLABORATOR TRAITS
// ==============================================================================

/// Source of the holiday calendar. Queried fresh on every resolution call;
/// the resolver snapshots the result once and never re-queries mid-loop.
#[async_trait]
pub trait HolidayProvider: Send + Sync {
    async fn all_holiday_dates(&self) -> Result<HashSet<NaiveDate>, ProviderError>;
}

/// Per-day appointment counts for a subject's visit series.
///
/// Counts are keyed by each appointment's original timepoint date, not a
/// previously shifted date, so rebalancing never compounds earlier moves.
#[async_trait]
pub trait AppointmentLoadProvider: Send + Sync {
    async fn counts_by_date(
        &self,
        series: &AppointmentSeries,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<NaiveDate, u32>, ProviderError>;
}

/// Decides whether a proposed datetime falls inside the permitted window
/// around a baseline datetime.
pub trait WindowPeriodValidator: Send + Sync {
    fn is_within_window(&self, candidate: DateTime<Utc>, baseline: DateTime<Utc>) -> bool;
}

/// Offers an available appointment datetime near a suggestion, inside the
/// visit window and avoiding datetimes already taken by the subject's other
/// appointments.
#[async_trait]
pub trait FacilityProvider: Send + Sync {
    async fn available_datetime(
        &self,
        suggested: DateTime<Utc>,
        window: VisitWindow,
        taken: &[DateTime<Utc>],
    ) -> Result<DateTime<Utc>, FacilityError>;
}

/// Persistence of appointment records. Uniqueness of the identity key is the
/// store's responsibility; the cell only surfaces the violation.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find(
        &self,
        identity: &AppointmentIdentity,
        status: Option<&AppointmentStatus>,
    ) -> Result<Option<Appointment>, StoreError>;

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError>;
}
