#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, NaiveDate, TimeZone, Utc};

use appointment_cell::{
    Appointment, AppointmentIdentity, AppointmentLoadProvider, AppointmentSeries,
    AppointmentStatus, AppointmentStore, FacilityError, FacilityProvider, HolidayProvider,
    ProviderError, StoreError, VisitWindow, WindowPeriodValidator,
};

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn series(subject: &str) -> AppointmentSeries {
    AppointmentSeries {
        subject_identifier: subject.to_string(),
        visit_schedule_name: "visit_schedule1".to_string(),
        schedule_name: "schedule1".to_string(),
    }
}

// ==============================================================================
// PROVIDER FAKES
// ==============================================================================

/// Holiday calendar with a fixed date set; counts lookups so tests can assert
/// the snapshot is taken exactly once per resolution call.
pub struct FixedHolidays {
    dates: HashSet<NaiveDate>,
    lookups: AtomicU32,
}

impl FixedHolidays {
    pub fn none() -> Self {
        Self::of(&[])
    }

    pub fn of(dates: &[NaiveDate]) -> Self {
        Self {
            dates: dates.iter().copied().collect(),
            lookups: AtomicU32::new(0),
        }
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HolidayProvider for FixedHolidays {
    async fn all_holiday_dates(&self) -> Result<HashSet<NaiveDate>, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.dates.clone())
    }
}

/// Per-day appointment counts with fixed values; dates outside the queried
/// range are filtered the way a real store query would.
pub struct FixedLoad {
    counts: HashMap<NaiveDate, u32>,
}

impl FixedLoad {
    pub fn empty() -> Self {
        Self::of(&[])
    }

    pub fn of(counts: &[(NaiveDate, u32)]) -> Self {
        Self {
            counts: counts.iter().copied().collect(),
        }
    }
}

#[async_trait]
impl AppointmentLoadProvider for FixedLoad {
    async fn counts_by_date(
        &self,
        _series: &AppointmentSeries,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<NaiveDate, u32>, ProviderError> {
        Ok(self
            .counts
            .iter()
            .filter(|(date, _)| (from..=to).contains(*date))
            .map(|(date, count)| (*date, *count))
            .collect())
    }
}

/// Accepts any candidate within `max_distance_days` of the baseline.
pub struct DayRangeWindow {
    pub max_distance_days: i64,
}

impl WindowPeriodValidator for DayRangeWindow {
    fn is_within_window(&self, candidate: DateTime<Utc>, baseline: DateTime<Utc>) -> bool {
        let distance = (candidate - baseline).num_days().abs();
        distance <= self.max_distance_days
    }
}

/// Offers the suggested datetime, stepping forward a day at a time past taken
/// datetimes, up to the forward edge of the visit window.
pub struct NearestSlotFacility {
    pub name: String,
}

impl NearestSlotFacility {
    pub fn new() -> Self {
        Self {
            name: "clinic-a".to_string(),
        }
    }
}

#[async_trait]
impl FacilityProvider for NearestSlotFacility {
    async fn available_datetime(
        &self,
        suggested: DateTime<Utc>,
        window: VisitWindow,
        taken: &[DateTime<Utc>],
    ) -> Result<DateTime<Utc>, FacilityError> {
        for offset in 0..=i64::from(window.forward_days) {
            let candidate = suggested + Duration::days(offset);
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(FacilityError {
            facility_name: self.name.clone(),
            suggested,
        })
    }
}

/// Facility with no availability at all.
pub struct NoSlotFacility;

#[async_trait]
impl FacilityProvider for NoSlotFacility {
    async fn available_datetime(
        &self,
        suggested: DateTime<Utc>,
        _window: VisitWindow,
        _taken: &[DateTime<Utc>],
    ) -> Result<DateTime<Utc>, FacilityError> {
        Err(FacilityError {
            facility_name: "clinic-closed".to_string(),
            suggested,
        })
    }
}

// ==============================================================================
// STORE FAKES
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: Mutex<Vec<Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Appointment>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn rows(&self) -> Vec<Appointment> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn find(
        &self,
        identity: &AppointmentIdentity,
        status: Option<&AppointmentStatus>,
    ) -> Result<Option<Appointment>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| {
                row.identity == *identity
                    && status.map_or(true, |status| row.appt_status == *status)
            })
            .cloned())
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|row| row.identity == appointment.identity) {
            return Err(StoreError::UniqueViolation {
                identity: appointment.identity.to_string(),
            });
        }
        rows.push(appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == appointment.id)
            .ok_or_else(|| StoreError::Query(format!("no appointment with id {}", appointment.id)))?;
        *row = appointment.clone();
        Ok(appointment)
    }
}

/// Simulates losing a creation race: the lookup sees nothing, but another
/// writer claims the identity key before our insert lands.
pub struct RacingStore;

#[async_trait]
impl AppointmentStore for RacingStore {
    async fn find(
        &self,
        _identity: &AppointmentIdentity,
        _status: Option<&AppointmentStatus>,
    ) -> Result<Option<Appointment>, StoreError> {
        Ok(None)
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        Err(StoreError::UniqueViolation {
            identity: appointment.identity.to_string(),
        })
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        Ok(appointment)
    }
}

/// Saturates `days` consecutive dates starting at `from`, `count` each.
pub fn saturated_range(from: NaiveDate, days: u64, count: u32) -> Vec<(NaiveDate, u32)> {
    (0..days)
        .map(|offset| (from + Days::new(offset), count))
        .collect()
}
