// libs/appointment-cell/src/models.rs
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::SchedulingError;
use shared_config::AppConfig;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// Identity key of an appointment. One appointment exists per subject, visit
/// and visit code sequence; the key is immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentIdentity {
    pub subject_identifier: String,
    pub visit_schedule_name: String,
    pub schedule_name: String,
    pub visit_code: String,
    /// Disambiguates repeated or unscheduled visits sharing a visit code.
    pub visit_code_sequence: u32,
}

impl fmt::Display for AppointmentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}.{}",
            self.subject_identifier, self.visit_code, self.visit_code_sequence
        )
    }
}

/// Groups the appointments whose per-day load is balanced together: one
/// subject on one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentSeries {
    pub subject_identifier: String,
    pub visit_schedule_name: String,
    pub schedule_name: String,
}

impl From<&AppointmentIdentity> for AppointmentSeries {
    fn from(identity: &AppointmentIdentity) -> Self {
        Self {
            subject_identifier: identity.subject_identifier.clone(),
            visit_schedule_name: identity.visit_schedule_name.clone(),
            schedule_name: identity.schedule_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    #[serde(flatten)]
    pub identity: AppointmentIdentity,
    /// Unadjusted datetime calculated from the visit schedule.
    #[serde(with = "serde_aware")]
    pub timepoint_datetime: DateTime<Utc>,
    /// Adjusted datetime the visit is actually booked for.
    #[serde(with = "serde_aware")]
    pub appt_datetime: DateTime<Utc>,
    pub appt_type: AppointmentType,
    pub appt_status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn series(&self) -> AppointmentSeries {
        AppointmentSeries::from(&self.identity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    New,
    InProgress,
    Completed,
    Incomplete,
}

impl AppointmentStatus {
    /// Status machine: new -> in_progress -> {completed, incomplete}.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        matches!(
            (*self, next),
            (AppointmentStatus::New, AppointmentStatus::InProgress)
                | (AppointmentStatus::InProgress, AppointmentStatus::Completed)
                | (AppointmentStatus::InProgress, AppointmentStatus::Incomplete)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Incomplete)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::New => write!(f, "new"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Incomplete => write!(f, "incomplete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Clinic,
    HomeVisit,
    Telephone,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Clinic => write!(f, "clinic"),
            AppointmentType::HomeVisit => write!(f, "home_visit"),
            AppointmentType::Telephone => write!(f, "telephone"),
        }
    }
}

impl FromStr for AppointmentType {
    type Err = SchedulingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "clinic" => Ok(AppointmentType::Clinic),
            "home_visit" | "home" => Ok(AppointmentType::HomeVisit),
            "telephone" => Ok(AppointmentType::Telephone),
            other => Err(SchedulingError::Configuration(format!(
                "unknown appointment type '{other}'"
            ))),
        }
    }
}

/// Permitted range around a timepoint datetime within which the actual visit
/// may occur, in days before and after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitWindow {
    pub reverse_days: u32,
    pub forward_days: u32,
}

// ==============================================================================
// SCHEDULING CONFIGURATION
// ==============================================================================

/// Immutable scheduling constraints. Constructed once per call site and never
/// mutated mid-resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// ISO weekdays (1 = Monday .. 7 = Sunday) a visit may land on.
    pub allowed_iso_weekdays: BTreeSet<u32>,
    /// Force every appointment in a series onto the same weekday.
    pub use_same_weekday: bool,
    pub appointments_per_day_max: u32,
    /// Search horizon, in days, for capacity redistribution.
    pub appointments_days_forward: u32,
    pub default_appt_type: AppointmentType,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            allowed_iso_weekdays: (1..=5).collect(),
            use_same_weekday: false,
            appointments_per_day_max: 30,
            appointments_days_forward: 7,
            default_appt_type: AppointmentType::Clinic,
        }
    }
}

impl SchedulingConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, SchedulingError> {
        let mut allowed_iso_weekdays = BTreeSet::new();
        for ch in config.allowed_iso_weekdays.chars() {
            let weekday = ch.to_digit(10).ok_or_else(|| {
                SchedulingError::Configuration(format!(
                    "allowed_iso_weekdays must be digits 1-7, got '{}'",
                    config.allowed_iso_weekdays
                ))
            })?;
            allowed_iso_weekdays.insert(weekday);
        }

        let default_appt_type = config
            .default_appointment_type
            .parse()
            .unwrap_or_else(|_| {
                warn!(
                    "Unknown default appointment type '{}', falling back to clinic",
                    config.default_appointment_type
                );
                AppointmentType::Clinic
            });

        let scheduling_config = Self {
            allowed_iso_weekdays,
            use_same_weekday: config.use_same_weekday,
            appointments_per_day_max: config.appointments_per_day_max,
            appointments_days_forward: config.appointments_days_forward,
            default_appt_type,
        };
        scheduling_config.validate()?;
        Ok(scheduling_config)
    }

    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.allowed_iso_weekdays.is_empty() {
            return Err(SchedulingError::Configuration(
                "allowed_iso_weekdays must not be empty".to_string(),
            ));
        }
        if let Some(&weekday) = self
            .allowed_iso_weekdays
            .iter()
            .find(|weekday| !(1..=7).contains(*weekday))
        {
            return Err(SchedulingError::Configuration(format!(
                "allowed_iso_weekdays must be within 1-7, got {weekday}"
            )));
        }
        if self.appointments_per_day_max == 0 {
            return Err(SchedulingError::Configuration(
                "appointments_per_day_max must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentCreateRequest {
    pub subject_identifier: String,
    pub visit_schedule_name: String,
    pub schedule_name: String,
    pub visit_code: String,
    #[serde(default)]
    pub visit_code_sequence: u32,
    /// Nominal schedule-derived datetime for the visit.
    #[serde(with = "serde_aware")]
    pub timepoint_datetime: DateTime<Utc>,
    /// Preferred datetime; window rules relative to the timepoint still apply.
    #[serde(default, with = "serde_aware_opt")]
    pub suggested_datetime: Option<DateTime<Utc>>,
    pub window: VisitWindow,
    /// Datetimes already taken by the subject's other appointments.
    #[serde(default)]
    pub taken_datetimes: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub appt_status: Option<AppointmentStatus>,
    #[serde(default)]
    pub appt_type: Option<AppointmentType>,
}

impl AppointmentCreateRequest {
    pub fn identity(&self) -> AppointmentIdentity {
        AppointmentIdentity {
            subject_identifier: self.subject_identifier.clone(),
            visit_schedule_name: self.visit_schedule_name.clone(),
            schedule_name: self.schedule_name.clone(),
            visit_code: self.visit_code.clone(),
            visit_code_sequence: self.visit_code_sequence,
        }
    }

    pub fn suggested_or_timepoint(&self) -> DateTime<Utc> {
        self.suggested_datetime.unwrap_or(self.timepoint_datetime)
    }
}

// ==============================================================================
// DATETIME BOUNDARIES
// ==============================================================================

/// Parses an RFC 3339 datetime, rejecting values without an explicit UTC
/// offset. Wire input without an offset would otherwise be silently read as
/// local time.
pub fn aware_datetime(value: &str) -> Result<DateTime<Utc>, SchedulingError> {
    DateTime::parse_from_rfc3339(value)
        .map(|datetime| datetime.with_timezone(&Utc))
        .map_err(|_| SchedulingError::NaiveDatetime(value.to_string()))
}

mod serde_aware {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        datetime: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&datetime.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::aware_datetime(&raw).map_err(serde::de::Error::custom)
    }
}

mod serde_aware_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        datetime: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match datetime {
            Some(datetime) => serializer.serialize_some(&datetime.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|value| super::aware_datetime(&value).map_err(serde::de::Error::custom))
            .transpose()
    }
}
