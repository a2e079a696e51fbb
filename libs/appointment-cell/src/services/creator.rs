// libs/appointment-cell/src/services/creator.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentCreateRequest, AppointmentStatus, SchedulingConfig};
use crate::providers::{AppointmentStore, FacilityProvider, StoreError};

/// Creates or updates one appointment record per visit occurrence.
///
/// The lookup-create-update flow is an idempotent upsert: calling twice with
/// identical inputs yields the same final state. Uniqueness of the identity
/// key is enforced by the store; a violation means a concurrent creator won
/// the race and is surfaced, never retried.
pub struct AppointmentCreationService {
    store: Arc<dyn AppointmentStore>,
    config: SchedulingConfig,
}

impl AppointmentCreationService {
    pub fn new(store: Arc<dyn AppointmentStore>, config: SchedulingConfig) -> Self {
        Self { store, config }
    }

    pub async fn create_or_update(
        &self,
        request: &AppointmentCreateRequest,
        facility: &dyn FacilityProvider,
    ) -> Result<Appointment, SchedulingError> {
        let identity = request.identity();
        let existing = self
            .store
            .find(&identity, request.appt_status.as_ref())
            .await?;

        match existing {
            None => {
                debug!("No appointment found for {}, creating", identity);
                self.create(request, facility).await
            }
            Some(appointment) => {
                debug!("Appointment {} exists, updating datetimes", identity);
                self.update(request, facility, appointment).await
            }
        }
    }

    async fn create(
        &self,
        request: &AppointmentCreateRequest,
        facility: &dyn FacilityProvider,
    ) -> Result<Appointment, SchedulingError> {
        let appt_datetime = self.available_datetime(request, facility).await?;
        let identity = request.identity();
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            identity: identity.clone(),
            timepoint_datetime: request.timepoint_datetime,
            appt_datetime,
            appt_type: request.appt_type.unwrap_or(self.config.default_appt_type),
            appt_status: AppointmentStatus::New,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .store
            .insert(appointment)
            .await
            .map_err(|error| match error {
                StoreError::UniqueViolation { .. } => SchedulingError::CreationConflict {
                    identity: identity.to_string(),
                    message: error.to_string(),
                },
                other => SchedulingError::Store(other),
            })?;

        info!("Created appointment {} at {}", created.identity, created.appt_datetime);
        Ok(created)
    }

    async fn update(
        &self,
        request: &AppointmentCreateRequest,
        facility: &dyn FacilityProvider,
        mut appointment: Appointment,
    ) -> Result<Appointment, SchedulingError> {
        appointment.appt_datetime = self.available_datetime(request, facility).await?;
        appointment.timepoint_datetime = request.timepoint_datetime;
        appointment.updated_at = Utc::now();
        Ok(self.store.update(appointment).await?)
    }

    /// Asks the facility for an available datetime near the suggestion,
    /// bounded by the visit window and avoiding taken datetimes.
    async fn available_datetime(
        &self,
        request: &AppointmentCreateRequest,
        facility: &dyn FacilityProvider,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        facility
            .available_datetime(
                request.suggested_or_timepoint(),
                request.window,
                &request.taken_datetimes,
            )
            .await
            .map_err(|source| SchedulingError::DateUnavailable { source })
    }
}
