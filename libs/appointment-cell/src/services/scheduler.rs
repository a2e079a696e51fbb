use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::SchedulingError;
use crate::models::{AppointmentSeries, SchedulingConfig};
use crate::providers::{AppointmentLoadProvider, HolidayProvider, WindowPeriodValidator};
use crate::services::capacity::CapacityBalancingService;
use crate::services::date_resolver::{DateResolutionService, ResolutionPolicy};

/// Full date-selection chain for one appointment: weekday and holiday
/// constraints first, then per-day capacity redistribution.
pub struct AppointmentDateService {
    resolver: DateResolutionService,
    balancer: CapacityBalancingService,
}

impl AppointmentDateService {
    pub fn new(holidays: Arc<dyn HolidayProvider>, load: Arc<dyn AppointmentLoadProvider>) -> Self {
        Self {
            resolver: DateResolutionService::new(holidays),
            balancer: CapacityBalancingService::new(load),
        }
    }

    /// Best datetime for a visit: resolves the constraint pipeline, then
    /// moves the result off any date that has reached the daily cap.
    pub async fn best_datetime(
        &self,
        series: &AppointmentSeries,
        candidate: DateTime<Utc>,
        config: &SchedulingConfig,
        policy: ResolutionPolicy,
        reference_weekday: Option<u32>,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        let resolved = self
            .resolver
            .resolve(candidate, config, policy, reference_weekday)
            .await?;
        self.balancer.balance(series, resolved, config).await
    }

    /// Checks a user-supplied datetime change, falling back to the best-known
    /// datetime when the visit window rejects it, then rebalances capacity.
    pub async fn change_datetime(
        &self,
        series: &AppointmentSeries,
        best_datetime: DateTime<Utc>,
        new_datetime: DateTime<Utc>,
        config: &SchedulingConfig,
        policy: ResolutionPolicy,
        window: &dyn WindowPeriodValidator,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        let accepted = self
            .resolver
            .change_datetime(best_datetime, new_datetime, config, policy, window)
            .await?;
        self.balancer.balance(series, accepted, config).await
    }

    pub fn resolver(&self) -> &DateResolutionService {
        &self.resolver
    }

    pub fn balancer(&self) -> &CapacityBalancingService {
        &self.balancer
    }
}
