use std::sync::Arc;

use chrono::{DateTime, Days, Timelike, Utc};
use tracing::debug;

use crate::error::SchedulingError;
use crate::models::{AppointmentSeries, SchedulingConfig};
use crate::providers::AppointmentLoadProvider;

/// Redistributes an appointment to a later date when the candidate's day has
/// reached the per-day cap.
pub struct CapacityBalancingService {
    load: Arc<dyn AppointmentLoadProvider>,
}

impl CapacityBalancingService {
    pub fn new(load: Arc<dyn AppointmentLoadProvider>) -> Self {
        Self { load }
    }

    /// Returns the candidate unchanged while its date is below
    /// `appointments_per_day_max`. Otherwise scans the forward window in
    /// chronological order for the first date below the cap and rebinds the
    /// candidate to it, keeping the original hour and minute. Backward
    /// redistribution is out of scope. A fully saturated window is an
    /// explicit error rather than a silently over-capacity date.
    pub async fn balance(
        &self,
        series: &AppointmentSeries,
        candidate: DateTime<Utc>,
        config: &SchedulingConfig,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        let cap = config.appointments_per_day_max;
        let from = candidate.date_naive();
        let to = from + Days::new(u64::from(config.appointments_days_forward));

        // one load snapshot per call, keyed by original timepoint dates
        let counts = self.load.counts_by_date(series, from, to).await?;
        let count_on = |date| counts.get(&date).copied().unwrap_or(0);

        if count_on(from) < cap {
            return Ok(candidate);
        }

        for offset in 1..=u64::from(config.appointments_days_forward) {
            let date = from + Days::new(offset);
            if count_on(date) < cap {
                debug!("Appointment date has been moved to {} (cap {} reached)", date, cap);
                let rebound = date
                    .and_hms_opt(candidate.hour(), candidate.minute(), 0)
                    .unwrap()
                    .and_utc();
                return Ok(rebound);
            }
        }

        Err(SchedulingError::CapacityExceeded { from, to, cap })
    }
}
