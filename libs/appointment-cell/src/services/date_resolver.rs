// libs/appointment-cell/src/services/date_resolver.rs
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::error::SchedulingError;
use crate::models::SchedulingConfig;
use crate::providers::{HolidayProvider, WindowPeriodValidator};

/// Step size applied while a candidate sits on a holiday. The historical
/// insert path advanced two days at a time, the update path one day; both
/// remain valid choices until domain owners settle on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolidayStep {
    OneDay,
    TwoDays,
}

impl HolidayStep {
    fn days(self) -> i64 {
        match self {
            HolidayStep::OneDay => 1,
            HolidayStep::TwoDays => 2,
        }
    }
}

/// Where the same-weekday enforcement sits in the pipeline: before the
/// allowed-weekday/holiday checks (so the forced weekday is then validated
/// against them) or after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameWeekdayOrder {
    BeforeChecks,
    AfterChecks,
}

/// Explicit pipeline choices for one resolution call. There is deliberately
/// no `Default`: call sites must pick a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPolicy {
    pub holiday_step: HolidayStep,
    pub same_weekday_order: SameWeekdayOrder,
}

impl ResolutionPolicy {
    /// Policy used when inserting a new appointment.
    pub fn for_creation() -> Self {
        Self {
            holiday_step: HolidayStep::TwoDays,
            same_weekday_order: SameWeekdayOrder::BeforeChecks,
        }
    }

    /// Policy used when re-resolving an existing appointment's datetime.
    pub fn for_update() -> Self {
        Self {
            holiday_step: HolidayStep::OneDay,
            same_weekday_order: SameWeekdayOrder::AfterChecks,
        }
    }
}

/// Upper bound on holiday-avoidance iterations. A misconfigured calendar
/// (every allowed weekday adjacent to a holiday) would otherwise loop
/// forever.
const MAX_HOLIDAY_STEPS: u32 = 366;

/// Moves a candidate datetime to the nearest datetime satisfying the
/// allowed-weekday, holiday and same-weekday constraints.
pub struct DateResolutionService {
    holidays: Arc<dyn HolidayProvider>,
}

impl DateResolutionService {
    pub fn new(holidays: Arc<dyn HolidayProvider>) -> Self {
        Self { holidays }
    }

    /// Returns the nearest datetime to `candidate` satisfying the configured
    /// constraints. The holiday calendar is snapshot once per call and never
    /// re-queried mid-loop, so resolution is deterministic for fixed inputs.
    pub async fn resolve(
        &self,
        candidate: DateTime<Utc>,
        config: &SchedulingConfig,
        policy: ResolutionPolicy,
        reference_weekday: Option<u32>,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        config.validate()?;
        let holidays = self.holidays.all_holiday_dates().await?;
        self.resolve_with_snapshot(candidate, config, policy, reference_weekday, &holidays)
    }

    /// Re-checks a user-supplied datetime. The new datetime is resolved
    /// against the configured constraints; if the window validator rejects
    /// the result relative to the best-known datetime, the best-known
    /// datetime is returned unchanged.
    pub async fn change_datetime(
        &self,
        best_datetime: DateTime<Utc>,
        new_datetime: DateTime<Utc>,
        config: &SchedulingConfig,
        policy: ResolutionPolicy,
        window: &dyn WindowPeriodValidator,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        let checked = self.resolve(new_datetime, config, policy, None).await?;
        if window.is_within_window(checked, best_datetime) {
            Ok(checked)
        } else {
            debug!(
                "Requested datetime {} falls outside the visit window, keeping {}",
                checked, best_datetime
            );
            Ok(best_datetime)
        }
    }

    /// Resolves a datetime at `offset` from `base`, forcing the base
    /// datetime's ISO weekday so that a subject's visits stay on one weekday
    /// when so configured.
    pub async fn relative_datetime(
        &self,
        base: DateTime<Utc>,
        offset: Duration,
        config: &SchedulingConfig,
        policy: ResolutionPolicy,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        self.resolve(base + offset, config, policy, Some(iso_weekday(base)))
            .await
    }

    fn resolve_with_snapshot(
        &self,
        candidate: DateTime<Utc>,
        config: &SchedulingConfig,
        policy: ResolutionPolicy,
        reference_weekday: Option<u32>,
        holidays: &HashSet<NaiveDate>,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        let mut appt_datetime = candidate;

        if policy.same_weekday_order == SameWeekdayOrder::BeforeChecks {
            appt_datetime = apply_same_weekday(appt_datetime, config, reference_weekday)?;
        }
        appt_datetime = nearest_allowed_weekday(appt_datetime, &config.allowed_iso_weekdays)?;
        appt_datetime = step_past_holidays(appt_datetime, candidate, config, policy, holidays)?;
        if policy.same_weekday_order == SameWeekdayOrder::AfterChecks {
            appt_datetime = apply_same_weekday(appt_datetime, config, reference_weekday)?;
        }

        if appt_datetime != candidate {
            debug!("Appointment datetime moved from {} to {}", candidate, appt_datetime);
        }
        Ok(appt_datetime)
    }
}

pub(crate) fn iso_weekday(datetime: DateTime<Utc>) -> u32 {
    datetime.weekday().number_from_monday()
}

/// Nearest datetime whose ISO weekday is allowed, searching forward and
/// backward one day at a time. Forward wins a tie.
fn nearest_allowed_weekday(
    candidate: DateTime<Utc>,
    allowed: &BTreeSet<u32>,
) -> Result<DateTime<Utc>, SchedulingError> {
    for offset in 0..7i64 {
        let forward = candidate + Duration::days(offset);
        if allowed.contains(&iso_weekday(forward)) {
            return Ok(forward);
        }
        if offset > 0 {
            let backward = candidate - Duration::days(offset);
            if allowed.contains(&iso_weekday(backward)) {
                return Ok(backward);
            }
        }
    }
    // a non-empty allowed set always matches within 6 days
    Err(SchedulingError::Configuration(
        "allowed_iso_weekdays must not be empty".to_string(),
    ))
}

/// Nearest datetime landing on `weekday` (ISO 1-7). Forward wins a tie.
fn move_to_weekday(
    candidate: DateTime<Utc>,
    weekday: u32,
) -> Result<DateTime<Utc>, SchedulingError> {
    if !(1..=7).contains(&weekday) {
        return Err(SchedulingError::InvalidWeekday(weekday));
    }
    for offset in 0..7i64 {
        let forward = candidate + Duration::days(offset);
        if iso_weekday(forward) == weekday {
            return Ok(forward);
        }
        let backward = candidate - Duration::days(offset);
        if iso_weekday(backward) == weekday {
            return Ok(backward);
        }
    }
    unreachable!("every weekday occurs within six days of any date")
}

fn apply_same_weekday(
    candidate: DateTime<Utc>,
    config: &SchedulingConfig,
    reference_weekday: Option<u32>,
) -> Result<DateTime<Utc>, SchedulingError> {
    match reference_weekday {
        Some(weekday) if config.use_same_weekday => move_to_weekday(candidate, weekday),
        _ => Ok(candidate),
    }
}

/// Advances past holidays by the policy step, re-validating the weekday after
/// each move. Bounded: a calendar whose holidays surround every allowed
/// weekday would otherwise cycle forever.
fn step_past_holidays(
    mut appt_datetime: DateTime<Utc>,
    candidate: DateTime<Utc>,
    config: &SchedulingConfig,
    policy: ResolutionPolicy,
    holidays: &HashSet<NaiveDate>,
) -> Result<DateTime<Utc>, SchedulingError> {
    let mut steps = 0u32;
    while holidays.contains(&appt_datetime.date_naive()) {
        steps += 1;
        if steps > MAX_HOLIDAY_STEPS {
            return Err(SchedulingError::UnresolvableDate {
                candidate,
                max_steps: MAX_HOLIDAY_STEPS,
            });
        }
        appt_datetime += Duration::days(policy.holiday_step.days());
        appt_datetime = nearest_allowed_weekday(appt_datetime, &config.allowed_iso_weekdays)?;
    }
    Ok(appt_datetime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    fn weekdays(days: &[u32]) -> BTreeSet<u32> {
        days.iter().copied().collect()
    }

    #[test]
    fn allowed_weekday_keeps_valid_candidate() {
        // 2024-05-06 is a Monday
        let monday = utc(2024, 5, 6, 10);
        let resolved = nearest_allowed_weekday(monday, &weekdays(&[1, 2, 3, 4, 5])).unwrap();
        assert_eq!(resolved, monday);
    }

    #[test]
    fn backward_wins_when_strictly_closer() {
        // Saturday 2024-05-11: Friday is 1 day back, Monday 2 days forward
        let saturday = utc(2024, 5, 11, 10);
        let resolved = nearest_allowed_weekday(saturday, &weekdays(&[1, 2, 3, 4, 5])).unwrap();
        assert_eq!(resolved, utc(2024, 5, 10, 10));
    }

    #[test]
    fn forward_wins_a_tie() {
        // Wednesday 2024-05-08 with only Tue/Thu allowed: both 1 day away
        let wednesday = utc(2024, 5, 8, 10);
        let resolved = nearest_allowed_weekday(wednesday, &weekdays(&[2, 4])).unwrap();
        assert_eq!(resolved, utc(2024, 5, 9, 10));
    }

    #[test]
    fn move_to_weekday_rejects_out_of_range() {
        assert_matches!(
            move_to_weekday(utc(2024, 5, 6, 10), 0),
            Err(SchedulingError::InvalidWeekday(0))
        );
        assert_matches!(
            move_to_weekday(utc(2024, 5, 6, 10), 8),
            Err(SchedulingError::InvalidWeekday(8))
        );
    }

    #[test]
    fn move_to_weekday_picks_nearest_occurrence() {
        // Thursday 2024-05-09 to Sunday: 3 days forward, 4 back -> forward
        let thursday = utc(2024, 5, 9, 10);
        assert_eq!(move_to_weekday(thursday, 7).unwrap(), utc(2024, 5, 12, 10));
        // Saturday 2024-05-11 to Wednesday: 4 forward, 3 back -> backward
        let saturday = utc(2024, 5, 11, 10);
        assert_eq!(move_to_weekday(saturday, 3).unwrap(), utc(2024, 5, 8, 10));
    }
}
