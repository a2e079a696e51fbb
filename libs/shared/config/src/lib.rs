use std::env;
use tracing::warn;

/// Scheduling configuration surface, loaded from the process environment.
///
/// Values are kept close to the wire here; the appointment-cell parses and
/// validates them into a typed `SchedulingConfig`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppConfig {
    pub allowed_iso_weekdays: String,
    pub use_same_weekday: bool,
    pub appointments_per_day_max: u32,
    pub appointments_days_forward: u32,
    pub default_appointment_type: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            allowed_iso_weekdays: env::var("ALLOWED_ISO_WEEKDAYS")
                .unwrap_or_else(|_| {
                    warn!("ALLOWED_ISO_WEEKDAYS not set, defaulting to Mon-Fri");
                    "12345".to_string()
                }),
            use_same_weekday: env::var("USE_SAME_WEEKDAY")
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or_else(|_| {
                    warn!("USE_SAME_WEEKDAY not set, defaulting to false");
                    false
                }),
            appointments_per_day_max: env::var("APPOINTMENTS_PER_DAY_MAX")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or_else(|| {
                    warn!("APPOINTMENTS_PER_DAY_MAX not set, defaulting to 30");
                    30
                }),
            appointments_days_forward: env::var("APPOINTMENTS_DAYS_FORWARD")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or_else(|| {
                    warn!("APPOINTMENTS_DAYS_FORWARD not set, defaulting to 7");
                    7
                }),
            default_appointment_type: env::var("DEFAULT_APPOINTMENT_TYPE")
                .unwrap_or_else(|_| {
                    warn!("DEFAULT_APPOINTMENT_TYPE not set, defaulting to clinic");
                    "clinic".to_string()
                }),
        };

        if !config.is_configured() {
            warn!("Scheduling not fully configured - check environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.allowed_iso_weekdays.is_empty() && self.appointments_per_day_max >= 1
    }
}
