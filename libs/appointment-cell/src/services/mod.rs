pub mod capacity;
pub mod creator;
pub mod date_resolver;
pub mod scheduler;

pub use capacity::CapacityBalancingService;
pub use creator::AppointmentCreationService;
pub use date_resolver::{
    DateResolutionService, HolidayStep, ResolutionPolicy, SameWeekdayOrder,
};
pub use scheduler::AppointmentDateService;
