pub mod conflict;
pub mod lifecycle;
pub mod scheduler;

pub use conflict::{bookable_times, is_bookable, ConflictResolver};
pub use lifecycle::AppointmentLifecycleService;
pub use scheduler::{derive_service_type, validate_request, AppointmentScheduler};
