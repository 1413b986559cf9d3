pub mod availability;
pub mod provider;
pub mod slots;

pub use availability::{AvailabilityService, SlotNotFound};
pub use provider::{ProviderNotFound, ProviderService};
pub use slots::{
    CANONICAL_SLOT_TIMES, SlotFormatError, canonical_slot, is_canonical_slot,
    same_date, to_canonical, to_display_time, validate_date,
};
