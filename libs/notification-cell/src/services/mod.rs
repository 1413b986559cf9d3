pub mod event_bus;
pub mod poller;

pub use event_bus::*;
pub use poller::*;
