pub mod rest;

pub use rest::{BackendClient, BackendError};
