pub mod error;
pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::*;
pub use services::*;
pub use error::availability_error;
pub use router::availability_routes;
