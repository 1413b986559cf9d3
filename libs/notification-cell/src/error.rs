use thiserror::Error;

use shared_database::BackendError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid user id: {0}")]
    InvalidUser(String),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Backend(e) => e.into(),
            NotificationError::InvalidUser(id) => {
                AppError::BadRequest(format!("User id {} is not a backend user id", id))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}
