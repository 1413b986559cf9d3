use shared_database::BackendError;
use shared_models::error::AppError;

use crate::services::{ProviderNotFound, SlotFormatError, SlotNotFound};

/// Map an availability service failure onto the HTTP error taxonomy.
pub fn availability_error(err: anyhow::Error) -> AppError {
    if let Some(format_err) = err.downcast_ref::<SlotFormatError>() {
        return AppError::ValidationError(format_err.to_string());
    }

    if err.downcast_ref::<ProviderNotFound>().is_some() || err.downcast_ref::<SlotNotFound>().is_some() {
        return AppError::NotFound(err.to_string());
    }

    match err.downcast_ref::<BackendError>() {
        Some(BackendError::Unauthorized(msg)) => AppError::Auth(msg.clone()),
        Some(BackendError::Forbidden(msg)) => AppError::Forbidden(msg.clone()),
        Some(BackendError::SessionExpired(msg)) => AppError::SessionExpired(msg.clone()),
        Some(BackendError::NotFound(msg)) => AppError::NotFound(msg.clone()),
        Some(BackendError::Conflict(msg)) => AppError::Conflict(msg.clone()),
        Some(_) => AppError::ExternalService(format!("{:#}", err)),
        None => AppError::Internal(format!("{:#}", err)),
    }
}
