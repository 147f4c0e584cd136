use thiserror::Error;

use crate::storage::StorageError;

/// Broad class of a tracking failure, for callers deciding what to surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("request path is missing")]
    MissingPath,
    #[error("duration must not be negative, got {0}")]
    InvalidDuration(i64),
    #[error("page visit {0} not found")]
    VisitNotFound(i64),
    #[error("gallery image {0} not found")]
    ImageNotFound(i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TrackingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackingError::MissingPath | TrackingError::InvalidDuration(_) => ErrorKind::Validation,
            TrackingError::VisitNotFound(_) | TrackingError::ImageNotFound(_) => ErrorKind::NotFound,
            TrackingError::Storage(_) => ErrorKind::Persistence,
        }
    }
}

pub type TrackingResult<T> = Result<T, TrackingError>;
