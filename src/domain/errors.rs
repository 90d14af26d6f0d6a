use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Referenced {0} was not found")]
    ReferenceNotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Invalid time window: {0}")]
    InvalidWindow(String),
    #[error("Store deadline exceeded")]
    Timeout,
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("No {0} records to page through")]
    EmptyCatalog(String),
}

impl DomainError {
    /// Stable name of the error kind, surfaced to clients next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "NotFound",
            DomainError::ReferenceNotFound(_) => "ReferenceNotFound",
            DomainError::Validation(_) => "ValidationError",
            DomainError::InvalidWindow(_) => "InvalidWindow",
            DomainError::Timeout => "Timeout",
            DomainError::StoreUnavailable(_) => "StoreUnavailable",
            DomainError::EmptyCatalog(_) => "EmptyCatalog",
        }
    }
}
