//! Backend error types

use thiserror::Error;

/// Errors a backend plugin surfaces to the site agent
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("Resource creation failed: {0}")]
    CreationFailed(String),

    #[error("Backend operation failed: {0}")]
    OperationFailed(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;
