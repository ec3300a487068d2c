use thiserror::Error;

/// Main error type for the PhaseScan system
#[derive(Error, Debug)]
pub enum PsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for PhaseScan operations
pub type PsResult<T> = Result<T, PsError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::PsError::Config(format!($($arg)*))
    };
}

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::PsError::Validation(format!($($arg)*))
    };
}
