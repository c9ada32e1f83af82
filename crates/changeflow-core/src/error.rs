use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserveError {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Failed to read property {property}: {reason}")]
    PropertyRead { property: String, reason: String },

    #[error("Cycle detected at path: {0}")]
    Cycle(String),

    #[error("Invalid property path: {0:?}")]
    InvalidPath(String),

    #[error("Operation stream already completed")]
    Disposed,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ObserveError>;
