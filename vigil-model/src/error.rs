use thiserror::Error;

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid clock time `{0}` (expected HH:MM)")]
    InvalidClockTime(String),

    #[error("invalid tag category `{0}`")]
    InvalidCategory(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
