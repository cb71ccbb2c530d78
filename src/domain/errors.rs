use thiserror::Error;

/// Validation errors raised by value-object constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("value must be finite")]
    MustBeFinite,
    #[error("value must be non-negative")]
    MustBeNonNegative,
    #[error("value must be positive")]
    MustBePositive,
}
