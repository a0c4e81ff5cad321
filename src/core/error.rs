use thiserror::Error;

/// Reasons a goal configuration is rejected before projection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("allocation must name at least one bucket")]
    EmptyAllocation,

    #[error("allocation cannot include the reserved `{0}` bucket")]
    ReservedBucket(String),

    #[error("allocation share for `{bucket}` must be between 0 and 100, got {share}")]
    ShareOutOfRange { bucket: String, share: f64 },

    #[error("allocation shares must sum to 100, got {sum}")]
    AllocationSum { sum: f64 },

    #[error("missing rate for bucket `{bucket}`")]
    MissingRate { bucket: String },

    #[error("rate for bucket `{bucket}` must be a finite number")]
    NonFiniteRate { bucket: String },
}
