//! Core error types for the feedback effect.

/// A specialized Result type for feedback operations.
pub type FeedbackResult<T> = Result<T, FeedbackError>;

/// Error type shared by every feedback crate.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    /// A texture, material or command could not be created (typically out of GPU memory).
    #[error("resource allocation failed: {0}")]
    ResourceAllocation(String),

    /// The named blend program could not be resolved.
    #[error("blend program not found: {0}")]
    MissingBlendProgram(String),

    #[error("invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    /// A recorded command was executed against a texture other than the one it was recorded with.
    #[error("stale render command: recorded against texture {recorded}, executed with {current}")]
    StaleCommand { recorded: u64, current: u64 },

    #[error("invalid parameter {name}: {value} outside [{min}, {max}]")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("device error: {0}")]
    Device(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedbackError {
    /// Whether the error must disable the effect instance.
    ///
    /// Only allocation failures and unresolved blend programs are fatal; every
    /// other error degrades a single frame to passthrough.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FeedbackError::ResourceAllocation(_) | FeedbackError::MissingBlendProgram(_)
        )
    }

    /// Create an allocation error.
    pub fn allocation(message: impl Into<String>) -> Self {
        FeedbackError::ResourceAllocation(message.into())
    }

    /// Create a device error.
    pub fn device(message: impl Into<String>) -> Self {
        FeedbackError::Device(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(FeedbackError::allocation("out of memory").is_fatal());
        assert!(FeedbackError::MissingBlendProgram("feedback".into()).is_fatal());
        assert!(!FeedbackError::InvalidDimensions(0, 10).is_fatal());
        assert!(!FeedbackError::device("lost").is_fatal());
        assert!(!FeedbackError::StaleCommand { recorded: 1, current: 2 }.is_fatal());
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = FeedbackError::InvalidParameter {
            name: "scale",
            value: 2.0,
            min: 0.95,
            max: 1.05,
        };
        assert_eq!(
            err.to_string(),
            "invalid parameter scale: 2 outside [0.95, 1.05]"
        );
    }
}
