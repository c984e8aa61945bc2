//! Error types for mediagraph
//!
//! Every fallible operation in the workspace returns [`MediaResult`]. Flow
//! control outcomes that are not failures (an encoder asking for more input,
//! end of stream, two format sets that cannot be merged) are modelled as
//! plain values by the modules that produce them and never show up here.

use thiserror::Error;

/// Main error type for mediagraph operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Invalid argument passed to an operation
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Reason the argument was rejected
        reason: String,
    },

    /// Requested buffer size is negative or too large once padding is added
    #[error("Invalid buffer size {size} (maximum {max})")]
    InvalidSize {
        /// Requested size
        size: i64,
        /// Largest size accepted
        max: i64,
    },

    /// Allocation or other resource limit hit
    #[error("Resource exhausted: {resource}")]
    ResourceExhausted {
        /// Resource that ran out
        resource: String,
    },

    /// A frame was submitted after the end-of-input marker
    #[error("Encoder is draining, no more input accepted")]
    AlreadyDraining,

    /// A frame was submitted while another one is still buffered
    #[error("Input slot is full, pull packets before submitting again")]
    InputFull,

    /// An audio frame does not respect the encoder frame size
    #[error("Frame size violation: {reason}")]
    SizeViolation {
        /// Description of the violation
        reason: String,
    },

    /// Session or allocator configuration is unusable
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Format not supported by the component it was handed to
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// Format description
        format: String,
    },

    /// Codec callback failed
    #[error("Encoding failed: {codec} - {reason}")]
    EncoderFailed {
        /// Codec name
        codec: String,
        /// Failure reason
        reason: String,
    },

    /// Filter graph could not be negotiated
    #[error("Graph build failed on {link}: {reason}")]
    GraphBuild {
        /// Link description, `source -> sink`
        link: String,
        /// Failure reason
        reason: String,
    },

    /// Malformed input data
    #[error("Corrupt input: {reason}")]
    CorruptInput {
        /// Description of the corruption
        reason: String,
    },
}

/// Result type alias for mediagraph operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Shorthand for [`MediaError::InvalidArgument`]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        MediaError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`MediaError::Configuration`]
    pub fn configuration(message: impl Into<String>) -> Self {
        MediaError::Configuration {
            message: message.into(),
        }
    }

    /// Check if error is recoverable
    ///
    /// Recoverable errors leave the component usable: the caller can retry
    /// after changing its input or pulling pending output.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::InputFull => true,
            MediaError::ResourceExhausted { .. } => true,
            MediaError::InvalidArgument { .. } => true,
            MediaError::InvalidSize { .. } => true,
            MediaError::CorruptInput { .. } => true,
            MediaError::AlreadyDraining => false,
            MediaError::SizeViolation { .. } => false,
            MediaError::Configuration { .. } => false,
            MediaError::UnsupportedFormat { .. } => false,
            MediaError::EncoderFailed { .. } => false,
            MediaError::GraphBuild { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::InvalidArgument { .. } => ErrorCategory::Argument,
            MediaError::InvalidSize { .. } => ErrorCategory::Argument,
            MediaError::ResourceExhausted { .. } => ErrorCategory::Memory,
            MediaError::AlreadyDraining => ErrorCategory::State,
            MediaError::InputFull => ErrorCategory::State,
            MediaError::SizeViolation { .. } => ErrorCategory::Argument,
            MediaError::Configuration { .. } => ErrorCategory::Configuration,
            MediaError::UnsupportedFormat { .. } => ErrorCategory::Format,
            MediaError::EncoderFailed { .. } => ErrorCategory::Codec,
            MediaError::GraphBuild { .. } => ErrorCategory::Negotiation,
            MediaError::CorruptInput { .. } => ErrorCategory::Data,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad parameters handed to an operation
    Argument,
    /// Configuration and parameter errors
    Configuration,
    /// Codec-related errors
    Codec,
    /// Format and data structure errors
    Format,
    /// Format negotiation failures
    Negotiation,
    /// Data validation errors
    Data,
    /// State management errors
    State,
    /// Memory management errors
    Memory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let full = MediaError::InputFull;
        assert_eq!(full.category(), ErrorCategory::State);
        assert!(full.is_recoverable());

        let draining = MediaError::AlreadyDraining;
        assert_eq!(draining.category(), ErrorCategory::State);
        assert!(!draining.is_recoverable());

        let build = MediaError::GraphBuild {
            link: "src -> sink".to_string(),
            reason: "no conversion for subtitle".to_string(),
        };
        assert_eq!(build.category(), ErrorCategory::Negotiation);
        assert!(!build.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = MediaError::InvalidSize {
            size: -1,
            max: i32::MAX as i64 - 64,
        };
        assert_eq!(
            error.to_string(),
            "Invalid buffer size -1 (maximum 2147483583)"
        );

        let error = MediaError::GraphBuild {
            link: "in -> out".to_string(),
            reason: "cannot select sample rate".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Graph build failed on in -> out: cannot select sample rate"
        );
    }

    #[test]
    fn test_error_helpers() {
        assert_eq!(
            MediaError::invalid_argument("bad"),
            MediaError::InvalidArgument {
                reason: "bad".to_string()
            }
        );
        assert_eq!(
            MediaError::configuration("bad").category(),
            ErrorCategory::Configuration
        );
    }
}
