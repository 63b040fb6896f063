//! Structured error handling for wildear
//!
//! A single error enum covers every failure domain of the prediction path so
//! handlers can map each kind to the right HTTP outcome without string matching.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias with WildearError
pub type Result<T> = std::result::Result<T, WildearError>;

/// Main error type for wildear
#[derive(Error, Debug)]
pub enum WildearError {
    /// Configuration errors (bad file, invalid values, label/class mismatch)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Model weight loading errors
    #[error("Model loading error: {message}")]
    ModelLoad {
        message: String,
        path: Option<PathBuf>,
    },

    /// Audio decoding errors (no decode path succeeded)
    #[error("Audio decode error ({operation}): {message}")]
    Decode {
        message: String,
        operation: DecodeOperation,
    },

    /// External transcode step failed
    #[error("Transcode error: {message}")]
    Transcode { message: String },

    /// Feature extraction errors (empty or malformed waveform)
    #[error("Feature extraction error: {message}")]
    Feature { message: String },

    /// Tensor shape mismatch entering the classifier
    #[error("Shape error: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    /// Label set errors
    #[error("Label error: {message}")]
    Label { message: String },

    /// I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
    },

    /// Internal errors (tensor runtime and other unexpected failures)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Decode pipeline stages, used to qualify decode failures in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOperation {
    Probe,
    Codec,
    Packet,
    Resample,
}

impl fmt::Display for DecodeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeOperation::Probe => write!(f, "probe"),
            DecodeOperation::Codec => write!(f, "codec"),
            DecodeOperation::Packet => write!(f, "packet"),
            DecodeOperation::Resample => write!(f, "resample"),
        }
    }
}

impl WildearError {
    /// Shorthand for decode failures
    pub fn decode(operation: DecodeOperation, message: impl Into<String>) -> Self {
        WildearError::Decode {
            message: message.into(),
            operation,
        }
    }

    /// Shorthand for feature failures
    pub fn feature(message: impl Into<String>) -> Self {
        WildearError::Feature {
            message: message.into(),
        }
    }

    /// Shorthand for config failures
    pub fn config(message: impl Into<String>) -> Self {
        WildearError::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Shorthand for internal failures
    pub fn internal(message: impl Into<String>) -> Self {
        WildearError::Internal {
            message: message.into(),
        }
    }

    /// True when the error stems from the submitted audio rather than the
    /// service itself (drives the 4xx vs 5xx split in handlers).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            WildearError::Decode { .. }
                | WildearError::Transcode { .. }
                | WildearError::Feature { .. }
                | WildearError::Shape { .. }
        )
    }
}

impl From<std::io::Error> for WildearError {
    fn from(err: std::io::Error) -> Self {
        WildearError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<candle_core::Error> for WildearError {
    fn from(err: candle_core::Error) -> Self {
        WildearError::Internal {
            message: format!("tensor operation failed: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WildearError::Config {
            message: "label count 7 does not match 23 classes".to_string(),
            path: Some(PathBuf::from("model/labels.json")),
        };
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("label count"));
    }

    #[test]
    fn test_decode_operation_display() {
        assert_eq!(DecodeOperation::Probe.to_string(), "probe");
        assert_eq!(DecodeOperation::Resample.to_string(), "resample");
    }

    #[test]
    fn test_input_error_split() {
        assert!(WildearError::decode(DecodeOperation::Probe, "bad container").is_input_error());
        assert!(WildearError::feature("empty waveform").is_input_error());
        assert!(!WildearError::internal("tensor backend").is_input_error());
        assert!(!WildearError::config("bad yaml").is_input_error());
    }
}
