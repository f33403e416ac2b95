//! Error types for the devquery library

use std::fmt;
use std::io;
use thiserror::Error;

/// Failure reported by a call into the device runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("runtime error {code}: {message}")]
pub struct RuntimeError {
    /// Raw result code returned by the vendor API
    pub code: i32,
    /// Human-readable description of the code
    pub message: String,
}

impl RuntimeError {
    /// Build a runtime error from a result code and its description
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Which version query failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    /// The installed driver version
    Driver,
    /// The linked runtime version
    Runtime,
}

impl fmt::Display for VersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionKind::Driver => write!(f, "driver"),
            VersionKind::Runtime => write!(f, "runtime"),
        }
    }
}

/// Main error type for devquery operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// The device enumeration call itself failed
    #[error("device count query failed: {0}")]
    DeviceCountQueryFailed(RuntimeError),

    /// Enumeration succeeded but no devices are attached
    #[error("No CUDA capable device found")]
    NoDevicesFound,

    /// Driver or runtime version could not be read
    #[error("{which} version query failed: {source}")]
    VersionQueryFailed {
        /// Which version was requested
        which: VersionKind,
        /// Underlying runtime failure
        source: RuntimeError,
    },

    /// Properties of a single device could not be read
    #[error("property query for device {device} failed: {source}")]
    PropertiesQueryFailed {
        /// Device ordinal
        device: i32,
        /// Underlying runtime failure
        source: RuntimeError,
    },

    /// Peer access check between two devices failed
    #[error("peer access query {from} -> {to} failed: {source}")]
    PeerAccessQueryFailed {
        /// Accessing device ordinal
        from: i32,
        /// Accessed device ordinal
        to: i32,
        /// Underlying runtime failure
        source: RuntimeError,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing the report failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for devquery operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Result type for single runtime calls
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_device() {
        let err = QueryError::PropertiesQueryFailed {
            device: 3,
            source: RuntimeError::new(101, "invalid device ordinal"),
        };
        let text = err.to_string();
        assert!(text.contains("device 3"));
        assert!(text.contains("101"));
        assert!(text.contains("invalid device ordinal"));
    }

    #[test]
    fn test_version_kind_display() {
        let err = QueryError::VersionQueryFailed {
            which: VersionKind::Runtime,
            source: RuntimeError::new(35, "insufficient driver"),
        };
        assert!(err.to_string().starts_with("runtime version"));
    }
}
