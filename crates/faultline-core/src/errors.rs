//! Error types for fault injection
//!
//! `FaultError` carries one variant per failure class a fault can hit on its
//! way from a request to a host-local effect and back out again. `ErrorKind`
//! and `RemoteError` are the serializable projection of it that agents send
//! to the driver.

use core::fmt;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Fault Error
// ----------------------------------------------------------------------------

/// Errors raised while validating, applying, transporting or reversing faults
#[derive(Debug, thiserror::Error)]
pub enum FaultError {
    #[error("Invalid fault: `{field}` {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Could not resolve {what} `{key}`: {reason}")]
    Resolution {
        what: &'static str,
        key: String,
        reason: String,
    },

    #[error("Host command `{command}` failed: {reason}")]
    Apply { command: String, reason: String },

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Stream ended in the middle of a frame ({buffered} bytes buffered)")]
    TruncatedFrame { buffered: usize },

    #[error("Session is no longer open")]
    SessionClosed,

    #[error("{failed} of {attempted} reversals failed; first failure: {first}")]
    Unwind {
        attempted: usize,
        failed: usize,
        first: Box<FaultError>,
    },
}

impl FaultError {
    /// Shorthand for a missing required field
    pub fn missing(field: &'static str) -> Self {
        FaultError::Validation {
            field,
            reason: "not set".to_string(),
        }
    }

    /// Classify this error into its taxonomy bucket
    pub fn kind(&self) -> ErrorKind {
        match self {
            FaultError::Validation { .. } => ErrorKind::Validation,
            FaultError::Resolution { .. } => ErrorKind::Resolution,
            FaultError::Apply { .. } => ErrorKind::Apply,
            FaultError::Io(_)
            | FaultError::Codec(_)
            | FaultError::FrameTooLarge { .. }
            | FaultError::TruncatedFrame { .. }
            | FaultError::SessionClosed => ErrorKind::Transport,
            FaultError::Unwind { .. } => ErrorKind::Unwind,
        }
    }

    /// Whether the error came from the stream rather than from the host
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Project this error into its wire form
    pub fn to_remote(&self) -> RemoteError {
        RemoteError {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Wire Projection
// ----------------------------------------------------------------------------

/// Failure classes shared by agents and drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Resolution,
    Apply,
    Transport,
    Unwind,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Resolution => "resolution",
            ErrorKind::Apply => "apply",
            ErrorKind::Transport => "transport",
            ErrorKind::Unwind => "unwind",
        };
        f.write_str(name)
    }
}

/// An agent-side error as reported over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(FaultError::missing("mode").kind(), ErrorKind::Validation);
        assert_eq!(FaultError::SessionClosed.kind(), ErrorKind::Transport);
        assert!(FaultError::TruncatedFrame { buffered: 3 }.is_transport());

        let unwind = FaultError::Unwind {
            attempted: 2,
            failed: 1,
            first: Box::new(FaultError::Apply {
                command: "iptables".to_string(),
                reason: "boom".to_string(),
            }),
        };
        assert_eq!(unwind.kind(), ErrorKind::Unwind);
        assert!(!unwind.is_transport());
    }

    #[test]
    fn test_remote_projection_keeps_message() {
        let remote = FaultError::missing("interface_ref").to_remote();
        assert_eq!(remote.kind, ErrorKind::Validation);
        assert!(remote.message.contains("interface_ref"));
        assert!(remote.to_string().starts_with("validation error"));
    }
}
