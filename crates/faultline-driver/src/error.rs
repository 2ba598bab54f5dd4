//! Error handling for the faultline driver

use faultline_core::RemoteError;
use thiserror::Error;

/// Driver-level error types
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("No endpoints in `{namespace}` match `{selector}`")]
    NoEndpoints { namespace: String, selector: String },

    #[error("Endpoint directory error: {0}")]
    Directory(String),

    #[error("Could not resolve the interface of {endpoint}: {reason}")]
    Resolution { endpoint: String, reason: String },

    #[error("Transport error talking to {host}: {reason}")]
    Transport { host: String, reason: String },

    #[error("Agent {host} refused the fault: {error}")]
    Rejected { host: String, error: RemoteError },

    #[error("Agent {host} could not unwind every fault: {error}")]
    Unwind { host: String, error: RemoteError },

    #[error("Protocol violation from {host}: {reason}")]
    Protocol { host: String, reason: String },

    #[error("{operation} failed for {}", describe(.failures))]
    Lifecycle {
        operation: &'static str,
        failures: Vec<(String, String)>,
    },

    #[error("{} of {total} hosts failed to clean up: {}", .failures.len(), describe(.failures))]
    Teardown {
        total: usize,
        failures: Vec<(String, String)>,
    },
}

impl DriverError {
    pub(crate) fn transport(host: &str, error: impl std::fmt::Display) -> Self {
        DriverError::Transport {
            host: host.to_string(),
            reason: error.to_string(),
        }
    }

    pub(crate) fn protocol(host: &str, reason: impl Into<String>) -> Self {
        DriverError::Protocol {
            host: host.to_string(),
            reason: reason.into(),
        }
    }
}

fn describe(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(who, why)| format!("{} ({})", who, why))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;
