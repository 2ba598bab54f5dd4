//! Fault model
//!
//! A `Fault` is what the driver asks an agent to do to its host. Faults travel
//! over the wire as loosely-typed requests and are only trusted after
//! `Partition::validate` has turned them into a `ValidPartition`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::FaultError;

// ----------------------------------------------------------------------------
// Partition Mode
// ----------------------------------------------------------------------------

/// Filtering behavior of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionMode {
    /// Matching packets are silently discarded
    Drop,
    /// Matching packets are actively refused
    Reject,
}

impl PartitionMode {
    /// Packet-filter target name for this mode
    pub fn target(&self) -> &'static str {
        match self {
            PartitionMode::Drop => "DROP",
            PartitionMode::Reject => "REJECT",
        }
    }
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target())
    }
}

impl FromStr for PartitionMode {
    type Err = FaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err(FaultError::missing("mode")),
            "DROP" | "drop" => Ok(PartitionMode::Drop),
            "REJECT" | "reject" => Ok(PartitionMode::Reject),
            other => Err(FaultError::Validation {
                field: "mode",
                reason: format!("must be DROP or REJECT, got `{}`", other),
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Partition
// ----------------------------------------------------------------------------

/// Request to block inbound traffic from a peer range on one interface
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    /// Host-local identifier of the interface (its peer link index)
    pub interface_ref: String,
    /// Peer address or range to isolate
    pub source_range: String,
    /// Filtering mode, `DROP` or `REJECT`
    pub mode: String,
}

/// A partition whose fields have all been checked
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidPartition {
    pub interface_ref: String,
    pub source_range: String,
    pub mode: PartitionMode,
}

impl Partition {
    /// Build a partition request from typed parts
    pub fn new(
        interface_ref: impl Into<String>,
        source_range: impl Into<String>,
        mode: PartitionMode,
    ) -> Self {
        Self {
            interface_ref: interface_ref.into(),
            source_range: source_range.into(),
            mode: mode.target().to_string(),
        }
    }

    /// Check every field before anything touches the host
    pub fn validate(&self) -> Result<ValidPartition, FaultError> {
        if self.interface_ref.trim().is_empty() {
            return Err(FaultError::missing("interface_ref"));
        }
        if self.source_range.trim().is_empty() {
            return Err(FaultError::missing("source_range"));
        }
        let mode = self.mode.parse::<PartitionMode>()?;

        Ok(ValidPartition {
            interface_ref: self.interface_ref.trim().to_string(),
            source_range: self.source_range.trim().to_string(),
            mode,
        })
    }
}

// ----------------------------------------------------------------------------
// Fault
// ----------------------------------------------------------------------------

/// A disruptive action to apply on a host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Fault {
    Partition(Partition),
}

impl Fault {
    /// Short name of the fault kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Partition(_) => "partition",
        }
    }
}

impl From<Partition> for Fault {
    fn from(partition: Partition) -> Self {
        Fault::Partition(partition)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Partition(p) => write!(
                f,
                "partition(if={}, from={}, mode={})",
                p.interface_ref, p.source_range, p.mode
            ),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
