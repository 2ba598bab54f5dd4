//! Faultline Core
//!
//! Shared vocabulary of the faultline chaos injector: the fault model and its
//! validation, the host command builder for filtering rules, the reversal
//! values and undo stack that guarantee rollback, and the framed wire
//! protocol spoken between the driver and the per-host agents.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod command;
pub mod endpoint;
pub mod errors;
pub mod fault;
pub mod reversal;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use command::{CommandBuilder, FilterRule, HostCommand, RuleOp};
pub use endpoint::Endpoint;
pub use errors::{ErrorKind, FaultError, RemoteError};
pub use fault::{Fault, Partition, PartitionMode, ValidPartition};
pub use reversal::{Reversal, ReversalExecutor, UndoStack};
pub use wire::{AgentFrame, DriverFrame, FrameReader, PROTOCOL_VERSION};

/// Result type used across the core crate
pub type Result<T> = core::result::Result<T, FaultError>;
