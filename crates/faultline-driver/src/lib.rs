//! Faultline Driver
//!
//! Driver side of the faultline chaos injector. A `FaultSet` turns logical
//! faults (partition two endpoint groups, crash or delete endpoints) into
//! fault requests on per-host agent sessions and tears all of them down
//! together. Cluster access is delegated to the collaborator traits in
//! `cluster`; agent connections are cached process-wide in a
//! `ConnectionPool`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod cluster;
pub mod config;
pub mod error;
pub mod fault_set;
pub mod plan;
pub mod pool;
pub mod report;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use cluster::{endpoint_names, fetch_endpoints, EndpointDirectory, Lifecycle, RemoteExec};
pub use config::{FaultSetConfig, DEFAULT_AGENT_PORT};
pub use error::{DriverError, Result};
pub use fault_set::{DriverContext, FaultSet};
pub use plan::{plan_partition, FaultInstall};
pub use pool::ConnectionPool;
pub use report::{HostTeardown, TeardownReport};
pub use transport::{
    AgentChannel, Dialer, FaultStreamClient, FramedFaultClient, TcpChannel, TcpDialer,
};
