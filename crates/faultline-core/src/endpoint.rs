//! Fault targets as reported by the cluster directory

use core::fmt;

use serde::{Deserialize, Serialize};

/// A running workload instance and the host it runs on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Workload name, unique within its namespace
    pub name: String,
    /// Owning namespace
    pub namespace: String,
    /// Address of the host running the workload (where the agent listens)
    pub host_address: String,
    /// The workload's own address
    pub address: String,
}

impl Endpoint {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        host_address: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            host_address: host_address.into(),
            address: address.into(),
        }
    }

    /// Cluster-unique key, `namespace/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Socket address of the agent on this endpoint's host
    pub fn agent_address(&self, port: u16) -> String {
        if self.host_address.contains(':') && !self.host_address.starts_with('[') {
            format!("[{}]:{}", self.host_address, port)
        } else {
            format!("{}:{}", self.host_address, port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
