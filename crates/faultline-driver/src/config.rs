//! Fault set configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port the agents listen on by default
pub const DEFAULT_AGENT_PORT: u16 = 1666;

/// Settings shared by every operation of a `FaultSet`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultSetConfig {
    /// Port of the agent on every host
    pub agent_port: u16,

    /// Interface inside each endpoint whose peer link index is read
    pub interface: String,

    /// Deadline for dialing an agent and completing its handshake (in milliseconds)
    pub connect_timeout_ms: u64,
}

impl Default for FaultSetConfig {
    fn default() -> Self {
        Self {
            agent_port: DEFAULT_AGENT_PORT,
            interface: "eth0".to_string(),
            connect_timeout_ms: 5000,
        }
    }
}

impl FaultSetConfig {
    pub fn with_agent_port(mut self, port: u16) -> Self {
        self.agent_port = port;
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Command run inside an endpoint to read the host-side index of its interface
    pub fn iflink_argv(&self) -> Vec<String> {
        vec![
            "cat".to_string(),
            format!("/sys/class/net/{}/iflink", self.interface),
        ]
    }
}
