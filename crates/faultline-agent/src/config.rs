//! Agent configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then command line flags and environment variables (applied by the binary
//! through `ListenOverrides`). Nothing is persisted.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use faultline_core::CommandBuilder;

use crate::error::{AgentError, Result};

/// Port agents listen on unless told otherwise
pub const DEFAULT_PORT: u16 = 1666;

// ----------------------------------------------------------------------------
// Agent Configuration
// ----------------------------------------------------------------------------

/// Complete configuration of an agent process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Listening socket
    pub listen: ListenConfig,

    /// Interval between keepalive pings on idle streams (in milliseconds)
    pub keepalive_interval_ms: u64,

    /// Whether reversals are still executed when a driver vanishes mid-session
    pub unwind_on_disconnect: bool,

    /// Programs used to touch host network state
    pub shell: ShellConfig,
}

/// Listening socket configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
}

/// Host programs invoked by the effect applier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// `ip` binary
    pub ip_program: String,
    /// Packet filter binary
    pub iptables_program: String,
    /// Chain partition rules are installed into
    pub chain: String,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ListenOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            keepalive_interval_ms: 1000,
            unwind_on_disconnect: false,
            shell: ShellConfig::default(),
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        let commands = CommandBuilder::default();
        Self {
            ip_program: commands.ip_program,
            iptables_program: commands.iptables_program,
            chain: commands.chain,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AgentConfig {
    /// Load a configuration file; missing keys keep their defaults
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AgentConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command line and environment overrides on top of this config
    pub fn with_overrides(mut self, overrides: ListenOverrides) -> Result<Self> {
        if let Some(host) = overrides.host {
            self.listen.host = host;
        }
        if let Some(port) = overrides.port {
            self.listen.port = port;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.listen.port == 0 {
            return Err(AgentError::Config("listen.port must not be 0".to_string()));
        }
        if self.listen.host.is_empty() {
            return Err(AgentError::Config("listen.host must not be empty".to_string()));
        }
        if self.keepalive_interval_ms == 0 {
            return Err(AgentError::Config(
                "keepalive_interval_ms must be greater than 0".to_string(),
            ));
        }
        for (name, value) in [
            ("shell.ip_program", &self.shell.ip_program),
            ("shell.iptables_program", &self.shell.iptables_program),
            ("shell.chain", &self.shell.chain),
        ] {
            if value.trim().is_empty() {
                return Err(AgentError::Config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }

    /// `host:port` to bind
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.listen.host, self.listen.port)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    /// Command builder for the configured programs
    pub fn command_builder(&self) -> CommandBuilder {
        CommandBuilder::new()
            .with_ip_program(&self.shell.ip_program)
            .with_iptables_program(&self.shell.iptables_program)
            .with_chain(&self.shell.chain)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
