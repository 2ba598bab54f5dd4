//! Host command builder
//!
//! Every host-local effect is expressed as a `HostCommand` (an argv, never a
//! shell string) built here, so installs and their reversals can be checked
//! without touching the operating system.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::fault::PartitionMode;

// ----------------------------------------------------------------------------
// Host Command
// ----------------------------------------------------------------------------

/// A program and its arguments, executed without a shell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argv, program first
    pub fn argv(&self) -> Vec<&str> {
        core::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

// ----------------------------------------------------------------------------
// Filter Rules
// ----------------------------------------------------------------------------

/// Whether a rule is being added to or removed from its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleOp {
    Append,
    Delete,
}

impl RuleOp {
    fn flag(&self) -> &'static str {
        match self {
            RuleOp::Append => "-A",
            RuleOp::Delete => "-D",
        }
    }
}

/// Match criteria and action of one packet-filter rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterRule {
    /// Chain the rule lives in
    pub chain: String,
    /// Source address or range matched by the rule
    pub source_range: String,
    /// Action applied to matching packets
    pub mode: PartitionMode,
}

impl FilterRule {
    /// Rule arguments for `op`; append and delete differ only in the op flag
    pub fn iptables_args(&self, op: RuleOp) -> Vec<String> {
        vec![
            op.flag().to_string(),
            self.chain.clone(),
            "--source".to_string(),
            self.source_range.clone(),
            "-j".to_string(),
            self.mode.target().to_string(),
        ]
    }
}

// ----------------------------------------------------------------------------
// Command Builder
// ----------------------------------------------------------------------------

/// Builds the host commands used to apply and reverse partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBuilder {
    /// `ip` binary, used for namespace lookups and `netns exec`
    pub ip_program: String,
    /// Packet filter binary
    pub iptables_program: String,
    /// Chain inbound partition rules are installed into
    pub chain: String,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self {
            ip_program: "ip".to_string(),
            iptables_program: "iptables".to_string(),
            chain: "INPUT".to_string(),
        }
    }
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `ip` program
    pub fn with_ip_program(mut self, program: impl Into<String>) -> Self {
        self.ip_program = program.into();
        self
    }

    /// Set the packet filter program
    pub fn with_iptables_program(mut self, program: impl Into<String>) -> Self {
        self.iptables_program = program.into();
        self
    }

    /// Set the chain rules are installed into
    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = chain.into();
        self
    }

    /// Inbound rule matching `source_range` with `mode`'s action
    pub fn inbound_rule(&self, source_range: &str, mode: PartitionMode) -> FilterRule {
        FilterRule {
            chain: self.chain.clone(),
            source_range: source_range.to_string(),
            mode,
        }
    }

    /// Command listing every link on the host, one per line
    pub fn list_links(&self) -> HostCommand {
        HostCommand::new(&self.ip_program).args(["-o", "link", "show"])
    }

    /// Command installing `rule` inside `namespace`
    pub fn install(&self, namespace: &str, rule: &FilterRule) -> HostCommand {
        self.in_namespace(namespace, rule, RuleOp::Append)
    }

    /// Command deleting exactly the rule `install` created
    pub fn remove(&self, namespace: &str, rule: &FilterRule) -> HostCommand {
        self.in_namespace(namespace, rule, RuleOp::Delete)
    }

    fn in_namespace(&self, namespace: &str, rule: &FilterRule, op: RuleOp) -> HostCommand {
        HostCommand::new(&self.ip_program)
            .args(["netns", "exec", namespace])
            .arg(&self.iptables_program)
            .args(rule.iptables_args(op))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
