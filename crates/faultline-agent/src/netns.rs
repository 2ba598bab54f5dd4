//! Interface to network namespace resolution
//!
//! A workload reports the index of the host-side peer of its interface. The
//! host link table names the namespace on the other end of that link, which
//! is where its filtering rules have to go.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use faultline_core::{CommandBuilder, FaultError};

use crate::shell::HostShell;

/// Resolves an interface reference to the namespace that owns it
#[async_trait]
pub trait NamespaceResolver: Send + Sync {
    async fn resolve(&self, interface_ref: &str) -> Result<String, FaultError>;
}

/// Resolver reading the host link table through `ip -o link show`
pub struct LinkTableResolver {
    shell: Arc<dyn HostShell>,
    commands: CommandBuilder,
}

impl LinkTableResolver {
    pub fn new(shell: Arc<dyn HostShell>, commands: CommandBuilder) -> Self {
        Self { shell, commands }
    }
}

#[async_trait]
impl NamespaceResolver for LinkTableResolver {
    async fn resolve(&self, interface_ref: &str) -> Result<String, FaultError> {
        let table = self
            .shell
            .run(&self.commands.list_links())
            .await
            .map_err(|e| FaultError::Resolution {
                what: "interface",
                key: interface_ref.to_string(),
                reason: e.to_string(),
            })?;

        let namespace = find_link_netns(&table, interface_ref).ok_or_else(|| {
            FaultError::Resolution {
                what: "interface",
                key: interface_ref.to_string(),
                reason: "no link with a peer namespace has this index".to_string(),
            }
        })?;

        debug!(interface_ref, namespace, "resolved network namespace");
        Ok(namespace.to_string())
    }
}

/// Find the `link-netns` of the link with index `ifindex` in one-line-per-link
/// `ip -o link show` output.
pub fn find_link_netns<'a>(table: &'a str, ifindex: &str) -> Option<&'a str> {
    table
        .lines()
        .filter(|line| {
            line.split_once(':')
                .map(|(index, _)| index.trim() == ifindex)
                .unwrap_or(false)
        })
        .find_map(|line| {
            let mut tokens = line.split_whitespace();
            tokens.find(|t| *t == "link-netns")?;
            tokens.next()
        })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
