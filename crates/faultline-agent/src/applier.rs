//! Effect applier
//!
//! Translates a fault into host commands, runs them, and hands back the
//! `Reversal` that undoes exactly what was done. The applier holds no state
//! of its own; sessions own the reversals it produces.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use faultline_core::{
    CommandBuilder, Fault, FaultError, Partition, Reversal, ReversalExecutor,
};

use crate::netns::{LinkTableResolver, NamespaceResolver};
use crate::shell::HostShell;

pub struct EffectApplier {
    shell: Arc<dyn HostShell>,
    resolver: Arc<dyn NamespaceResolver>,
    commands: CommandBuilder,
}

impl EffectApplier {
    /// Applier resolving namespaces from the host link table
    pub fn new(shell: Arc<dyn HostShell>, commands: CommandBuilder) -> Self {
        let resolver = Arc::new(LinkTableResolver::new(shell.clone(), commands.clone()));
        Self::with_resolver(shell, resolver, commands)
    }

    pub fn with_resolver(
        shell: Arc<dyn HostShell>,
        resolver: Arc<dyn NamespaceResolver>,
        commands: CommandBuilder,
    ) -> Self {
        Self {
            shell,
            resolver,
            commands,
        }
    }

    /// Apply `fault` to the host and return its reversal.
    ///
    /// Nothing is changed on the host when validation or resolution fails.
    pub async fn apply(&self, fault: &Fault) -> Result<Reversal, FaultError> {
        match fault {
            Fault::Partition(partition) => self.partition(partition).await,
            other => Err(FaultError::Validation {
                field: "fault",
                reason: format!("unsupported fault kind `{}`", other.kind()),
            }),
        }
    }

    /// Execute a reversal previously returned by `apply`
    pub async fn reverse(&self, reversal: &Reversal) -> Result<(), FaultError> {
        match reversal {
            Reversal::DeleteFilterRule { namespace, rule } => {
                info!(namespace = %namespace, source = %rule.source_range, mode = %rule.mode, "removing partition");
                self.shell.run(&self.commands.remove(namespace, rule)).await?;
                Ok(())
            }
        }
    }

    async fn partition(&self, partition: &Partition) -> Result<Reversal, FaultError> {
        let partition = partition.validate()?;
        let namespace = self.resolver.resolve(&partition.interface_ref).await?;
        let rule = self
            .commands
            .inbound_rule(&partition.source_range, partition.mode);

        info!(namespace = %namespace, source = %rule.source_range, mode = %rule.mode, "installing partition");
        self.shell.run(&self.commands.install(&namespace, &rule)).await?;

        Ok(Reversal::DeleteFilterRule { namespace, rule })
    }
}

#[async_trait]
impl ReversalExecutor for EffectApplier {
    async fn execute(&self, reversal: &Reversal) -> Result<(), FaultError> {
        self.reverse(reversal).await
    }
}
