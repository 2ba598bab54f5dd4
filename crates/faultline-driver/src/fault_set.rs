//! Fault set orchestrator
//!
//! A `FaultSet` is the client-facing handle for one experiment. It turns
//! logical faults into per-host fault requests, keeps one open session per
//! agent host, and closes all of them together in `remove_all`.
//!
//! Installs are issued one at a time and each waits for its acknowledgement.
//! Any failure aborts the logical operation. Faults already installed on
//! other hosts stay installed until `remove_all`. A host that refuses a fault
//! unwinds its whole session on its own right away; `remove_all` then only
//! collects that unwind's outcome.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use faultline_core::{Endpoint, Fault, PartitionMode};

use crate::cluster::{endpoint_names, Lifecycle, RemoteExec};
use crate::config::FaultSetConfig;
use crate::error::{DriverError, Result};
use crate::plan::plan_partition;
use crate::pool::ConnectionPool;
use crate::report::{HostTeardown, TeardownReport};
use crate::transport::FaultStreamClient;

// ----------------------------------------------------------------------------
// Driver Context
// ----------------------------------------------------------------------------

/// Shared collaborators of every fault set in a process
#[derive(Clone)]
pub struct DriverContext {
    pub pool: Arc<ConnectionPool>,
    pub exec: Arc<dyn RemoteExec>,
    pub lifecycle: Arc<dyn Lifecycle>,
    pub config: FaultSetConfig,
}

impl DriverContext {
    pub fn new(
        pool: Arc<ConnectionPool>,
        exec: Arc<dyn RemoteExec>,
        lifecycle: Arc<dyn Lifecycle>,
    ) -> Self {
        Self {
            pool,
            exec,
            lifecycle,
            config: FaultSetConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FaultSetConfig) -> Self {
        self.config = config;
        self
    }
}

// ----------------------------------------------------------------------------
// Fault Set
// ----------------------------------------------------------------------------

pub struct FaultSet {
    ctx: DriverContext,
    /// Open sessions keyed by agent address
    sessions: BTreeMap<String, Box<dyn FaultStreamClient>>,
}

impl FaultSet {
    pub fn new(ctx: DriverContext) -> Self {
        Self {
            ctx,
            sessions: BTreeMap::new(),
        }
    }

    /// Agent addresses with an open session, sorted
    pub fn hosts(&self) -> Vec<&str> {
        self.sessions.keys().map(String::as_str).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Isolate `group_a` from `group_b` in both directions.
    ///
    /// Costs one interface lookup per distinct endpoint and `2·|A|·|B|`
    /// installs, so keep groups small.
    pub async fn partition(
        &mut self,
        group_a: &[Endpoint],
        group_b: &[Endpoint],
        mode: PartitionMode,
    ) -> Result<()> {
        info!(
            group_a = ?endpoint_names(group_a),
            group_b = ?endpoint_names(group_b),
            %mode,
            "partitioning"
        );

        let interfaces = self
            .resolve_interfaces(group_a.iter().chain(group_b))
            .await?;
        let plan = plan_partition(group_a, group_b, mode, &interfaces)?;
        debug!(installs = plan.len(), "partition planned");

        for install in plan {
            self.install(&install.target, install.fault).await?;
        }
        Ok(())
    }

    /// Kill `endpoints` immediately. Not reversible.
    pub async fn crash(&self, endpoints: &[Endpoint]) -> Result<()> {
        info!(endpoints = ?endpoint_names(endpoints), "crashing");

        let mut failures = Vec::new();
        for endpoint in endpoints {
            if let Err(e) = self.ctx.lifecycle.force_delete(endpoint).await {
                warn!(endpoint = %endpoint.key(), error = %e, "crash failed");
                failures.push((endpoint.key(), format!("{:#}", e)));
            }
        }
        lifecycle_result("crash", failures)
    }

    /// Terminate `endpoints` gracefully. Not reversible.
    pub async fn delete(&self, endpoints: &[Endpoint]) -> Result<()> {
        info!(endpoints = ?endpoint_names(endpoints), "deleting");

        let mut failures = Vec::new();
        for endpoint in endpoints {
            if let Err(e) = self.ctx.lifecycle.delete(endpoint).await {
                warn!(endpoint = %endpoint.key(), error = %e, "delete failed");
                failures.push((endpoint.key(), format!("{:#}", e)));
            }
        }
        lifecycle_result("delete", failures)
    }

    /// Install one fault on the host of `target` and wait for the ack.
    ///
    /// The session for that host is opened on first use and reused after.
    pub async fn install(&mut self, target: &Endpoint, fault: Fault) -> Result<()> {
        let address = target.agent_address(self.ctx.config.agent_port);

        let session = match self.sessions.entry(address) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let channel = self.ctx.pool.get(entry.key()).await?;
                let stream = channel.open_stream().await?;
                debug!(host = %entry.key(), "opened fault session");
                entry.insert(stream)
            }
        };

        session.apply_fault(&fault).await?;
        debug!(host = %session.host(), target = %target, %fault, "fault installed");
        Ok(())
    }

    /// Close every open session and wait for each agent to unwind.
    ///
    /// Every session is closed even when some fail. The registry is empty
    /// afterwards, so a second call reports nothing.
    pub async fn remove_all(&mut self) -> TeardownReport {
        let sessions = mem::take(&mut self.sessions);
        info!(hosts = sessions.len(), "removing all faults");

        let teardowns = sessions.into_iter().map(|(host, mut session)| async move {
            let outcome = session.close().await;
            if let Err(e) = &outcome {
                warn!(%host, error = %e, "host failed to clean up");
            }
            HostTeardown { host, outcome }
        });

        TeardownReport::new(join_all(teardowns).await)
    }

    async fn resolve_interfaces<'a, I>(&self, endpoints: I) -> Result<HashMap<String, String>>
    where
        I: IntoIterator<Item = &'a Endpoint>,
    {
        let argv = self.ctx.config.iflink_argv();
        let mut interfaces = HashMap::new();

        for endpoint in endpoints {
            let key = endpoint.key();
            if interfaces.contains_key(&key) {
                continue;
            }

            let output = self
                .ctx
                .exec
                .exec(endpoint, &argv)
                .await
                .map_err(|e| DriverError::Resolution {
                    endpoint: key.clone(),
                    reason: format!("{:#}", e),
                })?;
            let interface = output.trim();
            if interface.is_empty() {
                return Err(DriverError::Resolution {
                    endpoint: key,
                    reason: format!("`{}` printed nothing", argv.join(" ")),
                });
            }

            debug!(endpoint = %key, interface, "resolved interface");
            interfaces.insert(key, interface.to_string());
        }
        Ok(interfaces)
    }
}

impl Drop for FaultSet {
    fn drop(&mut self) {
        if !self.sessions.is_empty() {
            warn!(
                hosts = ?self.hosts(),
                "fault set dropped with open sessions; agents only see a disconnect"
            );
        }
    }
}

fn lifecycle_result(operation: &'static str, failures: Vec<(String, String)>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(DriverError::Lifecycle {
            operation,
            failures,
        })
    }
}
