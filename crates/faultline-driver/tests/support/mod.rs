//! Test doubles shared by the driver integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use faultline_core::{Endpoint, ErrorKind, Fault, RemoteError};
use faultline_driver::{
    AgentChannel, ConnectionPool, Dialer, DriverContext, DriverError, FaultSet, FaultSetConfig,
    FaultStreamClient, Lifecycle, RemoteExec, Result,
};

// ----------------------------------------------------------------------------
// Fake Agents
// ----------------------------------------------------------------------------

/// Every agent the fake dialer can reach, and what happened to them
#[derive(Default)]
pub struct FakeAgents {
    pub dials: AtomicUsize,
    pub opens: AtomicUsize,
    installs: Mutex<Vec<(String, Fault)>>,
    closes: Mutex<Vec<String>>,
    failing_unwinds: Mutex<HashSet<String>>,
    refused_sources: Mutex<HashSet<String>>,
}

impl FakeAgents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Agent at `host` reports an unwind failure on close
    pub fn fail_unwind_on(&self, host: &str) {
        self.failing_unwinds.lock().unwrap().insert(host.to_string());
    }

    /// Agents refuse partitions isolating `source`
    pub fn refuse_source(&self, source: &str) {
        self.refused_sources.lock().unwrap().insert(source.to_string());
    }

    /// Acknowledged installs, in order
    pub fn installs(&self) -> Vec<(String, Fault)> {
        self.installs.lock().unwrap().clone()
    }

    pub fn closes(&self) -> Vec<String> {
        self.closes.lock().unwrap().clone()
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

pub struct FakeDialer(pub Arc<FakeAgents>);

#[async_trait]
impl Dialer for FakeDialer {
    async fn dial(&self, address: &str) -> Result<Arc<dyn AgentChannel>> {
        self.0.dials.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeChannel {
            address: address.to_string(),
            agents: Arc::clone(&self.0),
        }))
    }
}

struct FakeChannel {
    address: String,
    agents: Arc<FakeAgents>,
}

#[async_trait]
impl AgentChannel for FakeChannel {
    async fn open_stream(&self) -> Result<Box<dyn FaultStreamClient>> {
        self.agents.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            host: self.address.clone(),
            agents: Arc::clone(&self.agents),
        }))
    }
}

struct FakeStream {
    host: String,
    agents: Arc<FakeAgents>,
}

#[async_trait]
impl FaultStreamClient for FakeStream {
    fn host(&self) -> &str {
        &self.host
    }

    async fn apply_fault(&mut self, fault: &Fault) -> Result<()> {
        if let Fault::Partition(partition) = fault {
            if self
                .agents
                .refused_sources
                .lock()
                .unwrap()
                .contains(&partition.source_range)
            {
                return Err(DriverError::Rejected {
                    host: self.host.clone(),
                    error: RemoteError {
                        kind: ErrorKind::Apply,
                        message: "iptables: Bad rule".to_string(),
                    },
                });
            }
        }
        self.agents
            .installs
            .lock()
            .unwrap()
            .push((self.host.clone(), fault.clone()));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.agents.closes.lock().unwrap().push(self.host.clone());
        if self.agents.failing_unwinds.lock().unwrap().contains(&self.host) {
            return Err(DriverError::Unwind {
                host: self.host.clone(),
                error: RemoteError {
                    kind: ErrorKind::Unwind,
                    message: "1 of 1 reversals failed".to_string(),
                },
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Fake Cluster
// ----------------------------------------------------------------------------

/// Answers interface lookups from a table keyed by endpoint name
#[derive(Default)]
pub struct FakeExec {
    iflinks: HashMap<String, String>,
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeExec {
    pub fn new(iflinks: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            iflinks: iflinks
                .iter()
                .map(|(name, index)| (name.to_string(), index.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteExec for FakeExec {
    async fn exec(&self, endpoint: &Endpoint, argv: &[String]) -> anyhow::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.name.clone(), argv.to_vec()));
        match self.iflinks.get(&endpoint.name) {
            Some(index) => Ok(index.clone()),
            None => anyhow::bail!("cat: /sys/class/net/eth0/iflink: No such file or directory"),
        }
    }
}

/// Records lifecycle calls; fails for configured endpoint names
#[derive(Default)]
pub struct FakeLifecycle {
    failing: HashSet<String>,
    pub calls: Mutex<Vec<(&'static str, String)>>,
}

impl FakeLifecycle {
    pub fn failing(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, endpoint: &Endpoint) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((operation, endpoint.name.clone()));
        if self.failing.contains(&endpoint.name) {
            anyhow::bail!("pods \"{}\" is forbidden", endpoint.name);
        }
        Ok(())
    }
}

#[async_trait]
impl Lifecycle for FakeLifecycle {
    async fn force_delete(&self, endpoint: &Endpoint) -> anyhow::Result<()> {
        self.record("force_delete", endpoint)
    }

    async fn delete(&self, endpoint: &Endpoint) -> anyhow::Result<()> {
        self.record("delete", endpoint)
    }
}

// ----------------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------------

pub fn endpoint(name: &str, host: &str, address: &str) -> Endpoint {
    Endpoint::new(name, "chaos", host, address)
}

pub fn fault_set(
    agents: &Arc<FakeAgents>,
    exec: &Arc<FakeExec>,
    lifecycle: &Arc<FakeLifecycle>,
) -> FaultSet {
    let pool = Arc::new(ConnectionPool::new(Arc::new(FakeDialer(Arc::clone(agents)))));
    let exec: Arc<dyn RemoteExec> = exec.clone();
    let lifecycle: Arc<dyn Lifecycle> = lifecycle.clone();
    FaultSet::new(DriverContext::new(pool, exec, lifecycle).with_config(FaultSetConfig::default()))
}

/// `(host, interface_ref, source_range, mode)` of an install
pub fn describe(install: &(String, Fault)) -> (String, String, String, String) {
    match &install.1 {
        Fault::Partition(p) => (
            install.0.clone(),
            p.interface_ref.clone(),
            p.source_range.clone(),
            p.mode.clone(),
        ),
        other => panic!("unexpected fault {:?}", other),
    }
}
