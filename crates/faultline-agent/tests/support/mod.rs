//! Test doubles shared by the agent integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use faultline_agent::{EffectApplier, FaultStream, HostShell};
use faultline_core::{CommandBuilder, Fault, FaultError, HostCommand, Partition, PartitionMode};

/// Link table with two pod-side veth peers
pub const LINK_TABLE: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN \\    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00
7: veth7@if3: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1450 qdisc noqueue \\    link/ether 6a:00:00:00:00:07 brd ff:ff:ff:ff:ff:ff link-netns cni-aaaa
9: veth9@if3: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1450 qdisc noqueue \\    link/ether 6a:00:00:00:00:09 brd ff:ff:ff:ff:ff:ff link-netns cni-bbbb
";

/// Shell that answers link lookups and records every mutating command
#[derive(Default)]
pub struct RecordingShell {
    executed: Mutex<Vec<String>>,
    fail_matching: Mutex<Vec<String>>,
}

impl RecordingShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail every mutating command whose text contains `needle`
    pub fn fail_when(&self, needle: &str) {
        self.fail_matching.lock().unwrap().push(needle.to_string());
    }

    /// Mutating commands run so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostShell for RecordingShell {
    async fn run(&self, command: &HostCommand) -> Result<String, FaultError> {
        let text = command.to_string();
        if command.args.first().map(String::as_str) == Some("-o") {
            return Ok(LINK_TABLE.trim().to_string());
        }

        self.executed.lock().unwrap().push(text.clone());
        if self
            .fail_matching
            .lock()
            .unwrap()
            .iter()
            .any(|needle| text.contains(needle.as_str()))
        {
            return Err(FaultError::Apply {
                command: text,
                reason: "iptables: Bad rule".to_string(),
            });
        }
        Ok(String::new())
    }
}

pub fn applier(shell: &Arc<RecordingShell>) -> Arc<EffectApplier> {
    let shell: Arc<dyn HostShell> = shell.clone();
    Arc::new(EffectApplier::new(shell, CommandBuilder::new()))
}

pub fn partition(interface_ref: &str, source_range: &str, mode: PartitionMode) -> Fault {
    Fault::from(Partition::new(interface_ref, source_range, mode))
}

/// One scripted step of a driver stream
pub enum Step {
    Fault(Fault),
    Close,
    Broken,
}

/// Stream replaying a fixed script of requests
pub struct ScriptedStream {
    steps: VecDeque<Step>,
    pub acks: usize,
    fail_acks: bool,
}

impl ScriptedStream {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            acks: 0,
            fail_acks: false,
        }
    }

    pub fn failing_acks(mut self) -> Self {
        self.fail_acks = true;
        self
    }
}

#[async_trait]
impl FaultStream for ScriptedStream {
    async fn next_fault(&mut self) -> Result<Option<Fault>, FaultError> {
        match self.steps.pop_front() {
            Some(Step::Fault(fault)) => Ok(Some(fault)),
            Some(Step::Close) | None => Ok(None),
            Some(Step::Broken) => Err(FaultError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
        }
    }

    async fn ack(&mut self) -> Result<(), FaultError> {
        if self.fail_acks {
            return Err(FaultError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }
        self.acks += 1;
        Ok(())
    }
}
