//! Partition planning
//!
//! Turns "separate group A from group B" into the per-endpoint partition
//! faults that realize it. Planning does no I/O: interface identifiers are
//! resolved beforehand and passed in.

use std::collections::HashMap;

use faultline_core::{Endpoint, Fault, Partition, PartitionMode};

use crate::error::{DriverError, Result};

/// One fault to install on the host of `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultInstall {
    pub target: Endpoint,
    pub fault: Fault,
}

/// Plan a bidirectional partition between `group_a` and `group_b`.
///
/// For every pair `(a, b)` the host of `a` drops traffic from `b` and the host
/// of `b` drops traffic from `a`, so `2·|A|·|B|` installs are returned. All of
/// group A's installs come first, then group B's, each in input order.
///
/// `interfaces` maps `Endpoint::key()` to the host-side interface identifier
/// of that endpoint.
pub fn plan_partition(
    group_a: &[Endpoint],
    group_b: &[Endpoint],
    mode: PartitionMode,
    interfaces: &HashMap<String, String>,
) -> Result<Vec<FaultInstall>> {
    let mut plan = Vec::with_capacity(2 * group_a.len() * group_b.len());
    block_inbound(&mut plan, group_a, group_b, mode, interfaces)?;
    block_inbound(&mut plan, group_b, group_a, mode, interfaces)?;
    Ok(plan)
}

fn block_inbound(
    plan: &mut Vec<FaultInstall>,
    targets: &[Endpoint],
    peers: &[Endpoint],
    mode: PartitionMode,
    interfaces: &HashMap<String, String>,
) -> Result<()> {
    for target in targets {
        if peers.is_empty() {
            continue;
        }
        let interface = interfaces
            .get(&target.key())
            .ok_or_else(|| DriverError::Resolution {
                endpoint: target.key(),
                reason: "interface was not resolved".to_string(),
            })?;

        for peer in peers {
            plan.push(FaultInstall {
                target: target.clone(),
                fault: Fault::from(Partition::new(interface.as_str(), peer.address.as_str(), mode)),
            });
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
