//! Cluster collaborators
//!
//! The driver never talks to a cluster control plane itself. Listing
//! endpoints, reading facts from inside an endpoint and terminating endpoints
//! are delegated to the traits below, so any orchestrator (or a test fake)
//! can be plugged in.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::debug;

use faultline_core::Endpoint;

use crate::error::{DriverError, Result};

// ----------------------------------------------------------------------------
// Collaborator Traits
// ----------------------------------------------------------------------------

/// Lists running endpoints
#[async_trait]
pub trait EndpointDirectory: Send + Sync {
    async fn list_endpoints(&self, namespace: &str, selector: &str)
        -> anyhow::Result<Vec<Endpoint>>;
}

/// Runs a read-only command inside an endpoint
#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Execute `argv` and return its trimmed standard output
    async fn exec(&self, endpoint: &Endpoint, argv: &[String]) -> anyhow::Result<String>;
}

/// Terminates endpoints
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Kill immediately, with no grace period
    async fn force_delete(&self, endpoint: &Endpoint) -> anyhow::Result<()>;

    /// Terminate under the default policy
    async fn delete(&self, endpoint: &Endpoint) -> anyhow::Result<()>;
}

// ----------------------------------------------------------------------------
// Endpoint Helpers
// ----------------------------------------------------------------------------

/// List the endpoints matching `selector`, in random order.
///
/// An empty result is an error: a fault aimed at nothing is a mistake in the
/// caller's selector.
pub async fn fetch_endpoints(
    directory: &dyn EndpointDirectory,
    namespace: &str,
    selector: &str,
) -> Result<Vec<Endpoint>> {
    let mut endpoints = directory
        .list_endpoints(namespace, selector)
        .await
        .map_err(|e| DriverError::Directory(format!("{:#}", e)))?;

    if endpoints.is_empty() {
        return Err(DriverError::NoEndpoints {
            namespace: namespace.to_string(),
            selector: selector.to_string(),
        });
    }

    endpoints.shuffle(&mut rand::thread_rng());
    debug!(namespace, selector, count = endpoints.len(), "fetched endpoints");
    Ok(endpoints)
}

/// Names of `endpoints`, for logging
pub fn endpoint_names(endpoints: &[Endpoint]) -> Vec<&str> {
    endpoints.iter().map(|e| e.name.as_str()).collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
