//! Connection pool
//!
//! Process-wide cache of agent channels keyed by host address. Channels are
//! dialed lazily on first use and are never evicted; the number of entries is
//! bounded by the number of hosts in the cluster.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::transport::{AgentChannel, Dialer, TcpDialer};

pub struct ConnectionPool {
    dialer: Arc<dyn Dialer>,
    channels: DashMap<String, Arc<dyn AgentChannel>>,
}

impl ConnectionPool {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self {
            dialer,
            channels: DashMap::new(),
        }
    }

    /// Pool dialing agents over TCP
    pub fn tcp(connect_timeout: std::time::Duration) -> Self {
        Self::new(Arc::new(TcpDialer::new(connect_timeout)))
    }

    /// Channel for `address`, dialing it on first use.
    ///
    /// The map is not locked while dialing, so two callers racing on a new
    /// address may both dial; the later insert wins and the other channel is
    /// dropped once its caller is done with it.
    pub async fn get(&self, address: &str) -> Result<Arc<dyn AgentChannel>> {
        let cached = self
            .channels
            .get(address)
            .map(|entry| Arc::clone(entry.value()));
        if let Some(channel) = cached {
            return Ok(channel);
        }

        let channel = self.dialer.dial(address).await?;
        debug!(address, "caching agent channel");
        self.channels
            .insert(address.to_string(), Arc::clone(&channel));
        Ok(channel)
    }

    /// Number of cached channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use crate::transport::FaultStreamClient;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullChannel(String);

    #[async_trait]
    impl AgentChannel for NullChannel {
        async fn open_stream(&self) -> Result<Box<dyn FaultStreamClient>> {
            Err(DriverError::transport(&self.0, "not connected"))
        }
    }

    #[derive(Default)]
    struct CountingDialer {
        dials: AtomicUsize,
    }

    #[async_trait]
    impl Dialer for CountingDialer {
        async fn dial(&self, address: &str) -> Result<Arc<dyn AgentChannel>> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            if address.starts_with("unreachable") {
                return Err(DriverError::transport(address, "no route to host"));
            }
            Ok(Arc::new(NullChannel(address.to_string())))
        }
    }

    #[tokio::test]
    async fn test_channel_is_dialed_once_per_address() {
        let dialer = Arc::new(CountingDialer::default());
        let pool = ConnectionPool::new(dialer.clone());

        let first = pool.get("10.1.0.1:1666").await.unwrap();
        let second = pool.get("10.1.0.1:1666").await.unwrap();
        pool.get("10.1.0.2:1666").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 2);
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_dial_is_not_cached() {
        let dialer = Arc::new(CountingDialer::default());
        let pool = ConnectionPool::new(dialer.clone());

        assert!(pool.get("unreachable:1666").await.is_err());
        assert!(pool.get("unreachable:1666").await.is_err());

        assert!(pool.is_empty());
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 2);
    }
}
