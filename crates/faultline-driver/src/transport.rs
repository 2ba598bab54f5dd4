//! Driver transport
//!
//! Three layers, each behind a trait so the orchestrator can be tested
//! without sockets:
//!
//! - `Dialer` turns a host address into an `AgentChannel`
//! - `AgentChannel` is the reusable, cached connection to one agent
//! - `FaultStreamClient` is one open fault session on that agent
//!
//! The TCP implementations speak the framed protocol from
//! `faultline_core::wire`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use faultline_core::wire::write_frame;
use faultline_core::{AgentFrame, DriverFrame, Fault, FrameReader, PROTOCOL_VERSION};

use crate::error::{DriverError, Result};

// ----------------------------------------------------------------------------
// Transport Traits
// ----------------------------------------------------------------------------

/// One open fault session on an agent
#[async_trait]
pub trait FaultStreamClient: Send {
    /// Address of the agent this session runs on
    fn host(&self) -> &str;

    /// Send one fault and wait for the agent to acknowledge it
    async fn apply_fault(&mut self, fault: &Fault) -> Result<()>;

    /// Stop sending faults and wait until the agent has unwound them
    async fn close(&mut self) -> Result<()>;
}

/// Reusable connection to one agent
#[async_trait]
pub trait AgentChannel: Send + Sync {
    /// Start a new fault session
    async fn open_stream(&self) -> Result<Box<dyn FaultStreamClient>>;
}

/// Creates channels for host addresses
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, address: &str) -> Result<Arc<dyn AgentChannel>>;
}

// ----------------------------------------------------------------------------
// TCP Dialer
// ----------------------------------------------------------------------------

/// Dialer resolving `host:port` addresses for TCP agents
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, address: &str) -> Result<Arc<dyn AgentChannel>> {
        let resolved: Vec<SocketAddr> = lookup_host(address)
            .await
            .map_err(|e| DriverError::transport(address, e))?
            .collect();

        if resolved.is_empty() {
            return Err(DriverError::transport(address, "address resolved to nothing"));
        }

        debug!(address, ?resolved, "dialed agent");
        Ok(Arc::new(TcpChannel {
            address: address.to_string(),
            resolved,
            connect_timeout: self.connect_timeout,
        }))
    }
}

/// Resolved agent address; every session is its own TCP stream
#[derive(Debug)]
pub struct TcpChannel {
    address: String,
    resolved: Vec<SocketAddr>,
    connect_timeout: Duration,
}

#[async_trait]
impl AgentChannel for TcpChannel {
    async fn open_stream(&self) -> Result<Box<dyn FaultStreamClient>> {
        let connect = async {
            let socket = TcpStream::connect(&self.resolved[..])
                .await
                .map_err(|e| DriverError::transport(&self.address, e))?;
            if let Err(e) = socket.set_nodelay(true) {
                warn!(address = %self.address, error = %e, "failed to set TCP_NODELAY");
            }
            FramedFaultClient::handshake(socket, &self.address).await
        };

        let stream = timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                DriverError::transport(
                    &self.address,
                    format!("no handshake within {:?}", self.connect_timeout),
                )
            })??;
        Ok(Box::new(stream))
    }
}

// ----------------------------------------------------------------------------
// Framed Fault Client
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Open,
    /// The agent refused a fault and is unwinding on its own
    Failed,
    Closed,
}

/// Driver end of one fault session over any duplex byte stream
pub struct FramedFaultClient<S> {
    host: String,
    reader: FrameReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    state: ClientState,
}

impl<S> FramedFaultClient<S>
where
    S: AsyncRead + AsyncWrite + Send,
{
    /// Wait for the agent's `Ready` frame and check its protocol version
    pub async fn handshake(io: S, host: &str) -> Result<Self> {
        let (read_half, write_half) = split(io);
        let mut client = Self {
            host: host.to_string(),
            reader: FrameReader::new(read_half),
            writer: write_half,
            state: ClientState::Open,
        };

        match client.next_frame().await? {
            Some(AgentFrame::Ready { protocol_version }) if protocol_version == PROTOCOL_VERSION => {
                Ok(client)
            }
            Some(AgentFrame::Ready { protocol_version }) => Err(DriverError::protocol(
                host,
                format!(
                    "agent speaks protocol {}, expected {}",
                    protocol_version, PROTOCOL_VERSION
                ),
            )),
            Some(other) => Err(DriverError::protocol(
                host,
                format!("expected Ready, got {:?}", other),
            )),
            None => Err(DriverError::transport(host, "stream closed before handshake")),
        }
    }

    /// Next frame that is not a keepalive
    async fn next_frame(&mut self) -> Result<Option<AgentFrame>> {
        loop {
            let frame = self
                .reader
                .next::<AgentFrame>()
                .await
                .map_err(|e| DriverError::transport(&self.host, e))?;

            match frame {
                Some(AgentFrame::Ping) => trace!(host = %self.host, "keepalive"),
                other => return Ok(other),
            }
        }
    }
}

#[async_trait]
impl<S> FaultStreamClient for FramedFaultClient<S>
where
    S: AsyncRead + AsyncWrite + Send,
{
    fn host(&self) -> &str {
        &self.host
    }

    async fn apply_fault(&mut self, fault: &Fault) -> Result<()> {
        if self.state != ClientState::Open {
            return Err(DriverError::protocol(
                &self.host,
                "session no longer accepts faults",
            ));
        }

        write_frame(&mut self.writer, &DriverFrame::Fault(fault.clone()))
            .await
            .map_err(|e| DriverError::transport(&self.host, e))?;

        match self.next_frame().await? {
            Some(AgentFrame::Ack) => Ok(()),
            Some(AgentFrame::Failed { error }) => {
                self.state = ClientState::Failed;
                Err(DriverError::Rejected {
                    host: self.host.clone(),
                    error,
                })
            }
            Some(other) => Err(DriverError::protocol(
                &self.host,
                format!("expected Ack, got {:?}", other),
            )),
            None => Err(DriverError::transport(
                &self.host,
                "stream closed before the fault was acknowledged",
            )),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.state == ClientState::Closed {
            return Ok(());
        }

        if self.state == ClientState::Open {
            self.writer
                .shutdown()
                .await
                .map_err(|e| DriverError::transport(&self.host, e))?;
        }
        self.state = ClientState::Closed;

        match self.next_frame().await? {
            Some(AgentFrame::Closed { unwind_error: None }) => Ok(()),
            Some(AgentFrame::Closed {
                unwind_error: Some(error),
            }) => Err(DriverError::Unwind {
                host: self.host.clone(),
                error,
            }),
            Some(other) => Err(DriverError::protocol(
                &self.host,
                format!("expected Closed, got {:?}", other),
            )),
            None => Err(DriverError::transport(
                &self.host,
                "stream closed before the unwind was confirmed",
            )),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
