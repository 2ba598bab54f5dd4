//! Framed fault stream over any duplex byte stream

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, trace};

use faultline_core::wire::write_frame;
use faultline_core::{
    AgentFrame, DriverFrame, Fault, FaultError, FrameReader, RemoteError, PROTOCOL_VERSION,
};

use crate::session::FaultStream;

/// Agent end of a driver connection.
///
/// While waiting for the next request it sends a `Ping` every keepalive
/// interval, so a vanished driver surfaces as a write failure. Once the
/// agent begins shutting down, the stream reports itself closed as if the
/// driver had closed it, so the session unwinds.
pub struct FramedFaultStream<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    keepalive: Interval,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<S> FramedFaultStream<S>
where
    S: AsyncRead + AsyncWrite + Send,
{
    pub fn new(io: S, keepalive_interval: Duration) -> Self {
        let (read_half, write_half) = split(io);
        let mut keepalive = interval_at(Instant::now() + keepalive_interval, keepalive_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            reader: FrameReader::new(read_half),
            writer: write_half,
            keepalive,
            shutdown: None,
        }
    }

    /// End the request side once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Announce the protocol version; first frame on every stream
    pub async fn send_ready(&mut self) -> Result<(), FaultError> {
        self.send(&AgentFrame::Ready {
            protocol_version: PROTOCOL_VERSION,
        })
        .await
    }

    /// Tell the driver its last fault was not applied
    pub async fn send_failed(&mut self, error: &FaultError) -> Result<(), FaultError> {
        self.send(&AgentFrame::Failed {
            error: error.to_remote(),
        })
        .await
    }

    /// Report the unwind outcome and end the stream
    pub async fn send_closed(&mut self, unwind_error: Option<RemoteError>) -> Result<(), FaultError> {
        self.send(&AgentFrame::Closed { unwind_error }).await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn send(&mut self, frame: &AgentFrame) -> Result<(), FaultError> {
        write_frame(&mut self.writer, frame).await
    }
}

#[async_trait]
impl<S> FaultStream for FramedFaultStream<S>
where
    S: AsyncRead + AsyncWrite + Send,
{
    async fn next_fault(&mut self) -> Result<Option<Fault>, FaultError> {
        loop {
            tokio::select! {
                frame = self.reader.next::<DriverFrame>() => {
                    return Ok(frame?.map(|DriverFrame::Fault(fault)| fault));
                }
                _ = self.keepalive.tick() => {
                    trace!("sending keepalive");
                    write_frame(&mut self.writer, &AgentFrame::Ping).await?;
                }
                _ = shutdown_requested(&mut self.shutdown) => {
                    info!("agent shutting down, closing stream");
                    return Ok(None);
                }
            }
        }
    }

    async fn ack(&mut self) -> Result<(), FaultError> {
        self.keepalive.reset();
        self.send(&AgentFrame::Ack).await
    }
}

/// Resolves once shutdown is signalled; never if the signal is gone
async fn shutdown_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
    let signalled = match shutdown {
        Some(rx) => rx.wait_for(|stop| *stop).await.is_ok(),
        None => false,
    };
    if !signalled {
        std::future::pending::<()>().await;
    }
}
