//! Agent server
//!
//! Accepts driver connections and serves each one with its own
//! `FaultSession`. Sessions never share state; one failing connection has no
//! effect on the others.
//!
//! Stopping the server ends every open stream as though its driver had closed
//! it, and `serve_until` returns only after each session has unwound.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use faultline_core::FaultError;

use crate::applier::EffectApplier;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::session::FaultSession;
use crate::shell::{HostShell, ProcessShell};
use crate::stream::FramedFaultStream;

pub struct AgentServer {
    config: AgentConfig,
    applier: Arc<EffectApplier>,
    shutdown: watch::Sender<bool>,
}

impl AgentServer {
    /// Server executing real host commands
    pub fn new(config: AgentConfig) -> Self {
        Self::with_shell(config, Arc::new(ProcessShell::new()))
    }

    /// Server executing host commands through `shell`
    pub fn with_shell(config: AgentConfig, shell: Arc<dyn HostShell>) -> Self {
        let applier = Arc::new(EffectApplier::new(shell, config.command_builder()));
        Self::with_applier(config, applier)
    }

    pub fn with_applier(config: AgentConfig, applier: Arc<EffectApplier>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            applier,
            shutdown,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        let address = self.config.listen_address();
        TcpListener::bind(&address)
            .await
            .map_err(|source| AgentError::Bind { address, source })
    }

    /// Accept connections on `listener` until `shutdown` resolves, then close
    /// every open stream and wait for its session to unwind
    pub async fn serve_until<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(address = ?listener.local_addr().ok(), "faultline agent listening");
        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (socket, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };
                    if let Err(e) = socket.set_nodelay(true) {
                        warn!(%peer, error = %e, "failed to set TCP_NODELAY");
                    }

                    let server = Arc::clone(&self);
                    connections.spawn(async move { server.handle_connection(socket, peer).await });
                }
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_panic(finished);
                }
                _ = &mut shutdown => {
                    info!(open = connections.len(), "shutdown requested, closing open streams");
                    break;
                }
            }
        }

        drop(listener);
        self.shutdown.send_replace(true);
        while let Some(finished) = connections.join_next().await {
            log_panic(finished);
        }
        info!("all streams closed");
        Ok(())
    }

    /// Serve one driver stream from handshake to final unwind
    pub async fn handle_connection<S>(&self, io: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Send,
    {
        let mut stream = FramedFaultStream::new(io, self.config.keepalive_interval())
            .with_shutdown(self.shutdown.subscribe());
        if let Err(e) = stream.send_ready().await {
            warn!(%peer, error = %e, "failed to greet driver");
            return;
        }

        let mut session = FaultSession::new(Arc::clone(&self.applier));
        info!(%peer, session = session.id(), "starting stream");

        match session.run(&mut stream).await {
            Ok(()) => {
                if let Err(e) = stream.send_closed(None).await {
                    warn!(%peer, error = %e, "failed to confirm close");
                }
            }
            Err(e @ FaultError::Unwind { .. }) => {
                if let Err(send_err) = stream.send_closed(Some(e.to_remote())).await {
                    warn!(%peer, error = %send_err, "failed to report unwind failure");
                }
            }
            Err(e) if e.is_transport() => {
                let abandoned = session.pending().len();
                if self.config.unwind_on_disconnect {
                    info!(%peer, abandoned, "driver vanished, unwinding anyway");
                    match session.unwind_all().await {
                        Ok(()) => info!(%peer, session = session.id(), "unwound after disconnect"),
                        Err(e) => warn!(
                            %peer,
                            session = session.id(),
                            error = %e,
                            "unwind after disconnect failed"
                        ),
                    }
                } else if abandoned > 0 {
                    warn!(
                        %peer,
                        session = session.id(),
                        abandoned,
                        pending = ?session.pending(),
                        "driver vanished; reversals were not executed"
                    );
                }
            }
            Err(e) => {
                if let Err(send_err) = stream.send_failed(&e).await {
                    warn!(%peer, error = %send_err, "failed to report fault failure");
                }
                let unwind = session.unwind_all().await;
                if let Err(send_err) = stream.send_closed(unwind.err().map(|u| u.to_remote())).await
                {
                    warn!(%peer, error = %send_err, "failed to confirm close");
                }
            }
        }

        info!(%peer, session = session.id(), applied = session.applied(), "stream finished");
    }
}

fn log_panic(finished: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!(error = %e, "connection task panicked");
    }
}
