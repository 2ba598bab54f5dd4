//! Fault session
//!
//! A session serves one driver stream: it applies faults one at a time,
//! records the reversal of each on its undo stack, and acknowledges before
//! reading the next request. When the driver closes its side of the stream
//! the session unwinds every recorded reversal, newest first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use faultline_core::{Fault, FaultError, Reversal, UndoStack};

use crate::applier::EffectApplier;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

// ----------------------------------------------------------------------------
// Stream Abstraction
// ----------------------------------------------------------------------------

/// Agent side of a fault stream
#[async_trait]
pub trait FaultStream: Send {
    /// Next fault request; `None` once the driver has closed its side
    async fn next_fault(&mut self) -> Result<Option<Fault>, FaultError>;

    /// Acknowledge the fault most recently received
    async fn ack(&mut self) -> Result<(), FaultError>;
}

// ----------------------------------------------------------------------------
// Fault Session
// ----------------------------------------------------------------------------

/// Lifecycle of a session; it never returns to `Open`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

pub struct FaultSession {
    id: u64,
    applier: Arc<EffectApplier>,
    undo: UndoStack,
    state: SessionState,
    applied: u64,
}

impl FaultSession {
    pub fn new(applier: Arc<EffectApplier>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            applier,
            undo: UndoStack::new(),
            state: SessionState::Open,
            applied: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of faults applied over the session's lifetime
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Reversals still waiting to be executed, oldest first
    pub fn pending(&self) -> &[Reversal] {
        self.undo.pending()
    }

    /// Serve `stream` until it closes or fails.
    ///
    /// - close of the request side: every reversal is unwound and the unwind
    ///   result is returned;
    /// - transport failure: returned as is, nothing is unwound;
    /// - a fault that fails to validate or apply: returned as is, reversals of
    ///   earlier faults stay pending.
    pub async fn run<S>(&mut self, stream: &mut S) -> Result<(), FaultError>
    where
        S: FaultStream + ?Sized,
    {
        if self.state != SessionState::Open {
            return Err(FaultError::SessionClosed);
        }
        info!(session = self.id, "session opened");

        loop {
            let fault = match stream.next_fault().await {
                Ok(Some(fault)) => fault,
                Ok(None) => {
                    info!(session = self.id, pending = self.undo.len(), "stream closed by driver");
                    return self.unwind_all().await;
                }
                Err(e) => {
                    warn!(session = self.id, error = %e, "stream failed");
                    self.state = SessionState::Closed;
                    return Err(e);
                }
            };

            debug!(session = self.id, %fault, "handling fault");
            match self.applier.apply(&fault).await {
                Ok(reversal) => {
                    self.undo.push(reversal);
                    self.applied += 1;
                }
                Err(e) => {
                    warn!(session = self.id, %fault, error = %e, "fault not applied");
                    self.state = SessionState::Closed;
                    return Err(e);
                }
            }

            if let Err(e) = stream.ack().await {
                warn!(session = self.id, error = %e, "failed to acknowledge fault");
                self.state = SessionState::Closed;
                return Err(e);
            }
        }
    }

    /// Execute every pending reversal, newest first, reporting the first
    /// failure. Calling it again afterwards does nothing.
    pub async fn unwind_all(&mut self) -> Result<(), FaultError> {
        self.state = SessionState::Closing;
        let pending = self.undo.len();
        let result = self.undo.unwind_all(self.applier.as_ref()).await;
        self.state = SessionState::Closed;

        match &result {
            Ok(()) => info!(session = self.id, reversed = pending, "session unwound"),
            Err(e) => warn!(session = self.id, error = %e, "session unwound with errors"),
        }
        result
    }
}
