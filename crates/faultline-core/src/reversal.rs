//! Reversals and the undo stack
//!
//! Each applied effect yields a `Reversal`: a plain value describing its exact
//! inverse. Reversals are kept on an `UndoStack` owned by one session and are
//! executed most-recent-first when the session ends.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::command::FilterRule;
use crate::errors::FaultError;

// ----------------------------------------------------------------------------
// Reversal
// ----------------------------------------------------------------------------

/// The inverse of one applied effect
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reversal {
    /// Delete a filtering rule from the namespace it was installed in
    DeleteFilterRule { namespace: String, rule: FilterRule },
}

/// Something able to carry out reversals against a host
#[async_trait]
pub trait ReversalExecutor: Send + Sync {
    async fn execute(&self, reversal: &Reversal) -> Result<(), FaultError>;
}

// ----------------------------------------------------------------------------
// Undo Stack
// ----------------------------------------------------------------------------

/// LIFO stack of pending reversals
#[derive(Debug, Default)]
pub struct UndoStack {
    entries: Vec<Reversal>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the reversal of an effect that has fully applied
    pub fn push(&mut self, reversal: Reversal) {
        self.entries.push(reversal);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending reversals, oldest first
    pub fn pending(&self) -> &[Reversal] {
        &self.entries
    }

    /// Pop and execute every reversal, newest first.
    ///
    /// A failing reversal does not stop the unwind. The stack is always empty
    /// afterwards and the first failure, if any, is returned.
    pub async fn unwind_all<E>(&mut self, executor: &E) -> Result<(), FaultError>
    where
        E: ReversalExecutor + ?Sized,
    {
        let attempted = self.entries.len();
        let mut failed = 0;
        let mut first_error = None;

        while let Some(reversal) = self.entries.pop() {
            debug!(?reversal, remaining = self.entries.len(), "executing reversal");

            if let Err(e) = executor.execute(&reversal).await {
                warn!(?reversal, error = %e, "reversal failed");
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(first) => Err(FaultError::Unwind {
                attempted,
                failed,
                first: Box::new(first),
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
