//! Faultline Agent
//!
//! Runs on every host under test. Drivers open one long-lived stream per host;
//! the agent applies each fault it receives to the host, remembers how to undo
//! it, and undoes everything when the stream closes:
//! - `EffectApplier`: fault → host commands → `Reversal`
//! - `FaultSession`: request/ack loop plus LIFO unwind
//! - `AgentServer`: TCP listener spawning one session per connection

pub mod applier;
pub mod cli;
pub mod config;
pub mod error;
pub mod netns;
pub mod server;
pub mod session;
pub mod shell;
pub mod stream;

pub use applier::EffectApplier;
pub use cli::{Cli, Commands};
pub use config::{AgentConfig, ListenOverrides, DEFAULT_PORT};
pub use error::{AgentError, Result};
pub use netns::{LinkTableResolver, NamespaceResolver};
pub use server::AgentServer;
pub use session::{FaultSession, FaultStream, SessionState};
pub use shell::{HostShell, ProcessShell};
pub use stream::FramedFaultStream;
