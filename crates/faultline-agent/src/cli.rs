//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

use crate::config::ListenOverrides;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve faults to drivers until interrupted
    Serve {
        /// Service address port
        #[arg(long, env = "PORT")]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,
    },
    /// Print the effective configuration and exit
    Config {
        /// Service address port
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
}

impl Commands {
    /// Listen overrides carried by this command
    pub fn overrides(&self) -> ListenOverrides {
        match self {
            Commands::Serve { port, host } => ListenOverrides {
                host: host.clone(),
                port: *port,
            },
            Commands::Config { port } => ListenOverrides {
                host: None,
                port: *port,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_port_flag() {
        let cli = Cli::parse_from(["faultline-agent", "serve", "--port", "7777"]);
        let overrides = cli.command.overrides();
        assert_eq!(overrides.port, Some(7777));
        assert!(overrides.host.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "faultline-agent",
            "serve",
            "--host",
            "127.0.0.1",
            "-v",
            "--config",
            "agent.toml",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("agent.toml"));
        assert_eq!(cli.command.overrides().host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
