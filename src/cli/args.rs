//! CLI argument definitions using clap
//!
//! Commands:
//! - vertexql query --config <path>
//! - vertexql explain --config <path>
//! - vertexql profile --config <path>
//! - vertexql check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// vertexql - query execution over an in-memory document/graph database
#[derive(Parser, Debug)]
#[command(name = "vertexql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one statement read from stdin and print its rows
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./vertexql.json")]
        config: PathBuf,
    },

    /// Print the plan of one statement read from stdin without running it
    Explain {
        /// Path to configuration file
        #[arg(long, default_value = "./vertexql.json")]
        config: PathBuf,
    },

    /// Run one statement and print its rows with per-step counters
    Profile {
        /// Path to configuration file
        #[arg(long, default_value = "./vertexql.json")]
        config: PathBuf,
    },

    /// Load and validate the configuration and fixture, then exit
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./vertexql.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let cli = Cli::try_parse_from(["vertexql", "query"]).unwrap();
        match cli.command {
            Command::Query { config } => assert_eq!(config, PathBuf::from("./vertexql.json")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_check_config_subcommand() {
        let cli = Cli::try_parse_from(["vertexql", "check-config", "--config", "/tmp/x.json"]).unwrap();
        assert!(matches!(cli.command, Command::CheckConfig { .. }));
    }
}
