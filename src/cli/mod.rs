//! `vertexql` command-line interface
//!
//! - query: run one statement from stdin against the configured fixture
//! - explain: print its plan without running it
//! - profile: run it with per-step counters
//! - check-config: validate the configuration and fixture

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, explain, profile, query, run, run_command};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_json};
