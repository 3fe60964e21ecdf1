//! vertexql CLI entry point
//!
//! Parses arguments and dispatches to the CLI module. Logs go to stderr
//! (filtered by `RUST_LOG`, `vertexql=warn` by default); stdout carries
//! only the JSON response.

use tracing_subscriber::EnvFilter;

use vertexql::cli;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vertexql=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
