//! CLI command implementations
//!
//! Each command loads the configuration, builds the database from the
//! configured fixture and handles exactly one request read from stdin.
//! The request is the JSON API envelope; its `op` is set by the command.

use std::path::Path;

use serde_json::{json, Value};
use tracing::info;

use crate::api::{QueryEngine, RequestHandler, Response};

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_json};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Query { config } => query(&config),
        Command::Explain { config } => explain(&config),
        Command::Profile { config } => profile(&config),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Run one statement and print the rows
pub fn query(config_path: &Path) -> CliResult<()> {
    one_shot(config_path, "query")
}

/// Print the plan of one statement without running it
pub fn explain(config_path: &Path) -> CliResult<()> {
    one_shot(config_path, "explain")
}

/// Run one statement and print rows and per-step counters
pub fn profile(config_path: &Path) -> CliResult<()> {
    one_shot(config_path, "profile")
}

/// Validate the configuration and the fixture it names
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let db = config.open_database()?;
    let session = db.session();
    let classes = session
        .schema()
        .classes()
        .map_err(|e| CliError::fixture_error(e.to_string()))?;
    let indexes = session
        .indexes()
        .indexes()
        .map_err(|e| CliError::fixture_error(e.to_string()))?;

    info!(config = %config_path.display(), "configuration valid");
    write_json(
        &json!({
            "status": "ok",
            "data": {
                "database": config.database_name,
                "classes": classes.len(),
                "indexes": indexes.len(),
                "engine": config.engine,
            }
        })
        .to_string(),
    )
}

fn one_shot(config_path: &Path, op: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let request = read_request()?;
    let response = match handle_request(&config, request, op) {
        Ok(response) => response,
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            return Err(e);
        }
    };
    write_json(&response.to_json())?;
    if response.is_success() {
        Ok(())
    } else {
        Err(CliError::query_failed(format!("{} request failed", op)))
    }
}

/// Builds the engine for `config` and handles one request with `op` forced
pub(crate) fn handle_request(config: &Config, request: Value, op: &str) -> CliResult<Response> {
    let mut request = request;
    match request.as_object_mut() {
        Some(obj) => {
            obj.insert("op".to_string(), json!(op));
        }
        None => return Err(CliError::io_error("Request must be a JSON object")),
    }

    let db = config.open_database()?;
    let engine = QueryEngine::new(db, config.engine.clone())
        .map_err(|e| CliError::config_error(e.to_string()))?;
    let handler = RequestHandler::new(&engine);
    Ok(handler.handle(&request.to_string()))
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const FIXTURE: &str = r#"{
        "classes": [{"name": "City", "properties": [{"name": "name", "type": "STRING"}]}],
        "records": [
            {"class": "City", "properties": {"name": "Rome"}},
            {"class": "City", "properties": {"name": "Oslo"}},
            {"class": "City", "properties": {"name": "Lima"}}
        ],
        "indexes": [{"name": "City.name", "class": "City", "fields": ["name"], "type": "UNIQUE"}]
    }"#;

    fn create_config(temp_dir: &TempDir) -> PathBuf {
        fs::write(temp_dir.path().join("fixture.json"), FIXTURE).unwrap();
        let config_path = temp_dir.path().join("vertexql.json");
        fs::write(&config_path, json!({"fixture": "fixture.json"}).to_string()).unwrap();
        config_path
    }

    fn select_cities() -> Value {
        json!({
            "statement": {
                "statement": "select",
                "target": {"kind": "class", "name": "City"},
                "order_by": [{"expr": {"kind": "field", "path": ["name"]}, "direction": "asc"}]
            }
        })
    }

    #[test]
    fn test_query_over_fixture() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&create_config(&temp_dir)).unwrap();
        let response = handle_request(&config, select_cities(), "query").unwrap();
        assert!(response.is_success());
        let names: Vec<_> = response
            .data()
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Lima", "Oslo", "Rome"]);
    }

    #[test]
    fn test_explain_over_fixture() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&create_config(&temp_dir)).unwrap();
        let response = handle_request(&config, select_cities(), "explain").unwrap();
        let data = response.data().unwrap();
        assert_eq!(data["indexes"][0], "City.name");
        assert_eq!(data["orderByEliminated"], true);
    }

    #[test]
    fn test_non_object_request_rejected() {
        let config = Config::default();
        let err = handle_request(&config, json!([1, 2]), "query").unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::IoError);
    }

    #[test]
    fn test_check_config_rejects_bad_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("vertexql.json");
        fs::write(&config_path, "{not json").unwrap();
        let err = check_config(&config_path).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }
}
