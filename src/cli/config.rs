//! Configuration file
//!
//! ```json
//! {
//!   "database_name": "demo",
//!   "fixture": "demo-fixture.json",
//!   "engine": { "default_timeout_ms": 5000, "parallel_strategy": "interleaved" }
//! }
//! ```
//!
//! Every field is optional. A relative fixture path is resolved against
//! the directory of the configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::{Database, Fixture};
use crate::executor::EngineConfig;

use super::errors::{CliError, CliResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// JSON fixture loaded into the database at startup; none means an
    /// empty database
    #[serde(default)]
    pub fixture: Option<PathBuf>,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_database_name() -> String {
    "vertexql".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_name: default_database_name(),
            fixture: None,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        if let Some(fixture) = &config.fixture {
            if fixture.is_relative() {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                config.fixture = Some(base.join(fixture));
            }
        }

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.database_name.trim().is_empty() {
            return Err(CliError::config_error("database_name must not be empty"));
        }

        self.engine
            .validate()
            .map_err(|e| CliError::config_error(format!("Invalid engine config: {}", e)))?;

        if let Some(fixture) = &self.fixture {
            if !fixture.is_file() {
                return Err(CliError::config_error(format!(
                    "Fixture file not found: {}",
                    fixture.display()
                )));
            }
        }

        Ok(())
    }

    /// Builds the database, seeded from the fixture when one is configured
    pub fn open_database(&self) -> CliResult<Database> {
        let Some(path) = &self.fixture else {
            return Database::new(self.database_name.clone())
                .map_err(|e| CliError::fixture_error(e.to_string()));
        };
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::fixture_error(format!("Failed to read fixture: {}", e)))?;
        let fixture = Fixture::from_json(&content).map_err(|e| CliError::fixture_error(e.to_string()))?;
        let db = Database::from_fixture(self.database_name.clone(), &fixture)
            .map_err(|e| CliError::fixture_error(e.to_string()))?;
        info!(database = %self.database_name, fixture = %path.display(), "fixture loaded");
        Ok(db)
    }
}
