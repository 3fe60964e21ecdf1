//! vertexql - pull-based query execution for an embedded document/graph
//! database
//!
//! Statements arrive already parsed ([`planner::Statement`]). The planner
//! turns them into chains of execution steps; the executor pulls rows
//! through those chains one at a time.
//!
//! ```ignore
//! use vertexql::api::QueryEngine;
//! use vertexql::database::Database;
//! use vertexql::executor::{EngineConfig, Parameters};
//! use vertexql::planner::{SelectStatement, Statement};
//!
//! let engine = QueryEngine::new(Database::new("demo")?, EngineConfig::default())?;
//! let rows = engine.query(
//!     &Statement::Select(SelectStatement::from_class("V")),
//!     Parameters::new(),
//! )?;
//! ```

pub mod api;
pub mod cli;
pub mod database;
mod error;
pub mod executor;
pub mod index;
pub mod observability;
pub mod planner;
pub mod schema;
pub mod storage;
pub mod value;

pub use error::{Error, ErrorKind, Result};
