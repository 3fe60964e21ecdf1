//! Query executor
//!
//! Plans are chains of [`ExecutionStep`]s. Starting a plan wires every
//! step's pull stream to its upstream; rows are produced one at a time as
//! the caller pulls from the [`ResultSet`].
//!
//! # Invariants
//!
//! - Every pull checks the context deadline
//! - Steps that materialize rows (sort, distinct, aggregation) fail once
//!   they would hold more than `max_heap_elements_per_operation` rows
//! - Errors keep their kind from the step that raised them up to the caller

mod config;
mod context;
mod errors;
pub(crate) mod eval;
mod plan;
mod result;
mod result_set;
mod sorter;
mod step;
pub mod steps;
mod stream;

pub use config::{EngineConfig, ParallelStrategy};
pub use context::{ExecutionContext, Parameters, ScopeId};
pub use errors::{ExecResult, ExecutorError, ExecutorErrorCode, Severity};
pub use eval::{eval_condition, eval_expr, matches};
pub use plan::{ExecutionPlan, StepDescription};
pub use result::{EntityResult, QueryResult, ResultInternal, RowMetadata, UpdatableResult};
pub use result_set::ResultSet;
pub use sorter::ResultSorter;
pub use step::{ExecutionStep, StepStats, StepStatsSnapshot, Upstream};
pub use steps::StepKind;
pub use stream::{ExecutionStream, ResultSource, RowProducer};
