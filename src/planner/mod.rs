//! Statement planning
//!
//! Turns parsed statements into [`ExecutionPlan`](crate::executor::ExecutionPlan)s.
//!
//! # Index selection
//!
//! The WHERE clause is normalized to disjunctive form. Each AND block picks
//! the index matching the longest key prefix; ties go to more equalities,
//! then unique indexes, then indexes defined on the target class itself,
//! then the index name. Blocks that resolve to different lookups run as
//! parallel branches whose union is deduplicated.
//!
//! Planning is deterministic: the same statement over the same catalog
//! always yields the same plan.

mod ast;
mod commands;
mod errors;
mod explain;
mod expr;
mod index_search;
mod mutation;
mod normalize;
mod planner;
mod select;

pub use ast::{
    ClusterRef, CreateClassStatement, CreateClusterStatement, CreateIndexStatement,
    CreatePropertyStatement, CreateSecurityPolicyStatement, CreateSequenceStatement,
    CreateUserStatement, DeleteStatement, DeleteVertexStatement, DropClassStatement,
    DropClusterStatement, DropIndexStatement, DropPropertyStatement, DropSecurityPolicyStatement,
    DropSequenceStatement, DropUserStatement, InsertStatement, LetItem, MetadataTarget,
    OrderDirection, OrderItem, ProjectionItem, SelectStatement, SetItem, SleepStatement, Statement,
    Target, UpdateStatement,
};
pub use commands::CommandPlanner;
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use explain::ExplainPlan;
pub use expr::{CompareOp, Condition, Expr, SequenceOp, AGGREGATE_FUNCTIONS};
pub use index_search::{best_match, IndexMatch};
pub use mutation::MutationPlanner;
pub use normalize::to_dnf;
pub use planner::QueryPlanner;
pub use select::SelectPlanner;
