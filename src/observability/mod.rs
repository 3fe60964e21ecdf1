//! Observability subsystem
//!
//! - Structured events (one JSON line each) emitted through `tracing`
//! - Query metrics as atomic counters
//! - Begin/complete scopes around planning and execution
//!
//! # Principles
//!
//! 1. Observability is read-only: it never changes query results
//! 2. No background threads
//! 3. Deterministic output: event first, fields sorted
//!
//! # Usage
//!
//! ```ignore
//! use vertexql::observability::{Logger, MetricsRegistry, ObservationScope};
//!
//! Logger::info("QUERY_COMPLETE", &[("rows", "42")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_queries_executed();
//!
//! let scope = ObservationScope::new("PLAN");
//! // ... plan ...
//! scope.complete();
//! ```

mod logger;
mod metrics;
mod scope;

pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};
