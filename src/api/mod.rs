//! Engine facade and JSON API
//!
//! [`QueryEngine`] plans and runs statements against one database.
//! [`RequestHandler`] exposes it through JSON requests:
//!
//! - `query`: run a statement, return its rows
//! - `explain`: describe the plan without running it
//! - `profile`: run with per-step counters, return rows and plan
//! - `metrics`: current counters
//!
//! Engine errors pass through with their original codes.

mod engine;
mod errors;
mod handler;
mod request;
mod response;

pub use engine::{Profile, QueryEngine};
pub use errors::{ApiError, ApiErrorCode, ApiResult};
pub use handler::RequestHandler;
pub use request::{Request, StatementRequest};
pub use response::{ErrorResponse, Response, SuccessResponse};
