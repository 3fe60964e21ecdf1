//! API request types
//!
//! A request is one JSON object: `op` selects the operation, `statement`
//! carries the already-parsed statement and `params` its parameters.

use serde::Deserialize;
use serde_json::Value;

use crate::executor::Parameters;
use crate::planner::Statement;

use super::errors::{ApiError, ApiResult};

/// Statement plus parameters
#[derive(Debug, Clone)]
pub struct StatementRequest {
    pub statement: Statement,
    pub params: Parameters,
}

/// Unified request envelope
#[derive(Debug, Clone)]
pub enum Request {
    /// Run and return the rows
    Query(StatementRequest),
    /// Describe the plan without running it
    Explain(StatementRequest),
    /// Run with per-step counters and return rows and plan
    Profile(StatementRequest),
    /// Current metrics counters
    Metrics,
}

/// Raw request for parsing
#[derive(Debug, Deserialize)]
struct RawRequest {
    op: String,
    #[serde(default)]
    statement: Option<Value>,
    #[serde(default)]
    params: Option<Parameters>,
}

impl Request {
    /// Parse a request from JSON string
    pub fn parse(json: &str) -> ApiResult<Self> {
        let raw: RawRequest = serde_json::from_str(json)
            .map_err(|e| ApiError::invalid_request(format!("Invalid JSON: {}", e)))?;

        match raw.op.as_str() {
            "query" => Ok(Request::Query(statement_request(raw)?)),
            "explain" => Ok(Request::Explain(statement_request(raw)?)),
            "profile" => Ok(Request::Profile(statement_request(raw)?)),
            "metrics" => Ok(Request::Metrics),
            other => Err(ApiError::unknown_operation(other)),
        }
    }
}

fn statement_request(raw: RawRequest) -> ApiResult<StatementRequest> {
    let statement = raw
        .statement
        .ok_or_else(|| ApiError::invalid_request("Missing statement"))?;
    let statement: Statement = serde_json::from_value(statement)
        .map_err(|e| ApiError::invalid_request(format!("Invalid statement: {}", e)))?;
    Ok(StatementRequest {
        statement,
        params: raw.params.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let json = r#"{
            "op": "query",
            "statement": {"statement": "select", "target": {"kind": "class", "name": "Person"}},
            "params": {"positional": [{"type": "int", "value": 1}]}
        }"#;
        match Request::parse(json).unwrap() {
            Request::Query(req) => {
                assert_eq!(req.statement.kind(), "SELECT");
                assert_eq!(req.params.positional.len(), 1);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_parse_metrics_needs_no_statement() {
        assert!(matches!(
            Request::parse(r#"{"op": "metrics"}"#).unwrap(),
            Request::Metrics
        ));
    }

    #[test]
    fn test_missing_statement() {
        let err = Request::parse(r#"{"op": "explain"}"#).unwrap_err();
        assert_eq!(err.code(), "VQL_INVALID_REQUEST");
    }

    #[test]
    fn test_unknown_operation() {
        let err = Request::parse(r#"{"op": "drop_everything"}"#).unwrap_err();
        assert_eq!(err.code(), "VQL_UNKNOWN_OPERATION");
    }

    #[test]
    fn test_invalid_json() {
        assert!(Request::parse("{not json").is_err());
    }
}
