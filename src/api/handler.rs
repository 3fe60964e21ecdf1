//! JSON request handler
//!
//! Parses a request, runs it on the engine and renders the response.
//! Requests are serialized behind one lock so that a statement sees the
//! effects of every statement handled before it.

use std::sync::Mutex;

use serde_json::{json, Value};

use super::engine::QueryEngine;
use super::errors::{ApiError, ApiResult};
use super::request::{Request, StatementRequest};
use super::response::Response;

pub struct RequestHandler<'a> {
    lock: Mutex<()>,
    engine: &'a QueryEngine,
}

impl<'a> RequestHandler<'a> {
    pub fn new(engine: &'a QueryEngine) -> Self {
        Self {
            lock: Mutex::new(()),
            engine,
        }
    }

    /// Handle a raw JSON request string
    pub fn handle(&self, json_request: &str) -> Response {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let request = match Request::parse(json_request) {
            Ok(r) => r,
            Err(e) => return Response::error(&e),
        };

        let result = match request {
            Request::Query(r) => self.handle_query(r),
            Request::Explain(r) => Ok(self.handle_explain(r)),
            Request::Profile(r) => self.handle_profile(r),
            Request::Metrics => Ok(self.handle_metrics()),
        };

        match result {
            Ok(data) => Response::success(data),
            Err(e) => Response::error(&e),
        }
    }

    fn handle_query(&self, req: StatementRequest) -> ApiResult<Value> {
        let rows = self.engine.query(&req.statement, req.params)?;
        Ok(Value::Array(rows.iter().map(|r| r.to_json()).collect()))
    }

    /// Planning failures are part of the explain output, not errors
    fn handle_explain(&self, req: StatementRequest) -> Value {
        self.engine.explain(&req.statement).to_json()
    }

    fn handle_metrics(&self) -> Value {
        serde_json::to_value(self.engine.metrics().snapshot()).unwrap_or(Value::Null)
    }

    fn handle_profile(&self, req: StatementRequest) -> ApiResult<Value> {
        let profile = self
            .engine
            .profile(&req.statement, req.params)
            .map_err(ApiError::from)?;
        Ok(json!({
            "rows": profile.rows.iter().map(|r| r.to_json()).collect::<Vec<_>>(),
            "plan": profile.plan.to_json(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::executor::EngineConfig;
    use crate::value::Properties;

    fn engine() -> QueryEngine {
        let db = Database::new("test").unwrap();
        let session = db.session();
        session.create_class("Person", Vec::new(), false).unwrap();
        for name in ["alice", "bob"] {
            let mut props = Properties::new();
            props.set("name", name);
            session.create_record("Person", None, props).unwrap();
        }
        QueryEngine::new(db, EngineConfig::default()).unwrap()
    }

    const SELECT_PEOPLE: &str =
        r#"{"op": "query", "statement": {"statement": "select", "target": {"kind": "class", "name": "Person"}}}"#;

    #[test]
    fn test_query_returns_rows() {
        let engine = engine();
        let handler = RequestHandler::new(&engine);
        let response = handler.handle(SELECT_PEOPLE);
        assert!(response.is_success());
        let rows = response.data().unwrap().as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["@class"], "Person");
    }

    #[test]
    fn test_unknown_class_passes_code_through() {
        let engine = engine();
        let handler = RequestHandler::new(&engine);
        let response = handler.handle(
            r#"{"op": "query", "statement": {"statement": "select", "target": {"kind": "class", "name": "Nope"}}}"#,
        );
        assert!(!response.is_success());
        assert!(response.to_json().contains("VQL_UNKNOWN_CLASS"));
    }

    #[test]
    fn test_explain_and_metrics() {
        let engine = engine();
        let handler = RequestHandler::new(&engine);
        let explain = handler.handle(&SELECT_PEOPLE.replace("\"query\"", "\"explain\""));
        assert_eq!(explain.data().unwrap()["accepted"], true);

        handler.handle(SELECT_PEOPLE);
        let metrics = handler.handle(r#"{"op": "metrics"}"#);
        assert_eq!(metrics.data().unwrap()["rows_returned"], 2);
    }

    #[test]
    fn test_profile_returns_plan_with_stats() {
        let engine = engine();
        let handler = RequestHandler::new(&engine);
        let response = handler.handle(&SELECT_PEOPLE.replace("\"query\"", "\"profile\""));
        let data = response.data().unwrap();
        assert_eq!(data["rows"].as_array().unwrap().len(), 2);
        assert_eq!(data["plan"]["steps"][0]["stats"]["rows"], 2);
    }
}
