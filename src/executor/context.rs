//! Execution context
//!
//! One context per statement execution. Variable scopes live in an arena
//! indexed by [`ScopeId`]; each scope points at its parent by index, so a
//! nested subquery can read `$parent.$current` without borrowing the
//! enclosing scope.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::DatabaseSession;
use crate::observability::MetricsRegistry;
use crate::value::Value;

use super::config::EngineConfig;
use super::errors::{ExecResult, ExecutorError};
use super::result::QueryResult;

/// Index of a scope in the context arena
pub type ScopeId = usize;

const ROOT_SCOPE: ScopeId = 0;

/// Statement parameters: positional `?` and named `:name`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub positional: Vec<Value>,
    #[serde(default)]
    pub named: BTreeMap<String, Value>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: BTreeMap::new(),
        }
    }

    pub fn with_named(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.named.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    variables: BTreeMap<String, Value>,
    current: Option<QueryResult>,
}

/// Mutable state shared by all steps of one execution
#[derive(Debug)]
pub struct ExecutionContext {
    session: DatabaseSession,
    config: Arc<EngineConfig>,
    params: Arc<Parameters>,
    metrics: Arc<MetricsRegistry>,
    deadline: Option<Instant>,
    query_id: Uuid,
    scopes: Vec<Option<Scope>>,
    free: Vec<ScopeId>,
    active: ScopeId,
    regexes: HashMap<String, Regex>,
}

impl ExecutionContext {
    /// Context with the transaction deadline and the configured default
    /// timeout applied
    pub fn new(session: DatabaseSession, config: Arc<EngineConfig>) -> Self {
        let mut ctx = Self {
            deadline: session.transaction().deadline(),
            session,
            config,
            params: Arc::new(Parameters::default()),
            metrics: Arc::new(MetricsRegistry::new()),
            query_id: Uuid::new_v4(),
            scopes: vec![Some(Scope::default())],
            free: Vec::new(),
            active: ROOT_SCOPE,
            regexes: HashMap::new(),
        };
        if let Some(timeout) = ctx.config.default_timeout() {
            ctx.limit_deadline(timeout);
        }
        ctx
    }

    pub fn with_params(mut self, params: Parameters) -> Self {
        self.params = Arc::new(params);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn session(&self) -> &DatabaseSession {
        &self.session
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    // --- Deadline ---

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Moves the deadline to `now + timeout` if that is earlier
    pub fn limit_deadline(&mut self, timeout: Duration) {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
    }

    /// Replaces the configured default timeout with a statement-level one.
    ///
    /// The transaction deadline still applies.
    pub fn set_statement_timeout(&mut self, timeout: Duration) {
        self.deadline = self.session.transaction().deadline();
        self.limit_deadline(timeout);
    }

    /// Fails once the deadline has passed
    pub fn check_deadline(&self) -> ExecResult<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.metrics.increment_timeouts();
                Err(ExecutorError::timeout(format!(
                    "query {} exceeded its deadline",
                    self.query_id
                )))
            }
            _ => Ok(()),
        }
    }

    /// Time left before the deadline, if any
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    // --- Scopes ---

    fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id).and_then(Option::as_ref)
    }

    fn scope_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.scopes.get_mut(id).and_then(Option::as_mut)
    }

    pub fn active_scope(&self) -> ScopeId {
        self.active
    }

    pub fn parent_of(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scope(scope).and_then(|s| s.parent)
    }

    /// Creates a child of the active scope and makes it active.
    ///
    /// Returns the previously active scope, to be passed to
    /// [`exit_child`](Self::exit_child).
    pub fn enter_child(&mut self) -> ScopeId {
        let scope = Scope {
            parent: Some(self.active),
            ..Scope::default()
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.scopes[id] = Some(scope);
                id
            }
            None => {
                self.scopes.push(Some(scope));
                self.scopes.len() - 1
            }
        };
        let previous = self.active;
        self.active = id;
        previous
    }

    /// Discards the active scope and reactivates `previous`
    pub fn exit_child(&mut self, previous: ScopeId) {
        let child = self.active;
        if child != ROOT_SCOPE {
            self.scopes[child] = None;
            self.free.push(child);
        }
        self.active = previous;
    }

    /// Makes an existing scope active again and returns the one that was
    /// active. Streams that outlive a single pull keep their child scope
    /// this way instead of re-creating it.
    pub fn resume_scope(&mut self, scope: ScopeId) -> ScopeId {
        std::mem::replace(&mut self.active, scope)
    }

    /// Discards `scope` whether or not it is active. An active `scope`
    /// hands over to its parent.
    pub fn release_scope(&mut self, scope: ScopeId) {
        if scope == ROOT_SCOPE || self.scope(scope).is_none() {
            return;
        }
        if self.active == scope {
            self.active = self.parent_of(scope).unwrap_or(ROOT_SCOPE);
        }
        self.scopes[scope] = None;
        self.free.push(scope);
    }

    /// Looks a variable up from `scope` towards the root
    pub fn variable_in(&self, scope: ScopeId, name: &str) -> Option<&Value> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let s = self.scope(id)?;
            if let Some(value) = s.variables.get(&name.to_ascii_lowercase()) {
                return Some(value);
            }
            cursor = s.parent;
        }
        None
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variable_in(self.active, name)
    }

    /// Binds a variable in the active scope only
    pub fn set_variable(&mut self, name: &str, value: Value) {
        let active = self.active;
        if let Some(scope) = self.scope_mut(active) {
            scope.variables.insert(name.to_ascii_lowercase(), value);
        }
    }

    /// Row currently evaluated in `scope`
    pub fn current_in(&self, scope: ScopeId) -> Option<&QueryResult> {
        self.scope(scope).and_then(|s| s.current.as_ref())
    }

    pub fn set_current(&mut self, row: Option<QueryResult>) {
        let active = self.active;
        if let Some(scope) = self.scope_mut(active) {
            scope.current = row;
        }
    }

    // --- Caches ---

    /// Compiled regex for a pattern, cached for the whole execution
    pub fn regex(&mut self, pattern: &str) -> ExecResult<Regex> {
        if let Some(re) = self.regexes.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern).map_err(|e| {
            ExecutorError::command(format!("invalid pattern '{}': {}", pattern, e))
        })?;
        self.regexes.insert(pattern.to_string(), re.clone());
        Ok(re)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    fn ctx() -> ExecutionContext {
        let db = Database::new("ctx").unwrap();
        ExecutionContext::new(db.session(), Arc::new(EngineConfig::default()))
    }

    #[test]
    fn test_variable_lookup_walks_parents() {
        let mut ctx = ctx();
        ctx.set_variable("x", Value::Int(1));
        let previous = ctx.enter_child();
        assert_eq!(ctx.variable("X"), Some(&Value::Int(1)));

        ctx.set_variable("x", Value::Int(2));
        assert_eq!(ctx.variable("x"), Some(&Value::Int(2)));
        ctx.exit_child(previous);
        assert_eq!(ctx.variable("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_child_scope_reads_parent_current() {
        let mut ctx = ctx();
        ctx.set_current(Some(QueryResult::projection(
            [("name", Value::from("a"))].into_iter().collect(),
        )));
        let previous = ctx.enter_child();
        let parent = ctx.parent_of(ctx.active_scope()).unwrap();
        assert_eq!(
            ctx.current_in(parent).and_then(|r| r.property("name")),
            Some(&Value::from("a"))
        );
        assert!(ctx.current_in(ctx.active_scope()).is_none());
        ctx.exit_child(previous);
    }

    #[test]
    fn test_parked_scope_keeps_bindings() {
        let mut ctx = ctx();
        let previous = ctx.enter_child();
        let child = ctx.active_scope();
        ctx.set_variable("inner", Value::Int(7));
        ctx.resume_scope(previous);
        assert!(ctx.variable("inner").is_none());

        let outer = ctx.resume_scope(child);
        assert_eq!(ctx.variable("inner"), Some(&Value::Int(7)));
        ctx.resume_scope(outer);

        ctx.release_scope(child);
        assert_eq!(ctx.active_scope(), previous);
        let again = ctx.enter_child();
        assert_eq!(ctx.active_scope(), child);
        assert!(ctx.variable("inner").is_none());
        ctx.exit_child(again);
    }

    #[test]
    fn test_scope_slots_are_reused() {
        let mut ctx = ctx();
        let previous = ctx.enter_child();
        let first = ctx.active_scope();
        ctx.exit_child(previous);
        let previous = ctx.enter_child();
        assert_eq!(ctx.active_scope(), first);
        ctx.exit_child(previous);
    }

    #[test]
    fn test_deadline() {
        let mut ctx = ctx();
        assert!(ctx.check_deadline().is_ok());
        ctx.set_statement_timeout(Duration::from_millis(0));
        let err = ctx.check_deadline().unwrap_err();
        assert_eq!(err.code(), super::super::errors::ExecutorErrorCode::VqlTimeout);
        assert_eq!(ctx.metrics().snapshot().timeouts, 1);
    }

    #[test]
    fn test_regex_cache() {
        let mut ctx = ctx();
        assert!(ctx.regex("^a.*$").unwrap().is_match("abc"));
        assert!(ctx.regex("(").is_err());
    }
}
