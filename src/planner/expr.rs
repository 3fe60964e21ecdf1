//! Expressions and filter conditions
//!
//! These are the already-parsed building blocks of a statement. They are
//! plain data: evaluation lives in the executor, index matching in
//! [`index_search`](super::index_search).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{ArithOp, Value};

use super::ast::SelectStatement;

/// Names of the aggregate functions
pub const AGGREGATE_FUNCTIONS: [&str; 5] = ["count", "sum", "min", "max", "avg"];

/// Operation applied to a named sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceOp {
    Next,
    Current,
}

/// A value-producing expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Value,
    },
    /// Dotted field path; the first segment may be an attribute such as
    /// `@rid`, `@class`, `@version` or `@this`.
    Field {
        path: Vec<String>,
    },
    /// Positional `?` parameter, zero-based
    PositionalParam {
        index: usize,
    },
    /// Named `:name` parameter
    NamedParam {
        name: String,
    },
    /// `$name` optionally followed by a path. Path segments starting with
    /// `$` (`$current`, `$parent`) navigate scopes, others navigate fields.
    Variable {
        name: String,
        #[serde(default)]
        path: Vec<String>,
    },
    Function {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// `*`, as in `count(*)` or a projection of all fields
    Star,
    Binary {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate {
        expr: Box<Expr>,
    },
    List {
        items: Vec<Expr>,
    },
    Subquery {
        query: Box<SelectStatement>,
    },
    Sequence {
        name: String,
        op: SequenceOp,
    },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    /// Field reference; dots split the path
    pub fn field(path: &str) -> Self {
        Expr::Field {
            path: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn function(name: &str, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.to_string(),
            args,
        }
    }

    /// `count(*)`
    pub fn count_star() -> Self {
        Expr::function("count", vec![Expr::Star])
    }

    /// `$name`; dots split the path
    pub fn variable(reference: &str) -> Self {
        let mut parts = reference.trim_start_matches('$').split('.').map(str::to_string);
        let name = parts.next().unwrap_or_default();
        Expr::Variable {
            name,
            path: parts.collect(),
        }
    }

    pub fn param(index: usize) -> Self {
        Expr::PositionalParam { index }
    }

    pub fn named_param(name: &str) -> Self {
        Expr::NamedParam {
            name: name.to_string(),
        }
    }

    pub fn binary(op: ArithOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Expr::List { items }
    }

    pub fn subquery(query: SelectStatement) -> Self {
        Expr::Subquery {
            query: Box::new(query),
        }
    }

    pub fn sequence(name: &str, op: SequenceOp) -> Self {
        Expr::Sequence {
            name: name.to_string(),
            op,
        }
    }

    /// The single property name of a plain (non-attribute) field reference
    pub fn as_plain_field(&self) -> Option<&str> {
        match self {
            Expr::Field { path } if path.len() == 1 && !path[0].starts_with('@') => {
                Some(path[0].as_str())
            }
            _ => None,
        }
    }

    pub fn is_rid_attribute(&self) -> bool {
        matches!(self, Expr::Field { path } if path.len() == 1 && path[0].eq_ignore_ascii_case("@rid"))
    }

    /// Name used for the output column when no alias is given
    pub fn default_alias(&self) -> String {
        match self {
            Expr::Field { path } => path.last().cloned().unwrap_or_default(),
            Expr::Function { name, .. } => name.clone(),
            other => other.to_string(),
        }
    }

    /// True for a call to an aggregate function.
    ///
    /// `min`/`max` with more than one argument are the scalar variants.
    pub fn is_aggregate_call(&self) -> bool {
        match self {
            Expr::Function { name, args } => {
                let name = name.to_ascii_lowercase();
                match name.as_str() {
                    "min" | "max" => args.len() <= 1,
                    _ => AGGREGATE_FUNCTIONS.contains(&name.as_str()),
                }
            }
            _ => false,
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        if self.is_aggregate_call() {
            return true;
        }
        match self {
            Expr::Function { args, .. } => args.iter().any(Expr::contains_aggregate),
            Expr::Binary { left, right, .. } => left.contains_aggregate() || right.contains_aggregate(),
            Expr::Negate { expr } => expr.contains_aggregate(),
            Expr::List { items } => items.iter().any(Expr::contains_aggregate),
            _ => false,
        }
    }

    /// True when the value can be computed before any row is read: no
    /// field access, variables, subqueries or side effects.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Literal { .. } | Expr::PositionalParam { .. } | Expr::NamedParam { .. } => true,
            Expr::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Expr::Negate { expr } => expr.is_constant(),
            Expr::List { items } => items.iter().all(Expr::is_constant),
            Expr::Function { args, .. } => {
                !self.is_aggregate_call() && args.iter().all(Expr::is_constant)
            }
            _ => false,
        }
    }

    /// True when the value depends on the row being evaluated
    pub fn depends_on_row(&self) -> bool {
        match self {
            Expr::Field { .. } | Expr::Star => true,
            Expr::Variable { name, path } => {
                name.eq_ignore_ascii_case("current")
                    || name.eq_ignore_ascii_case("parent")
                    || path.iter().any(|p| p.eq_ignore_ascii_case("$current"))
            }
            Expr::Function { args, .. } => args.iter().any(Expr::depends_on_row),
            Expr::Binary { left, right, .. } => left.depends_on_row() || right.depends_on_row(),
            Expr::Negate { expr } => expr.depends_on_row(),
            Expr::List { items } => items.iter().any(Expr::depends_on_row),
            Expr::Subquery { query } => query.references_parent(),
            _ => false,
        }
    }

    /// Collects the names of `$variables` read by this expression
    pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Variable { name, .. } => {
                out.insert(name.to_ascii_lowercase());
            }
            Expr::Function { args, .. } => args.iter().for_each(|a| a.collect_variables(out)),
            Expr::Binary { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Expr::Negate { expr } => expr.collect_variables(out),
            Expr::List { items } => items.iter().for_each(|a| a.collect_variables(out)),
            _ => {}
        }
    }

    /// True when the expression reads `$parent` anywhere, subqueries
    /// excluded
    pub(crate) fn references_parent(&self) -> bool {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars.contains("parent")
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value: Value::String(s) } => write!(f, "'{}'", s),
            Expr::Literal { value } => write!(f, "{}", value),
            Expr::Field { path } => write!(f, "{}", path.join(".")),
            Expr::PositionalParam { .. } => write!(f, "?"),
            Expr::NamedParam { name } => write!(f, ":{}", name),
            Expr::Variable { name, path } => {
                write!(f, "${}", name)?;
                for p in path {
                    write!(f, ".{}", p)?;
                }
                Ok(())
            }
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args, ", ")?;
                write!(f, ")")
            }
            Expr::Star => write!(f, "*"),
            Expr::Binary { op, left, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Expr::Negate { expr } => write!(f, "-{}", expr),
            Expr::List { items } => {
                write!(f, "[")?;
                write_list(f, items, ", ")?;
                write!(f, "]")
            }
            Expr::Subquery { query } => write!(f, "({})", query),
            Expr::Sequence { name, op } => {
                let op = match op {
                    SequenceOp::Next => "next",
                    SequenceOp::Current => "current",
                };
                write!(f, "sequence('{}').{}()", name, op)
            }
        }
    }
}

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Matches,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::Matches => "MATCHES",
        }
    }

    /// The operator with its operands swapped (`a < b` is `b > a`)
    pub fn flipped(&self) -> Option<CompareOp> {
        match self {
            CompareOp::Eq => Some(CompareOp::Eq),
            CompareOp::Ne => Some(CompareOp::Ne),
            CompareOp::Lt => Some(CompareOp::Gt),
            CompareOp::Le => Some(CompareOp::Ge),
            CompareOp::Gt => Some(CompareOp::Lt),
            CompareOp::Ge => Some(CompareOp::Le),
            CompareOp::Like | CompareOp::Matches => None,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge)
    }
}

/// A boolean filter condition, evaluated with three-valued logic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    And {
        items: Vec<Condition>,
    },
    Or {
        items: Vec<Condition>,
    },
    Not {
        item: Box<Condition>,
    },
    Compare {
        left: Expr,
        op: CompareOp,
        right: Expr,
    },
    /// Inclusive on both ends
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
    },
    /// `values` evaluates to a collection: a list, a parameter or a
    /// subquery
    In {
        expr: Expr,
        values: Expr,
        #[serde(default)]
        negated: bool,
    },
    /// The collection `expr` holds `value`
    Contains {
        expr: Expr,
        value: Expr,
    },
    /// The collection `expr` holds at least one of `values`
    ContainsAny {
        expr: Expr,
        values: Expr,
    },
    ContainsKey {
        expr: Expr,
        key: Expr,
    },
    ContainsValue {
        expr: Expr,
        value: Expr,
    },
    IsNull {
        expr: Expr,
    },
    IsNotNull {
        expr: Expr,
    },
    IsDefined {
        expr: Expr,
    },
    IsNotDefined {
        expr: Expr,
    },
    InstanceOf {
        class: String,
    },
    Constant {
        value: bool,
    },
}

impl Condition {
    pub fn and(items: Vec<Condition>) -> Self {
        Condition::And { items }
    }

    pub fn or(items: Vec<Condition>) -> Self {
        Condition::Or { items }
    }

    pub fn negate(item: Condition) -> Self {
        Condition::Not {
            item: Box::new(item),
        }
    }

    pub fn compare(left: Expr, op: CompareOp, right: Expr) -> Self {
        Condition::Compare { left, op, right }
    }

    /// `field = value`
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Condition::compare(Expr::field(field), CompareOp::Eq, Expr::literal(value))
    }

    /// `field <op> value`
    pub fn field(field: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::compare(Expr::field(field), op, Expr::literal(value))
    }

    pub fn between(field: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Condition::Between {
            expr: Expr::field(field),
            low: Expr::literal(low),
            high: Expr::literal(high),
        }
    }

    pub fn in_values(field: &str, values: Vec<Value>) -> Self {
        Condition::In {
            expr: Expr::field(field),
            values: Expr::literal(values),
            negated: false,
        }
    }

    pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Condition::And { items } | Condition::Or { items } => {
                items.iter().for_each(|c| c.collect_variables(out))
            }
            Condition::Not { item } => item.collect_variables(out),
            Condition::Compare { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Condition::Between { expr, low, high } => {
                expr.collect_variables(out);
                low.collect_variables(out);
                high.collect_variables(out);
            }
            Condition::In { expr, values, .. } | Condition::ContainsAny { expr, values } => {
                expr.collect_variables(out);
                values.collect_variables(out);
            }
            Condition::Contains { expr, value }
            | Condition::ContainsValue { expr, value }
            | Condition::ContainsKey { expr, key: value } => {
                expr.collect_variables(out);
                value.collect_variables(out);
            }
            Condition::IsNull { expr }
            | Condition::IsNotNull { expr }
            | Condition::IsDefined { expr }
            | Condition::IsNotDefined { expr } => expr.collect_variables(out),
            Condition::InstanceOf { .. } | Condition::Constant { .. } => {}
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.visit_exprs(&mut |e| found |= e.contains_aggregate());
        found
    }

    /// Calls `f` on every expression directly held by this condition tree
    pub fn visit_exprs(&self, f: &mut dyn FnMut(&Expr)) {
        match self {
            Condition::And { items } | Condition::Or { items } => {
                items.iter().for_each(|c| c.visit_exprs(f))
            }
            Condition::Not { item } => item.visit_exprs(f),
            Condition::Compare { left, right, .. } => {
                f(left);
                f(right);
            }
            Condition::Between { expr, low, high } => {
                f(expr);
                f(low);
                f(high);
            }
            Condition::In { expr, values, .. } | Condition::ContainsAny { expr, values } => {
                f(expr);
                f(values);
            }
            Condition::Contains { expr, value }
            | Condition::ContainsValue { expr, value }
            | Condition::ContainsKey { expr, key: value } => {
                f(expr);
                f(value);
            }
            Condition::IsNull { expr }
            | Condition::IsNotNull { expr }
            | Condition::IsDefined { expr }
            | Condition::IsNotDefined { expr } => f(expr),
            Condition::InstanceOf { .. } | Condition::Constant { .. } => {}
        }
    }

    pub(crate) fn references_parent(&self) -> bool {
        let mut found = false;
        self.visit_exprs(&mut |e| found |= e.references_parent());
        found
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::And { items } => {
                write!(f, "(")?;
                write_list(f, items, " AND ")?;
                write!(f, ")")
            }
            Condition::Or { items } => {
                write!(f, "(")?;
                write_list(f, items, " OR ")?;
                write!(f, ")")
            }
            Condition::Not { item } => write!(f, "NOT {}", item),
            Condition::Compare { left, op, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Condition::Between { expr, low, high } => {
                write!(f, "{} BETWEEN {} AND {}", expr, low, high)
            }
            Condition::In {
                expr,
                values,
                negated,
            } => {
                let op = if *negated { "NOT IN" } else { "IN" };
                write!(f, "{} {} {}", expr, op, values)
            }
            Condition::Contains { expr, value } => write!(f, "{} CONTAINS {}", expr, value),
            Condition::ContainsAny { expr, values } => write!(f, "{} CONTAINSANY {}", expr, values),
            Condition::ContainsKey { expr, key } => write!(f, "{} CONTAINSKEY {}", expr, key),
            Condition::ContainsValue { expr, value } => {
                write!(f, "{} CONTAINSVALUE {}", expr, value)
            }
            Condition::IsNull { expr } => write!(f, "{} IS NULL", expr),
            Condition::IsNotNull { expr } => write!(f, "{} IS NOT NULL", expr),
            Condition::IsDefined { expr } => write!(f, "{} IS DEFINED", expr),
            Condition::IsNotDefined { expr } => write!(f, "{} IS NOT DEFINED", expr),
            Condition::InstanceOf { class } => write!(f, "@this INSTANCEOF {}", class),
            Condition::Constant { value } => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_alias() {
        assert_eq!(Expr::field("address.city").default_alias(), "city");
        assert_eq!(Expr::count_star().default_alias(), "count");
        assert_eq!(
            Expr::binary(ArithOp::Add, Expr::field("a"), Expr::literal(1)).default_alias(),
            "a + 1"
        );
    }

    #[test]
    fn test_aggregate_detection() {
        assert!(Expr::count_star().is_aggregate_call());
        assert!(Expr::function("max", vec![Expr::field("a")]).is_aggregate_call());
        assert!(!Expr::function("max", vec![Expr::field("a"), Expr::field("b")]).is_aggregate_call());
        let nested = Expr::binary(
            ArithOp::Mul,
            Expr::function("sum", vec![Expr::field("a")]),
            Expr::literal(2),
        );
        assert!(nested.contains_aggregate());
        assert!(!nested.is_aggregate_call());
    }

    #[test]
    fn test_constant_and_row_dependency() {
        assert!(Expr::literal(3).is_constant());
        assert!(Expr::param(0).is_constant());
        assert!(!Expr::field("a").is_constant());
        assert!(Expr::field("a").depends_on_row());
        assert!(Expr::variable("$parent.$current.name").depends_on_row());
        assert!(!Expr::variable("$x").depends_on_row());
    }

    #[test]
    fn test_condition_json_shape() {
        let json = serde_json::json!({
            "kind": "compare",
            "left": {"kind": "field", "path": ["name"]},
            "op": "gt",
            "right": {"kind": "literal", "value": {"type": "string", "value": "name3"}}
        });
        let cond: Condition = serde_json::from_value(json).unwrap();
        assert_eq!(cond, Condition::field("name", CompareOp::Gt, "name3"));
        assert_eq!(cond.to_string(), "name > 'name3'");
    }

    #[test]
    fn test_collect_variables() {
        let cond = Condition::compare(
            Expr::variable("$a.b"),
            CompareOp::Eq,
            Expr::variable("$parent.$current.x"),
        );
        let mut vars = BTreeSet::new();
        cond.collect_variables(&mut vars);
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec!["a", "parent"]);
    }
}
