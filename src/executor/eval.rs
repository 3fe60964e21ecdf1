//! Expression and condition evaluation
//!
//! Conditions use three-valued logic: `Some(true)`, `Some(false)` or
//! `None` (unknown, e.g. a comparison against null). Filters keep a row
//! only on `Some(true)`.

use std::cmp::Ordering;

use crate::planner::{CompareOp, Condition, Expr, SelectPlanner, SelectStatement, SequenceOp};
use crate::storage::RecordId;
use crate::value::Value;

use super::context::{ExecutionContext, ScopeId};
use super::errors::{ExecResult, ExecutorError};
use super::result::QueryResult;

/// Evaluates an expression against an optional row
pub fn eval_expr(
    expr: &Expr,
    row: Option<&QueryResult>,
    ctx: &mut ExecutionContext,
) -> ExecResult<Value> {
    match expr {
        Expr::Literal { value } => Ok(value.clone()),
        Expr::Field { path } => match row {
            Some(row) => resolve_path(row, path, ctx),
            None => Ok(Value::Null),
        },
        Expr::PositionalParam { index } => ctx
            .params()
            .positional
            .get(*index)
            .cloned()
            .ok_or_else(|| ExecutorError::command(format!("missing positional parameter {}", index))),
        Expr::NamedParam { name } => ctx
            .params()
            .named
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutorError::command(format!("missing parameter :{}", name))),
        Expr::Variable { name, path } => eval_variable(name, path, row, ctx),
        Expr::Function { name, args } => eval_function(name, args, row, ctx),
        Expr::Star => Ok(row.map(row_value).unwrap_or(Value::Null)),
        Expr::Binary { op, left, right } => {
            let l = eval_expr(left, row, ctx)?;
            let r = eval_expr(right, row, ctx)?;
            Ok(l.apply(*op, &r)?)
        }
        Expr::Negate { expr } => Ok(eval_expr(expr, row, ctx)?.negate()?),
        Expr::List { items } => items
            .iter()
            .map(|item| eval_expr(item, row, ctx))
            .collect::<ExecResult<Vec<_>>>()
            .map(Value::List),
        Expr::Subquery { query } => {
            let rows = run_subquery(query, row, ctx)?;
            Ok(Value::List(rows.iter().map(subquery_row_value).collect()))
        }
        Expr::Sequence { name, op } => {
            let metadata = ctx.session().metadata();
            let value = match op {
                SequenceOp::Next => metadata.next_value(name),
                SequenceOp::Current => metadata.current_value(name),
            }?;
            Ok(Value::Long(value))
        }
    }
}

/// Evaluates a condition with three-valued logic
pub fn eval_condition(
    cond: &Condition,
    row: Option<&QueryResult>,
    ctx: &mut ExecutionContext,
) -> ExecResult<Option<bool>> {
    match cond {
        Condition::And { items } => {
            let mut unknown = false;
            for item in items {
                match eval_condition(item, row, ctx)? {
                    Some(false) => return Ok(Some(false)),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            Ok(if unknown { None } else { Some(true) })
        }
        Condition::Or { items } => {
            let mut unknown = false;
            for item in items {
                match eval_condition(item, row, ctx)? {
                    Some(true) => return Ok(Some(true)),
                    None => unknown = true,
                    Some(false) => {}
                }
            }
            Ok(if unknown { None } else { Some(false) })
        }
        Condition::Not { item } => Ok(eval_condition(item, row, ctx)?.map(|b| !b)),
        Condition::Compare { left, op, right } => {
            let l = eval_expr(left, row, ctx)?;
            let r = eval_expr(right, row, ctx)?;
            compare(&l, *op, &r, ctx)
        }
        Condition::Between { expr, low, high } => {
            let v = eval_expr(expr, row, ctx)?;
            let lo = eval_expr(low, row, ctx)?;
            let hi = eval_expr(high, row, ctx)?;
            Ok(match (v.sql_compare(&lo), v.sql_compare(&hi)) {
                (Some(a), Some(b)) => Some(a != Ordering::Less && b != Ordering::Greater),
                _ => None,
            })
        }
        Condition::In {
            expr,
            values,
            negated,
        } => {
            let v = eval_expr(expr, row, ctx)?;
            let candidates = eval_expr(values, row, ctx)?.into_elements();
            let found = contains_value(&candidates, &v);
            Ok(if *negated { found.map(|b| !b) } else { found })
        }
        Condition::Contains { expr, value } => {
            let collection = eval_expr(expr, row, ctx)?;
            let needle = eval_expr(value, row, ctx)?;
            Ok(match collection {
                Value::List(items) => contains_value(&items, &needle),
                Value::Null => None,
                _ => Some(false),
            })
        }
        Condition::ContainsAny { expr, values } => {
            let collection = eval_expr(expr, row, ctx)?;
            let needles = eval_expr(values, row, ctx)?.into_elements();
            Ok(match collection {
                Value::List(items) => {
                    Some(needles.iter().any(|p| contains_value(&items, p) == Some(true)))
                }
                Value::Null => None,
                _ => Some(false),
            })
        }
        Condition::ContainsKey { expr, key } => {
            let map = eval_expr(expr, row, ctx)?;
            let key = eval_expr(key, row, ctx)?;
            Ok(match (&map, key.as_str()) {
                (Value::Null, _) | (_, None) => None,
                (_, Some(k)) => Some(map.member(k).is_some()),
            })
        }
        Condition::ContainsValue { expr, value } => {
            let map = eval_expr(expr, row, ctx)?;
            let needle = eval_expr(value, row, ctx)?;
            Ok(match map {
                Value::Map(entries) => {
                    let values: Vec<Value> = entries.into_values().collect();
                    contains_value(&values, &needle)
                }
                Value::Embedded(props) => {
                    let values: Vec<Value> = props.into_iter().map(|(_, v)| v).collect();
                    contains_value(&values, &needle)
                }
                Value::Null => None,
                _ => Some(false),
            })
        }
        Condition::IsNull { expr } => Ok(Some(eval_expr(expr, row, ctx)?.is_null())),
        Condition::IsNotNull { expr } => Ok(Some(!eval_expr(expr, row, ctx)?.is_null())),
        Condition::IsDefined { expr } => Ok(Some(is_defined(expr, row, ctx)?)),
        Condition::IsNotDefined { expr } => Ok(Some(!is_defined(expr, row, ctx)?)),
        Condition::InstanceOf { class } => {
            let own = match row.and_then(QueryResult::class_name) {
                Some(own) => own.to_string(),
                None => return Ok(Some(false)),
            };
            Ok(Some(ctx.session().schema().is_subclass_of(&own, class)?))
        }
        Condition::Constant { value } => Ok(Some(*value)),
    }
}

/// True only when the condition evaluates to `Some(true)`
pub fn matches(
    cond: &Condition,
    row: Option<&QueryResult>,
    ctx: &mut ExecutionContext,
) -> ExecResult<bool> {
    Ok(eval_condition(cond, row, ctx)? == Some(true))
}

fn compare(l: &Value, op: CompareOp, r: &Value, ctx: &mut ExecutionContext) -> ExecResult<Option<bool>> {
    Ok(match op {
        CompareOp::Eq => l.sql_equals(r),
        CompareOp::Ne => l.sql_equals(r).map(|b| !b),
        CompareOp::Lt => l.sql_compare(r).map(|o| o == Ordering::Less),
        CompareOp::Le => l.sql_compare(r).map(|o| o != Ordering::Greater),
        CompareOp::Gt => l.sql_compare(r).map(|o| o == Ordering::Greater),
        CompareOp::Ge => l.sql_compare(r).map(|o| o != Ordering::Less),
        CompareOp::Like => match (l.as_str(), r.as_str()) {
            (Some(text), Some(pattern)) => Some(ctx.regex(&like_to_regex(pattern))?.is_match(text)),
            _ => None,
        },
        CompareOp::Matches => match (l.as_str(), r.as_str()) {
            (Some(text), Some(pattern)) => {
                Some(ctx.regex(&format!("^(?:{})$", pattern))?.is_match(text))
            }
            _ => None,
        },
    })
}

/// `%` matches any run of characters, `_` exactly one
pub(crate) fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

fn contains_value(items: &[Value], needle: &Value) -> Option<bool> {
    if needle.is_null() {
        return None;
    }
    Some(items.iter().any(|item| item.sql_equals(needle) == Some(true)))
}

fn is_defined(expr: &Expr, row: Option<&QueryResult>, ctx: &mut ExecutionContext) -> ExecResult<bool> {
    match (expr.as_plain_field(), row) {
        (Some(field), Some(row)) => Ok(row.properties().contains(field)),
        _ => Ok(!eval_expr(expr, row, ctx)?.is_null()),
    }
}

/// The value `@this` / `$current` stands for
pub(crate) fn row_value(row: &QueryResult) -> Value {
    Value::Embedded(row.properties().clone())
}

/// Subquery rows as values: single-column projections unwrap to their
/// value, records become links, anything else an embedded row
fn subquery_row_value(row: &QueryResult) -> Value {
    if row.is_entity() {
        if let Some(rid) = row.identity() {
            return Value::Link(rid);
        }
    }
    let props = row.properties();
    if props.len() == 1 {
        if let Some((_, value)) = props.iter().next() {
            return value.clone();
        }
    }
    Value::Embedded(props.clone())
}

fn attribute(row: &QueryResult, name: &str) -> Option<Value> {
    match name.to_ascii_lowercase().as_str() {
        "@rid" => Some(row.identity().map(Value::Link).unwrap_or(Value::Null)),
        "@class" => Some(row.class_name().map(Value::from).unwrap_or(Value::Null)),
        "@version" => Some(
            row.version()
                .map(|v| Value::Long(i64::from(v)))
                .unwrap_or(Value::Null),
        ),
        "@this" => Some(row_value(row)),
        _ => None,
    }
}

/// Resolves a dotted path against a row
pub(crate) fn resolve_path(row: &QueryResult, path: &[String], ctx: &mut ExecutionContext) -> ExecResult<Value> {
    let Some((first, rest)) = path.split_first() else {
        return Ok(Value::Null);
    };
    let head = match attribute(row, first) {
        Some(v) => v,
        None => row.property(first).cloned().unwrap_or(Value::Null),
    };
    navigate(head, rest, ctx)
}

/// Follows the remaining path segments through embedded values, maps,
/// links and lists
fn navigate(mut value: Value, path: &[String], ctx: &mut ExecutionContext) -> ExecResult<Value> {
    for (i, segment) in path.iter().enumerate() {
        value = match value {
            Value::Null => return Ok(Value::Null),
            Value::Embedded(_) | Value::Map(_) => value.member(segment).cloned().unwrap_or(Value::Null),
            Value::Link(rid) => link_member(rid, segment, ctx)?,
            Value::List(items) => {
                let rest = &path[i..];
                let mapped = items
                    .into_iter()
                    .map(|item| navigate(item, rest, ctx))
                    .collect::<ExecResult<Vec<_>>>()?;
                return Ok(Value::List(mapped));
            }
            _ => return Ok(Value::Null),
        };
    }
    Ok(value)
}

fn link_member(rid: RecordId, segment: &str, ctx: &mut ExecutionContext) -> ExecResult<Value> {
    let Some(record) = ctx.session().fetch_record(rid)? else {
        return Ok(Value::Null);
    };
    let row = QueryResult::entity(record);
    Ok(match attribute(&row, segment) {
        Some(v) => v,
        None => row.property(segment).cloned().unwrap_or(Value::Null),
    })
}

enum Cursor {
    Scope(ScopeId),
    Row(QueryResult),
    Value(Value),
}

fn eval_variable(
    name: &str,
    path: &[String],
    row: Option<&QueryResult>,
    ctx: &mut ExecutionContext,
) -> ExecResult<Value> {
    let active = ctx.active_scope();
    let mut cursor = match name.to_ascii_lowercase().as_str() {
        "current" => match row {
            Some(row) => Cursor::Row(row.clone()),
            None => match ctx.current_in(active) {
                Some(r) => Cursor::Row(r.clone()),
                None => Cursor::Value(Value::Null),
            },
        },
        "parent" => match ctx.parent_of(active) {
            Some(parent) => Cursor::Scope(parent),
            None => Cursor::Value(Value::Null),
        },
        other => {
            let per_row = row.and_then(|r| r.metadata(other)).cloned();
            match per_row.or_else(|| ctx.variable(other).cloned()) {
                Some(v) => Cursor::Value(v),
                None => Cursor::Value(Value::Null),
            }
        }
    };

    for (i, segment) in path.iter().enumerate() {
        cursor = match cursor {
            Cursor::Scope(scope) => match segment.to_ascii_lowercase().as_str() {
                "$current" => match ctx.current_in(scope) {
                    Some(r) => Cursor::Row(r.clone()),
                    None => Cursor::Value(Value::Null),
                },
                "$parent" => match ctx.parent_of(scope) {
                    Some(p) => Cursor::Scope(p),
                    None => Cursor::Value(Value::Null),
                },
                var => {
                    let var = var.trim_start_matches('$');
                    Cursor::Value(ctx.variable_in(scope, var).cloned().unwrap_or(Value::Null))
                }
            },
            Cursor::Row(r) => {
                let end = path[i..]
                    .iter()
                    .position(|s| s.starts_with('$'))
                    .map(|p| i + p)
                    .unwrap_or(path.len());
                let value = resolve_path(&r, &path[i..end], ctx)?;
                return navigate(value, &path[end..], ctx);
            }
            Cursor::Value(v) => return navigate(v, &path[i..], ctx),
        };
    }

    Ok(match cursor {
        Cursor::Scope(_) => Value::Null,
        Cursor::Row(r) => row_value(&r),
        Cursor::Value(v) => v,
    })
}

fn eval_function(
    name: &str,
    args: &[Expr],
    row: Option<&QueryResult>,
    ctx: &mut ExecutionContext,
) -> ExecResult<Value> {
    let lname = name.to_ascii_lowercase();
    if matches!(lname.as_str(), "count" | "sum" | "avg") || (matches!(lname.as_str(), "min" | "max") && args.len() <= 1) {
        return Err(ExecutorError::command(format!(
            "aggregate function {}() used outside of an aggregation",
            name
        )));
    }
    let values = args
        .iter()
        .map(|a| eval_expr(a, row, ctx))
        .collect::<ExecResult<Vec<_>>>()?;
    let arity = |n: usize| -> ExecResult<()> {
        if values.len() == n {
            Ok(())
        } else {
            Err(ExecutorError::command(format!(
                "{}() expects {} argument(s), got {}",
                name,
                n,
                values.len()
            )))
        }
    };
    match lname.as_str() {
        "ifnull" => {
            arity(2)?;
            Ok(if values[0].is_null() { values[1].clone() } else { values[0].clone() })
        }
        "coalesce" => Ok(values.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        "size" => {
            arity(1)?;
            Ok(match &values[0] {
                Value::Null => Value::Int(0),
                v => Value::Int(i32::try_from(v.size()).unwrap_or(i32::MAX)),
            })
        }
        "uppercase" | "lowercase" => {
            arity(1)?;
            Ok(match &values[0] {
                Value::String(s) if lname == "uppercase" => Value::String(s.to_uppercase()),
                Value::String(s) => Value::String(s.to_lowercase()),
                Value::Null => Value::Null,
                other => {
                    return Err(ExecutorError::type_conversion(format!(
                        "{}() expects a string, got {}",
                        name,
                        other.type_name()
                    )))
                }
            })
        }
        "abs" => {
            arity(1)?;
            let v = &values[0];
            match v.sql_compare(&Value::Int(0)) {
                Some(Ordering::Less) => Ok(v.negate()?),
                Some(_) => Ok(v.clone()),
                None if v.is_null() => Ok(Value::Null),
                None => Err(ExecutorError::type_conversion(format!(
                    "abs() expects a number, got {}",
                    v.type_name()
                ))),
            }
        }
        "min" | "max" => {
            let want = if lname == "min" { Ordering::Less } else { Ordering::Greater };
            let mut best: Option<Value> = None;
            for v in values.into_iter().filter(|v| !v.is_null()) {
                best = match best {
                    Some(b) if v.sql_compare(&b) != Some(want) => Some(b),
                    _ => Some(v),
                };
            }
            Ok(best.unwrap_or(Value::Null))
        }
        _ => Err(ExecutorError::command(format!("unknown function {}()", name))),
    }
}

/// Runs a subquery in a child scope whose parent's `$current` is `row`
pub(crate) fn run_subquery(
    query: &SelectStatement,
    row: Option<&QueryResult>,
    ctx: &mut ExecutionContext,
) -> ExecResult<Vec<QueryResult>> {
    if let Some(row) = row {
        ctx.set_current(Some(row.clone()));
    }
    let previous = ctx.enter_child();
    let outcome = plan_and_collect(query, ctx);
    ctx.exit_child(previous);
    outcome
}

fn plan_and_collect(query: &SelectStatement, ctx: &mut ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let plan = SelectPlanner::new(ctx.session(), ctx.config()).plan(query)?;
    let mut stream = plan.start(ctx)?;
    stream.collect_all(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Database, SequenceDef};
    use crate::executor::config::EngineConfig;
    use crate::executor::context::Parameters;
    use crate::value::{ArithOp, Properties};
    use std::sync::Arc;

    fn ctx() -> ExecutionContext {
        let db = Database::new("eval").unwrap();
        ExecutionContext::new(db.session(), Arc::new(EngineConfig::default()))
    }

    fn person() -> QueryResult {
        let address: Properties = [("city", Value::from("Rome"))].into_iter().collect();
        QueryResult::projection(
            [
                ("name", Value::from("Ada")),
                ("age", Value::Int(36)),
                ("nick", Value::Null),
                ("address", Value::Embedded(address)),
                ("tags", Value::List(vec![Value::from("a"), Value::from("b")])),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn test_field_paths() {
        let mut ctx = ctx();
        let row = person();
        let city = eval_expr(&Expr::field("address.city"), Some(&row), &mut ctx).unwrap();
        assert_eq!(city, Value::from("Rome"));
        let missing = eval_expr(&Expr::field("address.zip"), Some(&row), &mut ctx).unwrap();
        assert_eq!(missing, Value::Null);
    }

    #[test]
    fn test_three_valued_logic() {
        let mut ctx = ctx();
        let row = person();
        let null_cmp = Condition::field("nick", CompareOp::Eq, "x");
        assert_eq!(eval_condition(&null_cmp, Some(&row), &mut ctx).unwrap(), None);
        let not_null_cmp = Condition::negate(null_cmp.clone());
        assert_eq!(eval_condition(&not_null_cmp, Some(&row), &mut ctx).unwrap(), None);
        let or = Condition::or(vec![null_cmp.clone(), Condition::field("age", CompareOp::Gt, 30)]);
        assert_eq!(eval_condition(&or, Some(&row), &mut ctx).unwrap(), Some(true));
        let and = Condition::and(vec![null_cmp, Condition::field("age", CompareOp::Lt, 30)]);
        assert_eq!(eval_condition(&and, Some(&row), &mut ctx).unwrap(), Some(false));
    }

    #[test]
    fn test_like_and_matches() {
        let mut ctx = ctx();
        let row = person();
        assert!(matches(&Condition::field("name", CompareOp::Like, "A%"), Some(&row), &mut ctx).unwrap());
        assert!(matches(&Condition::field("name", CompareOp::Like, "_da"), Some(&row), &mut ctx).unwrap());
        assert!(!matches(&Condition::field("name", CompareOp::Like, "a.a"), Some(&row), &mut ctx).unwrap());
        assert!(matches(&Condition::field("name", CompareOp::Matches, "[A-Z]d+a"), Some(&row), &mut ctx).unwrap());
    }

    #[test]
    fn test_collection_operators() {
        let mut ctx = ctx();
        let row = person();
        let contains = Condition::Contains {
            expr: Expr::field("tags"),
            value: Expr::literal("b"),
        };
        assert!(matches(&contains, Some(&row), &mut ctx).unwrap());
        let any = Condition::ContainsAny {
            expr: Expr::field("tags"),
            values: Expr::literal(vec![Value::from("z"), Value::from("a")]),
        };
        assert!(matches(&any, Some(&row), &mut ctx).unwrap());
        let in_list = Condition::in_values("age", vec![Value::Long(36), Value::Long(40)]);
        assert!(matches(&in_list, Some(&row), &mut ctx).unwrap());
        let defined = Condition::IsDefined { expr: Expr::field("nick") };
        assert!(matches(&defined, Some(&row), &mut ctx).unwrap());
        let is_null = Condition::IsNull { expr: Expr::field("missing") };
        assert!(matches(&is_null, Some(&row), &mut ctx).unwrap());
    }

    #[test]
    fn test_parameters_and_arithmetic() {
        let mut ctx = ctx().with_params(Parameters::positional(vec![Value::Int(4)]).with_named("n", 2));
        let expr = Expr::binary(ArithOp::Mul, Expr::param(0), Expr::named_param("n"));
        assert_eq!(eval_expr(&expr, None, &mut ctx).unwrap(), Value::Int(8));
        assert!(eval_expr(&Expr::param(3), None, &mut ctx).is_err());
    }

    #[test]
    fn test_scalar_functions() {
        let mut ctx = ctx();
        let row = person();
        let f = |name: &str, args: Vec<Expr>| Expr::function(name, args);
        assert_eq!(
            eval_expr(&f("ifnull", vec![Expr::field("nick"), Expr::literal("none")]), Some(&row), &mut ctx).unwrap(),
            Value::from("none")
        );
        assert_eq!(eval_expr(&f("size", vec![Expr::field("tags")]), Some(&row), &mut ctx).unwrap(), Value::Int(2));
        assert_eq!(
            eval_expr(&f("uppercase", vec![Expr::field("name")]), Some(&row), &mut ctx).unwrap(),
            Value::from("ADA")
        );
        assert_eq!(eval_expr(&f("abs", vec![Expr::literal(-3)]), None, &mut ctx).unwrap(), Value::Int(3));
        assert_eq!(
            eval_expr(&f("max", vec![Expr::literal(1), Expr::literal(7), Expr::literal(3)]), None, &mut ctx).unwrap(),
            Value::Int(7)
        );
        assert!(eval_expr(&Expr::count_star(), Some(&row), &mut ctx).is_err());
    }

    #[test]
    fn test_sequence_functions() {
        let mut ctx = ctx();
        ctx.session().metadata().create_sequence(SequenceDef::new("seq")).unwrap();
        let next = Expr::sequence("seq", SequenceOp::Next);
        assert_eq!(eval_expr(&next, None, &mut ctx).unwrap(), Value::Long(1));
        assert_eq!(eval_expr(&next, None, &mut ctx).unwrap(), Value::Long(2));
        let current = Expr::sequence("seq", SequenceOp::Current);
        assert_eq!(eval_expr(&current, None, &mut ctx).unwrap(), Value::Long(2));
    }

    #[test]
    fn test_parent_current_resolution() {
        let mut ctx = ctx();
        ctx.set_current(Some(person()));
        let previous = ctx.enter_child();
        let expr = Expr::variable("$parent.$current.address.city");
        assert_eq!(eval_expr(&expr, None, &mut ctx).unwrap(), Value::from("Rome"));
        ctx.exit_child(previous);
    }

    #[test]
    fn test_like_pattern_escapes_regex_chars() {
        assert_eq!(like_to_regex("a.b%"), "(?s)^a\\.b.*$");
    }
}
