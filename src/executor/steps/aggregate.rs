//! Aggregation and GROUP BY
//!
//! Rows are grouped by the evaluated GROUP BY tuple, in order of first
//! appearance. Each aggregate call in the projection (or HAVING) gets one
//! accumulator per group; once the input is drained every call is
//! replaced by its result and the rest of the expression is evaluated
//! against the first row of the group.

use std::collections::BTreeMap;

use crate::planner::{Condition, Expr, ProjectionItem};
use crate::value::{ArithOp, OrdValue, Properties, Value};

use crate::executor::context::ExecutionContext;
use crate::executor::errors::{ExecResult, ExecutorError};
use crate::executor::eval::{eval_expr, matches};
use crate::executor::result::QueryResult;
use crate::executor::step::Upstream;
use crate::executor::stream::ExecutionStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

#[derive(Debug, Clone, PartialEq)]
struct AggregateCall {
    expr: Expr,
    function: Function,
    /// `None` for `count(*)`
    arg: Option<Expr>,
}

impl AggregateCall {
    fn from_expr(expr: &Expr) -> ExecResult<Self> {
        let Expr::Function { name, args } = expr else {
            return Err(ExecutorError::command(format!("{} is not an aggregate call", expr)));
        };
        let function = match name.to_ascii_lowercase().as_str() {
            "count" => Function::Count,
            "sum" => Function::Sum,
            "min" => Function::Min,
            "max" => Function::Max,
            "avg" => Function::Avg,
            other => return Err(ExecutorError::command(format!("unknown aggregate function {}()", other))),
        };
        let arg = match args.first() {
            None | Some(Expr::Star) => None,
            Some(arg) => Some(arg.clone()),
        };
        if function != Function::Count && arg.is_none() {
            return Err(ExecutorError::command(format!("{}() needs an argument", name)));
        }
        Ok(Self {
            expr: expr.clone(),
            function,
            arg,
        })
    }
}

#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    Sum(Option<Value>),
    Min(Option<Value>),
    Max(Option<Value>),
    Avg { sum: Option<Value>, count: i64 },
}

impl Accumulator {
    fn new(function: Function) -> Self {
        match function {
            Function::Count => Accumulator::Count(0),
            Function::Sum => Accumulator::Sum(None),
            Function::Min => Accumulator::Min(None),
            Function::Max => Accumulator::Max(None),
            Function::Avg => Accumulator::Avg { sum: None, count: 0 },
        }
    }

    /// `value` is `None` for `count(*)`
    fn add(&mut self, value: Option<Value>) -> ExecResult<()> {
        let value = match value {
            None => {
                if let Accumulator::Count(n) = self {
                    *n += 1;
                }
                return Ok(());
            }
            Some(Value::Null) => return Ok(()),
            Some(v) => v,
        };
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(sum) => *sum = Some(add(sum.take(), value)?),
            Accumulator::Min(best) => {
                if best.as_ref().map_or(true, |b| value.total_cmp(b).is_lt()) {
                    *best = Some(value);
                }
            }
            Accumulator::Max(best) => {
                if best.as_ref().map_or(true, |b| value.total_cmp(b).is_gt()) {
                    *best = Some(value);
                }
            }
            Accumulator::Avg { sum, count } => {
                *sum = Some(add(sum.take(), value)?);
                *count += 1;
            }
        }
        Ok(())
    }

    fn finish(self) -> ExecResult<Value> {
        Ok(match self {
            Accumulator::Count(n) => Value::Long(n),
            Accumulator::Sum(sum) | Accumulator::Min(sum) | Accumulator::Max(sum) => {
                sum.unwrap_or(Value::Null)
            }
            Accumulator::Avg { sum: Some(sum), count } if count > 0 => {
                sum.apply(ArithOp::Div, &Value::Long(count))?
            }
            Accumulator::Avg { .. } => Value::Null,
        })
    }
}

fn add(sum: Option<Value>, value: Value) -> ExecResult<Value> {
    match sum {
        None => Ok(value),
        Some(sum) => Ok(sum.apply(ArithOp::Add, &value)?),
    }
}

/// Collects aggregate calls in pre-order, without duplicates
fn collect_calls(expr: &Expr, out: &mut Vec<Expr>) {
    if expr.is_aggregate_call() {
        if !out.contains(expr) {
            out.push(expr.clone());
        }
        return;
    }
    match expr {
        Expr::Function { args, .. } => args.iter().for_each(|a| collect_calls(a, out)),
        Expr::Binary { left, right, .. } => {
            collect_calls(left, out);
            collect_calls(right, out);
        }
        Expr::Negate { expr } => collect_calls(expr, out),
        Expr::List { items } => items.iter().for_each(|i| collect_calls(i, out)),
        _ => {}
    }
}

/// Replaces aggregate calls by their computed values
fn substitute(expr: &Expr, calls: &[AggregateCall], values: &[Value]) -> Expr {
    if let Some(i) = calls.iter().position(|c| &c.expr == expr) {
        return Expr::Literal {
            value: values[i].clone(),
        };
    }
    match expr {
        Expr::Function { name, args } => Expr::Function {
            name: name.clone(),
            args: args.iter().map(|a| substitute(a, calls, values)).collect(),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(substitute(left, calls, values)),
            right: Box::new(substitute(right, calls, values)),
        },
        Expr::Negate { expr } => Expr::Negate {
            expr: Box::new(substitute(expr, calls, values)),
        },
        Expr::List { items } => Expr::List {
            items: items.iter().map(|i| substitute(i, calls, values)).collect(),
        },
        other => other.clone(),
    }
}

fn substitute_condition(cond: &Condition, calls: &[AggregateCall], values: &[Value]) -> Condition {
    let sub = |e: &Expr| substitute(e, calls, values);
    let sub_cond = |c: &Condition| substitute_condition(c, calls, values);
    match cond {
        Condition::And { items } => Condition::And {
            items: items.iter().map(sub_cond).collect(),
        },
        Condition::Or { items } => Condition::Or {
            items: items.iter().map(sub_cond).collect(),
        },
        Condition::Not { item } => Condition::Not {
            item: Box::new(sub_cond(item)),
        },
        Condition::Compare { left, op, right } => Condition::Compare {
            left: sub(left),
            op: *op,
            right: sub(right),
        },
        Condition::Between { expr, low, high } => Condition::Between {
            expr: sub(expr),
            low: sub(low),
            high: sub(high),
        },
        Condition::In { expr, values: list, negated } => Condition::In {
            expr: sub(expr),
            values: sub(list),
            negated: *negated,
        },
        Condition::Contains { expr, value } => Condition::Contains {
            expr: sub(expr),
            value: sub(value),
        },
        Condition::ContainsAny { expr, values: list } => Condition::ContainsAny {
            expr: sub(expr),
            values: sub(list),
        },
        Condition::ContainsKey { expr, key } => Condition::ContainsKey {
            expr: sub(expr),
            key: sub(key),
        },
        Condition::ContainsValue { expr, value } => Condition::ContainsValue {
            expr: sub(expr),
            value: sub(value),
        },
        Condition::IsNull { expr } => Condition::IsNull { expr: sub(expr) },
        Condition::IsNotNull { expr } => Condition::IsNotNull { expr: sub(expr) },
        Condition::IsDefined { expr } => Condition::IsDefined { expr: sub(expr) },
        Condition::IsNotDefined { expr } => Condition::IsNotDefined { expr: sub(expr) },
        Condition::InstanceOf { .. } | Condition::Constant { .. } => cond.clone(),
    }
}

struct Group {
    first: QueryResult,
    accumulators: Vec<Accumulator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStep {
    pub projection: Vec<ProjectionItem>,
    pub group_by: Vec<Expr>,
    pub having: Option<Condition>,
}

impl AggregateStep {
    fn calls(&self) -> ExecResult<Vec<AggregateCall>> {
        let mut exprs = Vec::new();
        for item in &self.projection {
            collect_calls(&item.expr, &mut exprs);
        }
        if let Some(having) = &self.having {
            having.visit_exprs(&mut |e| collect_calls(e, &mut exprs));
        }
        exprs.iter().map(AggregateCall::from_expr).collect()
    }

    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let calls = self.calls()?;
        let max_groups = ctx.config().max_heap_elements_per_operation;
        let mut groups: Vec<Group> = Vec::new();
        let mut index: BTreeMap<Vec<OrdValue>, usize> = BTreeMap::new();

        let mut stream = upstream.start(ctx)?;
        while let Some(row) = stream.next_row(ctx)? {
            let mut key = Vec::with_capacity(self.group_by.len());
            for expr in &self.group_by {
                key.push(OrdValue(eval_expr(expr, Some(&row), ctx)?));
            }
            let slot = match index.get(&key) {
                Some(slot) => *slot,
                None => {
                    if groups.len() >= max_groups {
                        return Err(ExecutorError::resource_limit(format!(
                            "GROUP BY exceeded {} in-memory groups",
                            max_groups
                        )));
                    }
                    groups.push(Group {
                        first: row.clone(),
                        accumulators: calls.iter().map(|c| Accumulator::new(c.function)).collect(),
                    });
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            for (call, acc) in calls.iter().zip(groups[slot].accumulators.iter_mut()) {
                let value = match &call.arg {
                    Some(arg) => Some(eval_expr(arg, Some(&row), ctx)?),
                    None => None,
                };
                acc.add(value)?;
            }
        }
        stream.close(ctx);

        if groups.is_empty() && self.group_by.is_empty() {
            groups.push(Group {
                first: QueryResult::projection(Properties::new()),
                accumulators: calls.iter().map(|c| Accumulator::new(c.function)).collect(),
            });
        }

        let mut rows = Vec::with_capacity(groups.len());
        for group in groups {
            let values = group
                .accumulators
                .into_iter()
                .map(Accumulator::finish)
                .collect::<ExecResult<Vec<_>>>()?;
            let mut props = Properties::with_capacity(self.projection.len());
            for item in &self.projection {
                let expr = substitute(&item.expr, &calls, &values);
                props.set(item.output_name(), eval_expr(&expr, Some(&group.first), ctx)?);
            }
            if let Some(having) = &self.having {
                let mut overlay = group.first.to_internal();
                for (name, value) in props.iter() {
                    overlay.set_property(name, value.clone());
                }
                let cond = substitute_condition(having, &calls, &values);
                if !matches(&cond, Some(&QueryResult::Internal(overlay)), ctx)? {
                    continue;
                }
            }
            rows.push(QueryResult::projection(props));
        }
        Ok(ExecutionStream::from_rows(rows))
    }

    pub fn details(&self) -> String {
        let items: Vec<String> = self
            .projection
            .iter()
            .map(|p| format!("{} AS {}", p.expr, p.output_name()))
            .collect();
        let mut out = items.join(", ");
        if !self.group_by.is_empty() {
            let keys: Vec<String> = self.group_by.iter().map(Expr::to_string).collect();
            out.push_str(&format!("\nGROUP BY {}", keys.join(", ")));
        }
        if let Some(having) = &self.having {
            out.push_str(&format!("\nHAVING {}", having));
        }
        out
    }
}
