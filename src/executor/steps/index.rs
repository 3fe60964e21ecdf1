//! Index access steps
//!
//! [`FetchFromIndexStep`] yields internal `{key, rid}` rows; the record
//! itself is loaded by [`GetValueFromIndexEntryStep`]. Key values are
//! expressions evaluated when the step starts, so parameters and global
//! LET variables can feed an index lookup.

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::index::{IndexCursor, IndexDefinition, IndexKey, KeyBound, KeyRange};
use crate::planner::Expr;
use crate::storage::{RecordId, ScanDirection};
use crate::value::{Properties, Value};

use crate::executor::context::ExecutionContext;
use crate::executor::errors::{ExecResult, ExecutorError};
use crate::executor::eval::eval_expr;
use crate::executor::result::QueryResult;
use crate::executor::step::Upstream;
use crate::executor::stream::{ExecutionStream, RowProducer};

/// Value constraint on one key position
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    /// `field = expr`
    Value(Expr),
    /// `field IN expr`, `CONTAINSANY expr`: one lookup per element
    AnyOf(Expr),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Value(expr) => write!(f, "= {}", expr),
            KeyPart::AnyOf(expr) => write!(f, "IN {}", expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeBound {
    pub expr: Expr,
    pub inclusive: bool,
}

/// Equality constraints on a key prefix, optionally followed by a range
/// on the next key field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexKeyCondition {
    pub equalities: Vec<KeyPart>,
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
}

impl IndexKeyCondition {
    pub fn has_range(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }

    /// Number of key fields the condition constrains
    pub fn width(&self) -> usize {
        self.equalities.len() + usize::from(self.has_range())
    }

    /// Rendering with the index field names, e.g. `a = 1 AND b > 2`
    pub fn render(&self, fields: &[String]) -> String {
        let field = |i: usize| fields.get(i).map(String::as_str).unwrap_or("?");
        let mut parts: Vec<String> = self
            .equalities
            .iter()
            .enumerate()
            .map(|(i, part)| format!("{} {}", field(i), part))
            .collect();
        let pos = self.equalities.len();
        if let Some(lower) = &self.lower {
            let op = if lower.inclusive { ">=" } else { ">" };
            parts.push(format!("{} {} {}", field(pos), op, lower.expr));
        }
        if let Some(upper) = &self.upper {
            let op = if upper.inclusive { "<=" } else { "<" };
            parts.push(format!("{} {} {}", field(pos), op, upper.expr));
        }
        parts.join(" AND ")
    }
}

/// Evaluated bounds of a range part
#[derive(Debug, Clone)]
struct EvaluatedRange {
    lower: Option<(Value, bool)>,
    upper: Option<(Value, bool)>,
}

impl EvaluatedRange {
    /// SQL comparison of a key part against the bounds; keys of another
    /// type than the bound do not match
    fn admits(&self, part: &Value) -> bool {
        let lower_ok = match &self.lower {
            None => true,
            Some((bound, inclusive)) => match part.sql_compare(bound) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => *inclusive,
                _ => false,
            },
        };
        let upper_ok = match &self.upper {
            None => true,
            Some((bound, inclusive)) => match part.sql_compare(bound) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => *inclusive,
                _ => false,
            },
        };
        lower_ok && upper_ok
    }
}

/// Iterates the entries of an index within a key condition
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFromIndexStep {
    pub index: IndexDefinition,
    /// `None` walks the whole index
    pub condition: Option<IndexKeyCondition>,
    pub direction: ScanDirection,
    /// True when the index order makes an ORDER BY step unnecessary
    pub replaced_order_by: bool,
}

impl FetchFromIndexStep {
    pub fn full(index: IndexDefinition, direction: ScanDirection) -> Self {
        Self {
            index,
            condition: None,
            direction,
            replaced_order_by: false,
        }
    }

    fn convert(&self, position: usize, value: &Value) -> ExecResult<Value> {
        Ok(self.index.convert_key_part(position, value)?)
    }

    /// Every key prefix the equality parts select, in scan order
    fn prefixes(&self, cond: &IndexKeyCondition, ctx: &mut ExecutionContext) -> ExecResult<Vec<Vec<Value>>> {
        let mut prefixes: Vec<Vec<Value>> = vec![Vec::new()];
        for (position, part) in cond.equalities.iter().enumerate() {
            let candidates = match part {
                KeyPart::Value(expr) => vec![eval_expr(expr, None, ctx)?],
                KeyPart::AnyOf(expr) => eval_expr(expr, None, ctx)?.into_elements(),
            };
            let mut converted = Vec::with_capacity(candidates.len());
            for candidate in candidates.iter().filter(|v| !v.is_null()) {
                converted.push(self.convert(position, candidate)?);
            }
            prefixes = prefixes
                .into_iter()
                .flat_map(|prefix| {
                    converted.iter().map(move |value| {
                        let mut next = prefix.clone();
                        next.push(value.clone());
                        next
                    })
                })
                .collect();
        }
        prefixes.sort_by(|a, b| IndexKey::new(a.clone()).cmp(&IndexKey::new(b.clone())));
        prefixes.dedup_by(|a, b| IndexKey::new(a.clone()) == IndexKey::new(b.clone()));
        if self.direction == ScanDirection::Descending {
            prefixes.reverse();
        }
        Ok(prefixes)
    }

    fn eval_bound(
        &self,
        bound: &Option<RangeBound>,
        position: usize,
        ctx: &mut ExecutionContext,
    ) -> ExecResult<Option<Option<(Value, bool)>>> {
        let Some(bound) = bound else {
            return Ok(Some(None));
        };
        let value = eval_expr(&bound.expr, None, ctx)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(Some((self.convert(position, &value)?, bound.inclusive))))
    }

    /// `Ok(None)` when a bound is null and nothing can match
    fn evaluate_range(
        &self,
        cond: &IndexKeyCondition,
        ctx: &mut ExecutionContext,
    ) -> ExecResult<Option<Option<EvaluatedRange>>> {
        if !cond.has_range() {
            return Ok(Some(None));
        }
        let position = cond.equalities.len();
        let Some(lower) = self.eval_bound(&cond.lower, position, ctx)? else {
            return Ok(None);
        };
        let Some(upper) = self.eval_bound(&cond.upper, position, ctx)? else {
            return Ok(None);
        };
        Ok(Some(Some(EvaluatedRange { lower, upper })))
    }

    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        ctx.metrics().increment_index_fetches();
        let (ranges, check) = match &self.condition {
            None => (vec![Lookup::Range(KeyRange::all())], None),
            Some(cond) => {
                let Some(range) = self.evaluate_range(cond, ctx)? else {
                    return Ok(ExecutionStream::empty());
                };
                let prefixes = self.prefixes(cond, ctx)?;
                let hash = self.index.index_type.is_hash();
                let ranges = prefixes
                    .into_iter()
                    .map(|prefix| {
                        if hash {
                            Lookup::Equality(prefix)
                        } else {
                            Lookup::Range(key_range(prefix, range.as_ref()))
                        }
                    })
                    .collect();
                (ranges, range.map(|r| (cond.equalities.len(), r)))
            }
        };
        let dedupe = ranges.len() > 1 || self.index.is_multi_value();
        Ok(ExecutionStream::from_producer(IndexScan {
            index: self.index.name.clone(),
            direction: self.direction,
            ranges: ranges.into(),
            cursor: None,
            check,
            seen: dedupe.then(HashSet::new),
        }))
    }

    pub fn details(&self) -> String {
        let mut out = format!("index: {} ({})", self.index.name, self.index.index_type.name());
        if let Some(cond) = &self.condition {
            out.push_str(&format!("\nkey: {}", cond.render(&self.index.fields)));
        }
        if self.direction == ScanDirection::Descending {
            out.push_str("\ndescending");
        }
        if self.replaced_order_by {
            out.push_str("\nreplaces ORDER BY");
        }
        out
    }
}

fn key_range(prefix: Vec<Value>, range: Option<&EvaluatedRange>) -> KeyRange {
    let Some(range) = range else {
        return KeyRange::prefix(prefix);
    };
    let with = |value: &Value| {
        let mut parts = prefix.clone();
        parts.push(value.clone());
        parts
    };
    let lower = match &range.lower {
        Some((value, inclusive)) => Some(KeyBound {
            parts: with(value),
            inclusive: *inclusive,
        }),
        None if !prefix.is_empty() => Some(KeyBound::inclusive(prefix.clone())),
        None => None,
    };
    let upper = match &range.upper {
        Some((value, inclusive)) => Some(KeyBound {
            parts: with(value),
            inclusive: *inclusive,
        }),
        None if !prefix.is_empty() => Some(KeyBound::inclusive(prefix.clone())),
        None => None,
    };
    KeyRange { lower, upper }
}

enum Lookup {
    Range(KeyRange),
    /// Full-key lookup, the only access hash indexes allow
    Equality(Vec<Value>),
}

struct IndexScan {
    index: String,
    direction: ScanDirection,
    ranges: VecDeque<Lookup>,
    cursor: Option<IndexCursor>,
    /// Position of the range part and its bounds
    check: Option<(usize, EvaluatedRange)>,
    seen: Option<HashSet<RecordId>>,
}

impl RowProducer for IndexScan {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        loop {
            if let Some(cursor) = self.cursor.as_mut() {
                match cursor.next() {
                    Some(entry) => {
                        if let Some((position, range)) = &self.check {
                            let part = entry.key.parts().get(*position).cloned().unwrap_or(Value::Null);
                            if !range.admits(&part) {
                                continue;
                            }
                        }
                        if let Some(seen) = self.seen.as_mut() {
                            if !seen.insert(entry.rid) {
                                continue;
                            }
                        }
                        let props: Properties = [
                            ("key", entry.key.to_value()),
                            ("rid", Value::Link(entry.rid)),
                        ]
                        .into_iter()
                        .collect();
                        return Ok(Some(QueryResult::internal(props)));
                    }
                    None => self.cursor = None,
                }
            }
            let indexes = ctx.session().indexes();
            self.cursor = Some(match self.ranges.pop_front() {
                Some(Lookup::Range(range)) => indexes.range_scan(&self.index, &range, self.direction)?,
                Some(Lookup::Equality(key)) => indexes.equality_scan(&self.index, &key)?,
                None => return Ok(None),
            });
        }
    }
}

/// Loads the record behind each index entry, optionally keeping only
/// records stored in the given clusters
#[derive(Debug, Clone, PartialEq)]
pub struct GetValueFromIndexEntryStep {
    pub clusters: Option<Vec<u32>>,
}

impl GetValueFromIndexEntryStep {
    pub fn start(&self, upstream: Upstream<'_>, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        Ok(ExecutionStream::from_producer(LoadEntries {
            upstream: upstream.start(ctx)?,
            clusters: self.clusters.clone(),
        }))
    }

    pub fn details(&self) -> Option<String> {
        self.clusters.as_ref().map(|clusters| {
            let ids: Vec<String> = clusters.iter().map(u32::to_string).collect();
            format!("filter clusters: [{}]", ids.join(", "))
        })
    }
}

struct LoadEntries {
    upstream: ExecutionStream,
    clusters: Option<Vec<u32>>,
}

impl RowProducer for LoadEntries {
    fn produce(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<QueryResult>> {
        while let Some(entry) = self.upstream.next_row(ctx)? {
            let rid = entry.property("rid").and_then(Value::as_link).ok_or_else(|| {
                ExecutorError::command("index entry row without a 'rid' link")
            })?;
            if let Some(clusters) = &self.clusters {
                if !clusters.contains(&rid.cluster) {
                    continue;
                }
            }
            if let Some(record) = ctx.session().fetch_record(rid)? {
                return Ok(Some(QueryResult::entity(record)));
            }
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.upstream.close(ctx);
    }
}
