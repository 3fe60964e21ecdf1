//! Index candidate search
//!
//! Matches one AND-block of a normalized filter against the key of each
//! index on the target class. A key is matched field by field: equality
//! conditions first, then at most one range on the next field. Matching
//! stops at the first field without a usable condition.

use std::cmp::Ordering;

use crate::executor::steps::{IndexKeyCondition, KeyPart, RangeBound};
use crate::index::{IndexDefinition, MapIndexBy};

use super::expr::{CompareOp, Condition, Expr};

/// An index able to answer part of an AND-block
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub index: IndexDefinition,
    pub condition: IndexKeyCondition,
    /// Conditions of the block the index does not answer
    pub residual: Vec<Condition>,
    /// The index is declared on the target class itself
    pub own_class: bool,
}

impl IndexMatch {
    fn equality_count(&self) -> usize {
        self.condition.equalities.len()
    }

    /// True when the index answers the whole block
    pub fn is_complete(&self) -> bool {
        self.residual.is_empty()
    }

    /// Number of leading key fields fixed to a single value
    pub fn fixed_prefix(&self) -> usize {
        self.condition
            .equalities
            .iter()
            .take_while(|p| matches!(p, KeyPart::Value(_)))
            .count()
    }

    /// Deterministic preference between two matches of the same block:
    /// more matched fields, more equalities, unique before not-unique,
    /// own class before inherited, then index name.
    fn preference(&self, other: &IndexMatch) -> Ordering {
        other
            .condition
            .width()
            .cmp(&self.condition.width())
            .then_with(|| other.equality_count().cmp(&self.equality_count()))
            .then_with(|| {
                other
                    .index
                    .index_type
                    .is_unique()
                    .cmp(&self.index.index_type.is_unique())
            })
            .then_with(|| other.own_class.cmp(&self.own_class))
            .then_with(|| self.index.name.cmp(&other.index.name))
    }
}

/// Best index for `block` among `indexes`, if any matches
pub fn best_match(indexes: &[IndexDefinition], class: &str, block: &[Condition]) -> Option<IndexMatch> {
    indexes
        .iter()
        .filter_map(|index| match_index(index, class, block))
        .min_by(IndexMatch::preference)
}

/// Matches one index against an AND-block
pub fn match_index(index: &IndexDefinition, class: &str, block: &[Condition]) -> Option<IndexMatch> {
    let hash = index.index_type.is_hash();
    let mut used = vec![false; block.len()];
    let mut condition = IndexKeyCondition::default();

    for field in &index.fields {
        let equality = block
            .iter()
            .enumerate()
            .filter(|(i, _)| !used[*i])
            .find_map(|(i, c)| key_part(index, field, c).map(|part| (i, part)));
        if let Some((i, part)) = equality {
            used[i] = true;
            condition.equalities.push(part);
            continue;
        }
        if !hash && index.index_type.supports_range() && !index.is_multi_value() {
            for (i, cond) in block.iter().enumerate() {
                if used[i] {
                    continue;
                }
                if let Some((lower, upper)) = range_bounds(field, cond) {
                    let fits = (lower.is_none() || condition.lower.is_none())
                        && (upper.is_none() || condition.upper.is_none());
                    if !fits {
                        continue;
                    }
                    used[i] = true;
                    if lower.is_some() {
                        condition.lower = lower;
                    }
                    if upper.is_some() {
                        condition.upper = upper;
                    }
                }
            }
        }
        break;
    }

    if condition.width() == 0 {
        return None;
    }
    if hash && condition.equalities.len() < index.fields.len() {
        return None;
    }

    let residual = block
        .iter()
        .zip(&used)
        .filter(|(_, used)| !**used)
        .map(|(c, _)| c.clone())
        .collect();
    Some(IndexMatch {
        own_class: index.class_name.eq_ignore_ascii_case(class),
        index: index.clone(),
        condition,
        residual,
    })
}

/// Expressions an index key may be computed from: known before the first
/// row is read and free of side effects
fn is_key_expr(expr: &Expr) -> bool {
    match expr {
        Expr::Literal { .. } | Expr::PositionalParam { .. } | Expr::NamedParam { .. } => true,
        Expr::Variable { .. } => !expr.depends_on_row(),
        Expr::Binary { left, right, .. } => is_key_expr(left) && is_key_expr(right),
        Expr::Negate { expr } => is_key_expr(expr),
        Expr::List { items } => items.iter().all(is_key_expr),
        Expr::Function { args, .. } => !expr.is_aggregate_call() && args.iter().all(is_key_expr),
        Expr::Field { .. } | Expr::Star | Expr::Subquery { .. } | Expr::Sequence { .. } => false,
    }
}

fn is_field(expr: &Expr, field: &str) -> bool {
    expr.as_plain_field().is_some_and(|f| f.eq_ignore_ascii_case(field))
}

/// `field <op> key` with the field on either side
fn comparison<'c>(field: &str, cond: &'c Condition) -> Option<(CompareOp, &'c Expr)> {
    let Condition::Compare { left, op, right } = cond else {
        return None;
    };
    if is_field(left, field) && is_key_expr(right) {
        Some((*op, right))
    } else if is_field(right, field) && is_key_expr(left) {
        op.flipped().map(|op| (op, left))
    } else {
        None
    }
}

fn key_part(index: &IndexDefinition, field: &str, cond: &Condition) -> Option<KeyPart> {
    let multi = index.is_multi_value();
    match cond {
        Condition::Compare { .. } if !multi => match comparison(field, cond)? {
            (CompareOp::Eq, key) => Some(KeyPart::Value(key.clone())),
            _ => None,
        },
        Condition::In {
            expr,
            values,
            negated: false,
        } if !multi && is_field(expr, field) && is_key_expr(values) => Some(KeyPart::AnyOf(values.clone())),
        Condition::Contains { expr, value }
            if multi && index.map_by.is_none() && is_field(expr, field) && is_key_expr(value) =>
        {
            Some(KeyPart::Value(value.clone()))
        }
        Condition::ContainsAny { expr, values }
            if multi && index.map_by.is_none() && is_field(expr, field) && is_key_expr(values) =>
        {
            Some(KeyPart::AnyOf(values.clone()))
        }
        Condition::ContainsKey { expr, key }
            if index.map_by == Some(MapIndexBy::Key) && is_field(expr, field) && is_key_expr(key) =>
        {
            Some(KeyPart::Value(key.clone()))
        }
        Condition::ContainsValue { expr, value }
            if index.map_by == Some(MapIndexBy::Value) && is_field(expr, field) && is_key_expr(value) =>
        {
            Some(KeyPart::Value(value.clone()))
        }
        _ => None,
    }
}

type Bounds = (Option<RangeBound>, Option<RangeBound>);

fn range_bounds(field: &str, cond: &Condition) -> Option<Bounds> {
    let bound = |expr: &Expr, inclusive| {
        Some(RangeBound {
            expr: expr.clone(),
            inclusive,
        })
    };
    match cond {
        Condition::Between { expr, low, high }
            if is_field(expr, field) && is_key_expr(low) && is_key_expr(high) =>
        {
            Some((bound(low, true), bound(high, true)))
        }
        Condition::Compare { .. } => match comparison(field, cond)? {
            (CompareOp::Gt, key) => Some((bound(key, false), None)),
            (CompareOp::Ge, key) => Some((bound(key, true), None)),
            (CompareOp::Lt, key) => Some((None, bound(key, false))),
            (CompareOp::Le, key) => Some((None, bound(key, true))),
            _ => None,
        },
        _ => None,
    }
}
