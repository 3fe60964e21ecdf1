//! Filter normalization
//!
//! Filters are rewritten to disjunctive normal form (an OR of AND-blocks)
//! before index matching. Negations are pushed down to the leaves with De
//! Morgan's laws; leaves themselves are kept as written.

use super::expr::{CompareOp, Condition};

/// Flattens `cond` into AND-blocks. Returns `None` when the normal form
/// would have more than `max_branches` blocks.
pub fn to_dnf(cond: &Condition, max_branches: usize) -> Option<Vec<Vec<Condition>>> {
    let blocks = dnf(&push_not(cond.clone(), false), max_branches)?;
    Some(
        blocks
            .into_iter()
            .filter(|block| !block.iter().any(|c| matches!(c, Condition::Constant { value: false })))
            .map(|block| {
                block
                    .into_iter()
                    .filter(|c| !matches!(c, Condition::Constant { value: true }))
                    .collect()
            })
            .collect(),
    )
}

/// Moves negations down to the leaves
fn push_not(cond: Condition, negated: bool) -> Condition {
    match cond {
        Condition::Not { item } => push_not(*item, !negated),
        Condition::And { items } => {
            let items = items.into_iter().map(|c| push_not(c, negated)).collect();
            if negated {
                Condition::Or { items }
            } else {
                Condition::And { items }
            }
        }
        Condition::Or { items } => {
            let items = items.into_iter().map(|c| push_not(c, negated)).collect();
            if negated {
                Condition::And { items }
            } else {
                Condition::Or { items }
            }
        }
        Condition::Constant { value } => Condition::Constant {
            value: value != negated,
        },
        Condition::IsNull { expr } if negated => Condition::IsNotNull { expr },
        Condition::IsNotNull { expr } if negated => Condition::IsNull { expr },
        Condition::IsDefined { expr } if negated => Condition::IsNotDefined { expr },
        Condition::IsNotDefined { expr } if negated => Condition::IsDefined { expr },
        Condition::In { expr, values, negated: n } if negated => Condition::In {
            expr,
            values,
            negated: !n,
        },
        Condition::Compare { left, op: CompareOp::Eq, right } if negated => Condition::Compare {
            left,
            op: CompareOp::Ne,
            right,
        },
        Condition::Compare { left, op: CompareOp::Ne, right } if negated => Condition::Compare {
            left,
            op: CompareOp::Eq,
            right,
        },
        leaf if negated => Condition::Not { item: Box::new(leaf) },
        leaf => leaf,
    }
}

fn dnf(cond: &Condition, max: usize) -> Option<Vec<Vec<Condition>>> {
    match cond {
        Condition::Or { items } => {
            let mut blocks = Vec::new();
            for item in items {
                blocks.extend(dnf(item, max)?);
                if blocks.len() > max {
                    return None;
                }
            }
            Some(blocks)
        }
        Condition::And { items } => {
            let mut blocks: Vec<Vec<Condition>> = vec![Vec::new()];
            for item in items {
                let item_blocks = dnf(item, max)?;
                if blocks.len().saturating_mul(item_blocks.len()) > max {
                    return None;
                }
                let mut next = Vec::with_capacity(blocks.len() * item_blocks.len());
                for block in &blocks {
                    for extra in &item_blocks {
                        let mut merged = block.clone();
                        merged.extend(extra.iter().cloned());
                        next.push(merged);
                    }
                }
                blocks = next;
            }
            Some(blocks)
        }
        leaf => Some(vec![vec![leaf.clone()]]),
    }
}

/// Stable reordering putting plain `field = value` comparisons first, so
/// that index matching sees equality conditions before ranges
pub fn equality_first(block: &mut [Condition]) {
    block.sort_by_key(|c| !is_equality(c));
}

fn is_equality(cond: &Condition) -> bool {
    match cond {
        Condition::Compare { left, op: CompareOp::Eq, right } => {
            left.as_plain_field().is_some() || right.as_plain_field().is_some()
        }
        _ => false,
    }
}

/// Rebuilds a condition from AND-blocks
pub fn from_dnf(blocks: Vec<Vec<Condition>>) -> Condition {
    let mut ors: Vec<Condition> = blocks.into_iter().map(and_of).collect();
    match ors.len() {
        0 => Condition::Constant { value: false },
        1 => ors.remove(0),
        _ => Condition::Or { items: ors },
    }
}

/// AND of a block; an empty block is `true`
pub fn and_of(mut block: Vec<Condition>) -> Condition {
    match block.len() {
        0 => Condition::Constant { value: true },
        1 => block.remove(0),
        _ => Condition::And { items: block },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> Condition {
        Condition::eq("a", 1)
    }
    fn b() -> Condition {
        Condition::eq("b", 2)
    }
    fn c() -> Condition {
        Condition::field("c", CompareOp::Gt, 3)
    }

    #[test]
    fn test_and_over_or_distributes() {
        let cond = Condition::and(vec![a(), Condition::or(vec![b(), c()])]);
        let blocks = to_dnf(&cond, 64).unwrap();
        assert_eq!(blocks, vec![vec![a(), b()], vec![a(), c()]]);
    }

    #[test]
    fn test_not_is_pushed_down() {
        let cond = Condition::negate(Condition::or(vec![a(), c()]));
        let blocks = to_dnf(&cond, 64).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0],
            vec![
                Condition::field("a", CompareOp::Ne, 1),
                Condition::negate(c()),
            ]
        );
    }

    #[test]
    fn test_branch_cap() {
        let ors: Vec<Condition> = (0..3)
            .map(|i| Condition::or(vec![Condition::eq("x", i), Condition::eq("y", i)]))
            .collect();
        let cond = Condition::and(ors);
        assert_eq!(to_dnf(&cond, 8).map(|b| b.len()), Some(8));
        assert!(to_dnf(&cond, 7).is_none());
    }

    #[test]
    fn test_constants_fold() {
        let cond = Condition::or(vec![
            Condition::and(vec![a(), Condition::Constant { value: false }]),
            Condition::and(vec![b(), Condition::Constant { value: true }]),
        ]);
        assert_eq!(to_dnf(&cond, 64).unwrap(), vec![vec![b()]]);
    }

    #[test]
    fn test_equality_first_is_stable() {
        let mut block = vec![c(), a(), Condition::field("d", CompareOp::Lt, 0), b()];
        equality_first(&mut block);
        assert_eq!(block[0], a());
        assert_eq!(block[1], b());
        assert_eq!(block[2], c());
    }
}
