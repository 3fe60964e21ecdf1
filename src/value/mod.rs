//! Loosely typed values carried by result rows
//!
//! Every value flowing through the execution pipeline is a [`Value`].
//! Numeric sub-types (short, int, long, float, double, decimal) are kept
//! distinct so that projections preserve the declared type of a field,
//! while comparisons treat all numeric sub-types as one family.
//!
//! # Ordering
//!
//! Two orderings exist:
//!
//! - [`Value::sql_compare`] follows query semantics: `null` and values of
//!   unrelated types are incomparable (`None`).
//! - [`Value::total_cmp`] is a total order used by index keys, sorting and
//!   duplicate suppression. Type rank: null < boolean < number < string <
//!   date < datetime < link < list < map < embedded.

mod arith;
mod compare;
mod convert;
mod errors;
mod properties;
mod types;

pub use arith::ArithOp;
pub use compare::OrdValue;
pub use errors::{ValueError, ValueResult};
pub use properties::Properties;
pub use types::Value;
