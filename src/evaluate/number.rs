//! Number and boolean condition semantics.

use crate::condition::{BoolCondition, FloatCondition};
use crate::TOLERANCE;

/// Evaluate a number condition. Equality is tolerance-based; the ordered
/// comparators are strict/inclusive exactly as named; ranges are inclusive
/// on both ends and require both bounds.
pub fn evaluate_float(found: bool, fl: f64, cond: &FloatCondition) -> bool {
    match cond.op.as_str() {
        "has_value" => found,
        "is_empty" => !found,
        "eq" => cond.eq.is_empty() || cond.eq.iter().any(|cf| (cf - fl).abs() < TOLERANCE),
        "neq" => cond.neq.is_empty() || !cond.neq.iter().any(|cf| (cf - fl).abs() < TOLERANCE),
        "gt" => fl > cond.gt,
        "lt" => fl < cond.lt,
        "gte" => fl > cond.gte || (fl - cond.gte).abs() < TOLERANCE,
        "lte" => fl < cond.lte || (fl - cond.lte).abs() < TOLERANCE,
        "in_range" => {
            cond.in_range.len() >= 2 && cond.in_range[0] <= fl && fl <= cond.in_range[1]
        }
        "not_in_range" => {
            cond.not_in_range.len() >= 2
                && (fl <= cond.not_in_range[0] || cond.not_in_range[1] <= fl)
        }
        _ => true,
    }
}

pub fn evaluate_bool(found: bool, value: bool, cond: &BoolCondition) -> bool {
    match cond.op.as_str() {
        "has_value" => found,
        "true" => value,
        "false" => !value,
        _ => true,
    }
}
