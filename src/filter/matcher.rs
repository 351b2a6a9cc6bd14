//! # Filter Evaluation
//!
//! Evaluates a filter against a JSON record. Used by in-memory backends and
//! by callers that need to check a single record against a grant.
//!
//! ## Absent attributes
//!
//! An attribute is absent when its key is missing or holds `null`.
//!
//! - every comparison against an absent attribute is false, except
//!   `eq null` (true exactly when absent)
//! - `ne null` is true exactly when the attribute is present
//! - a negated comparison inverts the whole result, absent case included
//!
//! So `{a: {not: {in: [1, 2]}}}` matches a record without `a`, while
//! `{a: {nin: [1, 2]}}` does not.

use std::cmp::Ordering;

use serde_json::Value;

use super::ast::{ComparisonOperator, FieldNode, FilterNode, ForkOperator, QueryFilter};

impl QueryFilter {
    /// Whether `record` satisfies this filter
    pub fn matches(&self, record: &Value) -> bool {
        match &self.root {
            Some(root) => root.matches(record),
            None => true,
        }
    }
}

impl FilterNode {
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            FilterNode::Branch(branch) => branch
                .iter()
                .all(|(name, field)| field.evaluate(lookup(record, name))),
            FilterNode::Fork(fork) => match fork.operator {
                ForkOperator::And => fork.branches.iter().all(|b| b.matches(record)),
                ForkOperator::Or => fork.branches.iter().any(|b| b.matches(record)),
                ForkOperator::Nor => !fork.branches.iter().any(|b| b.matches(record)),
            },
        }
    }
}

impl FieldNode {
    /// Evaluate against an attribute value (`None` when missing)
    pub fn evaluate(&self, actual: Option<&Value>) -> bool {
        let present = actual.filter(|value| !value.is_null());
        let result = self.compare(present);
        if self.negated {
            !result
        } else {
            result
        }
    }

    fn compare(&self, actual: Option<&Value>) -> bool {
        let expected = &self.value;
        let Some(actual) = actual else {
            return self.operator == ComparisonOperator::Eq && expected.is_null();
        };

        match self.operator {
            ComparisonOperator::Eq => values_equal(actual, expected),
            ComparisonOperator::Ne => !values_equal(actual, expected),
            ComparisonOperator::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
            ComparisonOperator::Gte => matches!(
                compare_values(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            ComparisonOperator::Lt => compare_values(actual, expected) == Some(Ordering::Less),
            ComparisonOperator::Lte => matches!(
                compare_values(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            ComparisonOperator::In => expected
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(actual, item))),
            ComparisonOperator::Nin => expected
                .as_array()
                .is_some_and(|items| !items.iter().any(|item| values_equal(actual, item))),
        }
    }
}

/// Resolve a field name, falling back to a dotted path into nested objects
fn lookup<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(name) {
        return Some(value);
    }
    if !name.contains('.') {
        return None;
    }
    name.split('.').try_fold(record, |current, segment| current.get(segment))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Ordering between comparable values; mixed types never order
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
