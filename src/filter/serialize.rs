//! # Filter Serialization
//!
//! Rebuilds the nested-object literal from a filter tree under any operator
//! prefix, so a filter parsed from the external `$` grammar can be handed to
//! a backend that speaks the `_` grammar.

use serde_json::{Map, Value};

use super::ast::{ComparisonOperator, FieldNode, FilterNode, QueryFilter};
use super::errors::{FilterError, FilterResult};

impl QueryFilter {
    /// Serialize under `prefix`. The match-all filter serializes to `{}`.
    pub fn serialize(&self, prefix: &str) -> Value {
        self.serialize_with(prefix, |_, value| value.clone())
    }

    /// Serialize under `prefix`, passing every leaf value through `transform`.
    ///
    /// `transform` receives the field name and the leaf value and returns the
    /// value to emit. Tree shape is unchanged.
    pub fn serialize_with<F>(&self, prefix: &str, mut transform: F) -> Value
    where
        F: FnMut(&str, &Value) -> Value,
    {
        match &self.root {
            Some(root) => serialize_node(root, prefix, &mut transform),
            None => Value::Object(Map::new()),
        }
    }

    /// Serialize for a consumer that parses under `prefix`.
    ///
    /// Fails when a field name starts with `prefix`, since the consumer would
    /// read that key as an operator.
    pub fn translate(&self, prefix: &str) -> FilterResult<Value> {
        let mut collision = None;
        self.traverse(|name, _| {
            if collision.is_none() && name.starts_with(prefix) {
                collision = Some(name.to_string());
            }
        });

        match collision {
            Some(name) => Err(FilterError::invalid(
                &name,
                format!("field name starts with the operator prefix '{}'", prefix),
            )),
            None => Ok(self.serialize(prefix)),
        }
    }
}

fn serialize_node(
    node: &FilterNode,
    prefix: &str,
    transform: &mut dyn FnMut(&str, &Value) -> Value,
) -> Value {
    match node {
        FilterNode::Branch(branch) => {
            let mut obj = Map::new();
            for (name, field) in branch.iter() {
                obj.insert(name.to_string(), serialize_field(name, field, prefix, transform));
            }
            Value::Object(obj)
        }
        FilterNode::Fork(fork) => {
            let mut branches = Vec::with_capacity(fork.branches.len());
            for child in &fork.branches {
                branches.push(serialize_node(child, prefix, transform));
            }
            operator_object(prefix, fork.operator.as_str(), Value::Array(branches))
        }
    }
}

fn serialize_field(
    name: &str,
    field: &FieldNode,
    prefix: &str,
    transform: &mut dyn FnMut(&str, &Value) -> Value,
) -> Value {
    let value = transform(name, &field.value);

    // Shorthand only where it cannot be read back as an operator object
    if !field.negated && field.operator == ComparisonOperator::Eq && !value.is_object() {
        return value;
    }

    let comparison = operator_object(prefix, field.operator.as_str(), value);
    if field.negated {
        operator_object(prefix, "not", comparison)
    } else {
        comparison
    }
}

fn operator_object(prefix: &str, operator: &str, operand: Value) -> Value {
    let mut obj = Map::new();
    obj.insert(format!("{}{}", prefix, operator), operand);
    Value::Object(obj)
}
