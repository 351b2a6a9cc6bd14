//! # Filter Literal Parser
//!
//! Parses untrusted nested-object filter literals into a [`QueryFilter`].
//!
//! Grammar, for operator prefix `P`:
//!
//! ```text
//! filter     := { field: scalar | { P op: value } , ... }
//!             | { P and | P or | P nor: [ filter, ... ] }
//! op         := eq | ne | gt | gte | lt | lte | in | nin | not
//! ```
//!
//! `P not` wraps another single-operator object. Operator names are
//! case-insensitive after the prefix.

use serde_json::{Map, Value};

use crate::json::kind;

use super::ast::{
    BranchNode, ComparisonOperator, FieldNode, FilterNode, ForkNode, ForkOperator, QueryFilter,
    DEFAULT_PREFIX,
};
use super::errors::{FilterError, FilterResult};

/// Default maximum nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 16;

const NOT_OPERATOR: &str = "not";

/// Parser for one operator-prefix convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParser {
    prefix: String,
    max_depth: usize,
}

impl Default for FilterParser {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl FilterParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Parse a filter literal. `null` and `{}` parse to the match-all filter.
    pub fn parse(&self, value: &Value) -> FilterResult<QueryFilter> {
        if value.is_null() {
            return Ok(QueryFilter::match_all());
        }
        let root = self.parse_node(value, "", 0)?;
        Ok(QueryFilter::from_root(root))
    }

    fn parse_node(&self, value: &Value, path: &str, depth: usize) -> FilterResult<Option<FilterNode>> {
        self.check_depth(path, depth)?;

        let obj = value
            .as_object()
            .ok_or_else(|| FilterError::invalid(path, format!("expected an object, got {}", kind(value))))?;

        if obj.is_empty() {
            return Ok(None);
        }

        let mut combinator: Option<(ForkOperator, &str, &Value)> = None;
        let mut has_fields = false;

        for (key, item) in obj {
            let Some(name) = self.operator_name(key) else {
                has_fields = true;
                continue;
            };
            let op = ForkOperator::from_name(&name).ok_or_else(|| {
                FilterError::invalid(path, format!("unknown combinator '{}'", key))
            })?;
            if combinator.is_some() {
                return Err(FilterError::invalid(
                    path,
                    "more than one combinator at the same level",
                ));
            }
            combinator = Some((op, key.as_str(), item));
        }

        match combinator {
            Some((op, key, item)) => {
                if has_fields {
                    return Err(FilterError::invalid(
                        path,
                        format!("combinator '{}' cannot be mixed with field conditions", key),
                    ));
                }
                self.parse_fork(op, key, item, path, depth)
            }
            None => self.parse_branch(obj, path, depth),
        }
    }

    fn parse_fork(
        &self,
        op: ForkOperator,
        key: &str,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> FilterResult<Option<FilterNode>> {
        let items = value.as_array().ok_or_else(|| {
            FilterError::invalid(
                path,
                format!("combinator '{}' expects an array, got {}", key, kind(value)),
            )
        })?;
        if items.is_empty() {
            return Err(FilterError::invalid(
                path,
                format!("combinator '{}' requires at least one filter", key),
            ));
        }

        let mut branches = Vec::with_capacity(items.len());
        let mut has_match_all = false;

        for (index, item) in items.iter().enumerate() {
            let item_path = join(path, &format!("{}[{}]", key, index));
            match self.parse_node(item, &item_path, depth + 1)? {
                Some(node) => branches.push(node),
                None if op == ForkOperator::Nor => {
                    return Err(FilterError::invalid(
                        &item_path,
                        format!("an empty filter cannot appear under '{}'", key),
                    ));
                }
                None => has_match_all = true,
            }
        }

        // An `or` with a match-all member matches everything
        if op == ForkOperator::Or && has_match_all {
            return Ok(None);
        }

        Ok(FilterNode::Fork(ForkNode::new(op, branches)).normalize())
    }

    fn parse_branch(
        &self,
        obj: &Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> FilterResult<Option<FilterNode>> {
        let mut branch = BranchNode::new();
        for (name, value) in obj {
            let field_path = join(path, name);
            let field = self.parse_field(value, &field_path, depth + 1)?;
            branch.insert(name.clone(), field);
        }
        Ok(Some(FilterNode::Branch(branch)))
    }

    fn parse_field(&self, value: &Value, path: &str, depth: usize) -> FilterResult<FieldNode> {
        self.check_depth(path, depth)?;

        let obj = match value {
            Value::Object(obj) => obj,
            scalar => return Ok(FieldNode::eq(scalar.clone())),
        };

        if obj.is_empty() {
            return Err(FilterError::invalid(path, "empty operator object"));
        }

        let operator_keys = obj.keys().filter(|key| self.operator_name(key).is_some()).count();
        if operator_keys == 0 {
            // Plain object literal
            return Ok(FieldNode::eq(value.clone()));
        }
        if operator_keys != obj.len() {
            return Err(FilterError::invalid(
                path,
                "operators cannot be mixed with plain keys",
            ));
        }
        if obj.len() > 1 {
            return Err(FilterError::invalid(path, "more than one operator"));
        }

        let (key, operand) = obj
            .iter()
            .next()
            .ok_or_else(|| FilterError::invalid(path, "empty operator object"))?;
        let name = self
            .operator_name(key)
            .ok_or_else(|| FilterError::invalid(path, format!("unknown operator '{}'", key)))?;

        if name == NOT_OPERATOR {
            if !operand.is_object() {
                return Err(FilterError::invalid(
                    path,
                    format!("'{}' expects an operator object, got {}", key, kind(operand)),
                ));
            }
            let inner = self.parse_field(operand, path, depth + 1)?;
            return Ok(inner.negate());
        }

        let operator = ComparisonOperator::from_name(&name)
            .ok_or_else(|| FilterError::invalid(path, format!("unknown operator '{}'", key)))?;

        if operator.takes_list() && !operand.is_array() {
            return Err(FilterError::invalid(
                path,
                format!("'{}' expects an array, got {}", key, kind(operand)),
            ));
        }

        Ok(FieldNode::new(operator, operand.clone()))
    }

    /// Lowercased operator name when `key` carries this parser's prefix
    fn operator_name(&self, key: &str) -> Option<String> {
        key.strip_prefix(self.prefix.as_str())
            .map(str::to_ascii_lowercase)
    }

    fn check_depth(&self, path: &str, depth: usize) -> FilterResult<()> {
        if depth > self.max_depth {
            return Err(FilterError::DepthExceeded {
                path: path.to_string(),
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }
}

impl QueryFilter {
    /// Parse a filter literal under `prefix` with the default depth limit
    pub fn parse(value: &Value, prefix: &str) -> FilterResult<QueryFilter> {
        FilterParser::new(prefix).parse(value)
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}
