//! Query filter tree.
//!
//! A filter is an optional root node. `Branch` nodes hold named field
//! comparisons joined by an implicit AND; `Fork` nodes combine child nodes
//! with an explicit `and`, `or` or `nor`. A missing root matches everything.

use indexmap::IndexMap;
use serde_json::Value;

use super::errors::{FilterError, FilterResult};

/// Operator prefix of the external wire grammar
pub const DEFAULT_PREFIX: &str = "$";

/// Operator prefix used when filters are persisted or re-embedded
pub const STORAGE_PREFIX: &str = "_";

/// Comparison operators for field leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "eq",
            ComparisonOperator::Ne => "ne",
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::In => "in",
            ComparisonOperator::Nin => "nin",
        }
    }

    /// Look up an operator by its unprefixed, lowercase name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(ComparisonOperator::Eq),
            "ne" => Some(ComparisonOperator::Ne),
            "gt" => Some(ComparisonOperator::Gt),
            "gte" => Some(ComparisonOperator::Gte),
            "lt" => Some(ComparisonOperator::Lt),
            "lte" => Some(ComparisonOperator::Lte),
            "in" => Some(ComparisonOperator::In),
            "nin" => Some(ComparisonOperator::Nin),
            _ => None,
        }
    }

    /// Whether the operand must be an array
    pub fn takes_list(&self) -> bool {
        matches!(self, ComparisonOperator::In | ComparisonOperator::Nin)
    }
}

/// Combination operators for forks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForkOperator {
    And,
    Or,
    Nor,
}

impl ForkOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForkOperator::And => "and",
            ForkOperator::Or => "or",
            ForkOperator::Nor => "nor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "and" => Some(ForkOperator::And),
            "or" => Some(ForkOperator::Or),
            "nor" => Some(ForkOperator::Nor),
            _ => None,
        }
    }
}

/// A single comparison against a named field.
///
/// `negated` wraps the whole comparison in NOT. It is not the same as `ne`
/// or `nin`: a negated comparison also flips the result for records that
/// lack the field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub operator: ComparisonOperator,
    pub value: Value,
    pub negated: bool,
}

impl FieldNode {
    pub fn new(operator: ComparisonOperator, value: Value) -> Self {
        Self {
            operator,
            value,
            negated: false,
        }
    }

    pub fn eq(value: Value) -> Self {
        Self::new(ComparisonOperator::Eq, value)
    }

    /// Flip the negation flag
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// Field comparisons joined by an implicit AND, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchNode {
    fields: IndexMap<String, FieldNode>,
}

impl BranchNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldNode) -> Self {
        self.insert(name, field);
        self
    }

    /// Add or replace the comparison for `name`
    pub fn insert(&mut self, name: impl Into<String>, field: FieldNode) {
        self.fields.insert(name.into(), field);
    }

    pub fn get(&self, name: &str) -> Option<&FieldNode> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldNode)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut FieldNode)> {
        self.fields.iter_mut().map(|(name, field)| (name.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An explicit combination of child nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ForkNode {
    pub operator: ForkOperator,
    pub branches: Vec<FilterNode>,
}

impl ForkNode {
    pub fn new(operator: ForkOperator, branches: Vec<FilterNode>) -> Self {
        Self { operator, branches }
    }
}

/// A node of the filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Branch(BranchNode),
    Fork(ForkNode),
}

impl From<BranchNode> for FilterNode {
    fn from(branch: BranchNode) -> Self {
        FilterNode::Branch(branch)
    }
}

impl From<ForkNode> for FilterNode {
    fn from(fork: ForkNode) -> Self {
        FilterNode::Fork(fork)
    }
}

impl FilterNode {
    /// Whether the node matches every record once cleaned up
    fn matches_everything(&self) -> bool {
        match self {
            FilterNode::Branch(branch) => branch.is_empty(),
            FilterNode::Fork(fork) => match fork.operator {
                ForkOperator::And => fork.branches.iter().all(FilterNode::matches_everything),
                ForkOperator::Or => fork.branches.iter().any(FilterNode::matches_everything),
                ForkOperator::Nor => fork.branches.is_empty(),
            },
        }
    }

    fn check_nor(&self, path: &str) -> FilterResult<()> {
        let FilterNode::Fork(fork) = self else {
            return Ok(());
        };
        for (index, child) in fork.branches.iter().enumerate() {
            let segment = format!("{}[{}]", fork.operator.as_str(), index);
            let child_path = if path.is_empty() {
                segment
            } else {
                format!("{}.{}", path, segment)
            };
            if fork.operator == ForkOperator::Nor && child.matches_everything() {
                return Err(FilterError::invalid(
                    &child_path,
                    "a filter matching everything cannot appear under 'nor'",
                ));
            }
            child.check_nor(&child_path)?;
        }
        Ok(())
    }

    fn visit<F>(&self, callback: &mut F)
    where
        F: FnMut(&str, &FieldNode),
    {
        match self {
            FilterNode::Branch(branch) => {
                for (name, field) in branch.iter() {
                    callback(name, field);
                }
            }
            FilterNode::Fork(fork) => {
                for child in &fork.branches {
                    child.visit(callback);
                }
            }
        }
    }

    fn visit_mut<F>(&mut self, callback: &mut F)
    where
        F: FnMut(&str, &mut FieldNode),
    {
        match self {
            FilterNode::Branch(branch) => {
                for (name, field) in branch.iter_mut() {
                    callback(name, field);
                }
            }
            FilterNode::Fork(fork) => {
                for child in &mut fork.branches {
                    child.visit_mut(callback);
                }
            }
        }
    }
}

/// A boolean predicate over record attributes.
///
/// Combinators (`intersect_with`, `unite_with`) take the filter by value;
/// sub-trees move into the combined root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    pub(crate) root: Option<FilterNode>,
}

impl QueryFilter {
    /// Build a filter from a root node, normalizing it.
    ///
    /// Fails when a `nor` has a child that matches everything: such a filter
    /// matches nothing and has no literal form.
    pub fn new(root: impl Into<FilterNode>) -> FilterResult<Self> {
        let root = root.into();
        root.check_nor("")?;
        Ok(Self::from_root(Some(root)))
    }

    /// The filter that matches every record
    pub fn match_all() -> Self {
        Self { root: None }
    }

    pub(crate) fn from_root(root: Option<FilterNode>) -> Self {
        Self {
            root: root.and_then(FilterNode::normalize),
        }
    }

    pub fn root(&self) -> Option<&FilterNode> {
        self.root.as_ref()
    }

    pub fn into_root(self) -> Option<FilterNode> {
        self.root
    }

    pub fn is_match_all(&self) -> bool {
        self.root.is_none()
    }

    /// Visit every field leaf in document order
    pub fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&str, &FieldNode),
    {
        if let Some(root) = &self.root {
            root.visit(&mut callback);
        }
    }

    /// Visit every field leaf in document order, allowing in-place rewrites
    pub fn traverse_mut<F>(&mut self, mut callback: F)
    where
        F: FnMut(&str, &mut FieldNode),
    {
        if let Some(root) = &mut self.root {
            root.visit_mut(&mut callback);
        }
    }
}
