//! # Filter Combinators
//!
//! AND / OR composition of filters and dead-branch cleanup.
//!
//! Cleanup rules:
//! - empty branches drop out of `and` forks and absorb `or` forks
//! - nested forks with the same `and`/`or` operator are flattened
//! - structurally identical siblings are deduplicated
//! - an `and`/`or` fork left with one branch is replaced by that branch
//!
//! A single-branch `nor` is kept as is, since it negates its branch.

use super::ast::{BranchNode, FilterNode, ForkNode, ForkOperator, QueryFilter};

impl QueryFilter {
    /// Logical AND with `other`.
    ///
    /// Passing `None` or a match-all filter returns `self` unchanged.
    pub fn intersect_with(self, other: impl Into<Option<QueryFilter>>) -> QueryFilter {
        let Some(other) = other.into() else {
            return self;
        };
        match (self.root, other.root) {
            (None, root) | (root, None) => QueryFilter { root },
            (Some(a), Some(b)) => QueryFilter::from_root(Some(merge(ForkOperator::And, a, b))),
        }
    }

    /// Logical OR with `other`.
    ///
    /// A match-all operand (or `None`) absorbs: the result matches everything.
    pub fn unite_with(self, other: impl Into<Option<QueryFilter>>) -> QueryFilter {
        let Some(other) = other.into() else {
            return QueryFilter::match_all();
        };
        match (self.root, other.root) {
            (Some(a), Some(b)) => QueryFilter::from_root(Some(merge(ForkOperator::Or, a, b))),
            _ => QueryFilter::match_all(),
        }
    }
}

/// Join two roots under `op`, splicing in same-operator forks
fn merge(op: ForkOperator, a: FilterNode, b: FilterNode) -> FilterNode {
    let mut branches = Vec::new();
    for node in [a, b] {
        match node {
            FilterNode::Fork(fork) if fork.operator == op => branches.extend(fork.branches),
            other => branches.push(other),
        }
    }
    FilterNode::Fork(ForkNode::new(op, branches))
}

impl FilterNode {
    /// Dead-branch cleanup. `None` means the node matches everything.
    pub(crate) fn normalize(self) -> Option<FilterNode> {
        match self {
            FilterNode::Branch(branch) if branch.is_empty() => None,
            FilterNode::Branch(branch) => Some(FilterNode::Branch(branch)),
            FilterNode::Fork(fork) => normalize_fork(fork),
        }
    }
}

fn normalize_fork(fork: ForkNode) -> Option<FilterNode> {
    let op = fork.operator;
    let mut branches: Vec<FilterNode> = Vec::with_capacity(fork.branches.len());

    for child in fork.branches {
        let child = match (child.normalize(), op) {
            (Some(node), _) => node,
            (None, ForkOperator::And) => continue,
            (None, ForkOperator::Or) => return None,
            // Rejected by the parser and QueryFilter::new; kept as a never-matching leaf
            (None, ForkOperator::Nor) => FilterNode::Branch(BranchNode::new()),
        };

        let spliced = match child {
            FilterNode::Fork(inner) if inner.operator == op && op != ForkOperator::Nor => {
                inner.branches
            }
            other => vec![other],
        };
        for node in spliced {
            if !branches.contains(&node) {
                branches.push(node);
            }
        }
    }

    match (op, branches.len()) {
        (ForkOperator::And, 0) | (ForkOperator::Nor, 0) => None,
        (ForkOperator::And, 1) | (ForkOperator::Or, 1) => branches.pop(),
        _ => Some(FilterNode::Fork(ForkNode::new(op, branches))),
    }
}
