//! # Query Filters
//!
//! Boolean filter trees over record attributes: parsing from untrusted
//! nested-object literals, serialization under any operator prefix, AND / OR
//! composition, leaf traversal and evaluation against JSON records.

mod ast;
mod combine;
mod errors;
mod matcher;
mod parser;
mod serialize;

pub use ast::{
    BranchNode, ComparisonOperator, FieldNode, FilterNode, ForkNode, ForkOperator, QueryFilter,
    DEFAULT_PREFIX, STORAGE_PREFIX,
};
pub use errors::{FilterError, FilterResult};
pub use parser::{FilterParser, DEFAULT_MAX_DEPTH};
