//! Storage collaborator interface.
//!
//! Filters reach a backend already serialized under the backend's own
//! operator prefix (see [`StorageBackend::operator_prefix`]). Backends apply
//! the filter and project records to the requested fields themselves.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::FieldSet;
use crate::filter::STORAGE_PREFIX;

use super::errors::StorageResult;

/// A stored record, a JSON object carrying an `id`
pub type Record = Value;

/// Window over a paged query
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Pagination {
    pub fn new(offset: usize, limit: Option<usize>) -> Self {
        Self { offset, limit }
    }
}

/// Paged query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindResult {
    /// Matching records before pagination
    pub count: usize,
    pub results: Vec<Record>,
}

/// Trait for the storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Operator prefix the backend expects in filters
    fn operator_prefix(&self) -> &str {
        STORAGE_PREFIX
    }

    /// Query records matching `filter`
    async fn find(
        &self,
        model: &str,
        fields: Option<&FieldSet>,
        filter: &Value,
        pagination: &Pagination,
    ) -> StorageResult<FindResult>;

    /// Read one record by identifier, if it matches `filter`
    async fn find_one_by_id(
        &self,
        model: &str,
        id: &str,
        fields: Option<&FieldSet>,
        filter: &Value,
    ) -> StorageResult<Option<Record>>;

    /// Read every record among `ids` that matches `filter`, in any order
    async fn find_by_ids(
        &self,
        model: &str,
        ids: &[String],
        fields: Option<&FieldSet>,
        filter: &Value,
    ) -> StorageResult<Vec<Record>>;
}

/// Identifier of a record as a string key; numeric ids are stringified
pub fn record_id(record: &Record) -> Option<String> {
    match record.get(crate::fields::ID_FIELD)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
