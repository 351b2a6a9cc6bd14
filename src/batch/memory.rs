//! In-memory storage backend.
//!
//! Records live in per-model maps ordered by identifier. Filters are parsed
//! under the backend's prefix and evaluated record by record.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::fields::{FieldSet, ID_FIELD};
use crate::filter::{FilterParser, QueryFilter, STORAGE_PREFIX};

use super::errors::{StorageError, StorageResult};
use super::storage::{FindResult, Pagination, Record, StorageBackend};

type Models = HashMap<String, BTreeMap<String, Record>>;

/// In-memory storage for tests and the CLI
#[derive(Debug)]
pub struct InMemoryStorage {
    parser: FilterParser,
    data: RwLock<Models>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_prefix(STORAGE_PREFIX)
    }

    /// Create a backend that reads filters under `prefix`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            parser: FilterParser::new(prefix),
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Store a record, assigning an identifier when it has none.
    ///
    /// Returns the record identifier.
    pub fn insert(&self, model: &str, mut record: Record) -> StorageResult<String> {
        let obj = record
            .as_object_mut()
            .ok_or_else(|| StorageError::backend("record must be a JSON object"))?;

        let id = match obj.get(ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            Some(_) => return Err(StorageError::backend("record id must be a string or a number")),
            None => {
                let id = Uuid::new_v4().to_string();
                obj.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut data = self.data.write().map_err(|e| StorageError::backend(e.to_string()))?;
        data.entry(model.to_string())
            .or_default()
            .insert(id.clone(), record);
        Ok(id)
    }

    pub fn len(&self, model: &str) -> usize {
        self.data
            .read()
            .map(|data| data.get(model).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn parse_filter(&self, filter: &Value) -> StorageResult<QueryFilter> {
        Ok(self.parser.parse(filter)?)
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn project(record: &Record, fields: Option<&FieldSet>) -> Record {
    match fields {
        Some(fields) => fields.project(record),
        None => record.clone(),
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn operator_prefix(&self) -> &str {
        self.parser.prefix()
    }

    async fn find(
        &self,
        model: &str,
        fields: Option<&FieldSet>,
        filter: &Value,
        pagination: &Pagination,
    ) -> StorageResult<FindResult> {
        let filter = self.parse_filter(filter)?;
        let data = self.data.read().map_err(|e| StorageError::backend(e.to_string()))?;

        let matching: Vec<&Record> = data
            .get(model)
            .map(|records| records.values().filter(|r| filter.matches(r)).collect())
            .unwrap_or_default();

        let limit = pagination.limit.unwrap_or(usize::MAX);
        let results = matching
            .iter()
            .skip(pagination.offset)
            .take(limit)
            .map(|record| project(record, fields))
            .collect();

        Ok(FindResult {
            count: matching.len(),
            results,
        })
    }

    async fn find_one_by_id(
        &self,
        model: &str,
        id: &str,
        fields: Option<&FieldSet>,
        filter: &Value,
    ) -> StorageResult<Option<Record>> {
        let filter = self.parse_filter(filter)?;
        let data = self.data.read().map_err(|e| StorageError::backend(e.to_string()))?;

        Ok(data
            .get(model)
            .and_then(|records| records.get(id))
            .filter(|record| filter.matches(record))
            .map(|record| project(record, fields)))
    }

    async fn find_by_ids(
        &self,
        model: &str,
        ids: &[String],
        fields: Option<&FieldSet>,
        filter: &Value,
    ) -> StorageResult<Vec<Record>> {
        let filter = self.parse_filter(filter)?;
        let data = self.data.read().map_err(|e| StorageError::backend(e.to_string()))?;

        let Some(records) = data.get(model) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id))
            .filter(|record| filter.matches(record))
            .map(|record| project(record, fields))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::record_id;
    use serde_json::json;

    fn seeded() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        storage
            .insert("users", json!({"id": "u1", "name": "Ada", "age": 36}))
            .unwrap();
        storage
            .insert("users", json!({"id": "u2", "name": "Bob", "age": 15}))
            .unwrap();
        storage
            .insert("users", json!({"id": "u3", "name": "Cy", "age": 52}))
            .unwrap();
        storage
    }

    #[test]
    fn test_insert_assigns_id() {
        let storage = InMemoryStorage::new();
        let id = storage.insert("posts", json!({"title": "hello"})).unwrap();
        assert!(!id.is_empty());
        assert_eq!(storage.len("posts"), 1);
        assert!(storage.insert("posts", json!([1])).is_err());
    }

    #[tokio::test]
    async fn test_find_filters_and_paginates() {
        let storage = seeded();
        let filter = json!({"age": {"_gte": 18}});

        let page = storage
            .find("users", None, &filter, &Pagination::new(1, Some(5)))
            .await
            .unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.results, vec![json!({"id": "u3", "name": "Cy", "age": 52})]);
    }

    #[tokio::test]
    async fn test_find_one_by_id_respects_filter_and_fields() {
        let storage = seeded();
        let fields = FieldSet::new(["name"]);

        let adult = storage
            .find_one_by_id("users", "u1", Some(&fields), &json!({"age": {"_gte": 18}}))
            .await
            .unwrap();
        assert_eq!(adult, Some(json!({"id": "u1", "name": "Ada"})));

        let minor = storage
            .find_one_by_id("users", "u2", None, &json!({"age": {"_gte": 18}}))
            .await
            .unwrap();
        assert_eq!(minor, None);
    }

    #[tokio::test]
    async fn test_find_by_ids_skips_missing() {
        let storage = seeded();
        let ids = vec!["u3".to_string(), "nope".to_string(), "u1".to_string()];
        let records = storage
            .find_by_ids("users", &ids, None, &json!({}))
            .await
            .unwrap();
        let found: Vec<_> = records.iter().filter_map(record_id).collect();
        assert_eq!(found, vec!["u3", "u1"]);
    }

    #[tokio::test]
    async fn test_rejects_unknown_operator() {
        let storage = seeded();
        let err = storage
            .find("users", None, &json!({"age": {"_near": 18}}), &Pagination::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AERO_INVALID_QUERY_FILTER");
    }
}
