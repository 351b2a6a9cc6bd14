//! Request cache keys.
//!
//! A key is the JSON text of the normalized query: kind, model, identifier
//! or pagination, serialized filter and field set. Two lookups share a cache
//! entry exactly when these agree.

use std::fmt;

use serde_json::{json, Value};

use crate::fields::FieldSet;

use super::storage::Pagination;

/// Cache key of one query within a request scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a single-record lookup
    pub fn find_one(model: &str, id: &str, fields: Option<&FieldSet>, filter: &Value) -> Self {
        Self::build(json!({
            "kind": "find_one",
            "model": model,
            "id": id,
            "filter": filter,
            "fields": fields_value(fields),
        }))
    }

    /// Key for a paged query
    pub fn find(
        model: &str,
        pagination: &Pagination,
        fields: Option<&FieldSet>,
        filter: &Value,
    ) -> Self {
        Self::build(json!({
            "kind": "find",
            "model": model,
            "pagination": {"offset": pagination.offset, "limit": pagination.limit},
            "filter": filter,
            "fields": fields_value(fields),
        }))
    }

    fn build(value: Value) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn fields_value(fields: Option<&FieldSet>) -> Value {
    fields.map_or(Value::Null, FieldSet::to_value)
}

/// Pending-queue key: lookups sharing it are answered by one backend call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct BatchKey {
    pub model: String,
    pub batch_key: String,
    pub filter: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_does_not_matter() {
        let a = CacheKey::find_one("users", "1", Some(&FieldSet::new(["b", "a"])), &json!({}));
        let b = CacheKey::find_one("users", "1", Some(&FieldSet::new(["a", "b"])), &json!({}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_keys_distinguish_queries() {
        let filter = json!({"age": {"_gt": 1}});
        let base = CacheKey::find_one("users", "1", None, &filter);

        assert_ne!(base, CacheKey::find_one("users", "2", None, &filter));
        assert_ne!(base, CacheKey::find_one("posts", "1", None, &filter));
        assert_ne!(base, CacheKey::find_one("users", "1", None, &json!({})));
        assert_ne!(
            base,
            CacheKey::find_one("users", "1", Some(&FieldSet::empty()), &filter)
        );
        assert_ne!(
            CacheKey::find("users", &Pagination::new(0, Some(10)), None, &filter),
            CacheKey::find("users", &Pagination::new(10, Some(10)), None, &filter)
        );
    }

    #[test]
    fn test_key_is_json() {
        let key = CacheKey::find_one("users", "1", None, &json!({}));
        let parsed: Value = serde_json::from_str(key.as_str()).unwrap();
        assert_eq!(parsed["kind"], "find_one");
        assert_eq!(parsed["fields"], Value::Null);
    }
}
