//! Field set values and their set algebra.
//!
//! `intersect` and `unite` take `Option<&FieldSet>` because absence carries
//! meaning: no restriction. The two operations treat absence differently:
//!
//! - absent ∩ X = X (an unrestricted side does not narrow)
//! - absent ∪ X = absent (an unrestricted side widens everything)

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::json::kind;

use super::errors::{FieldSetError, FieldSetResult};

/// Record identifier field, always kept by projections
pub const ID_FIELD: &str = "id";

/// An unordered set of field names
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FieldSet {
    fields: BTreeSet<String>,
}

impl FieldSet {
    /// Build a field set from names.
    ///
    /// Names are not validated here; use [`FieldSet::parse`] for untrusted input.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// The empty set: no field is visible
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse and validate a field set literal.
    ///
    /// The literal must be an array whose every member is a non-empty string.
    pub fn parse(value: &Value) -> FieldSetResult<Self> {
        let items = value.as_array().ok_or_else(|| {
            FieldSetError::invalid(format!("expected an array of field names, got {}", kind(value)))
        })?;

        let mut fields = BTreeSet::new();
        for (index, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(name) if !name.is_empty() => {
                    fields.insert(name.to_string());
                }
                Some(_) => {
                    return Err(FieldSetError::invalid(format!(
                        "field name at index {} is empty",
                        index
                    )))
                }
                None => {
                    return Err(FieldSetError::invalid(format!(
                        "field name at index {} is {}, expected a string",
                        index,
                        kind(item)
                    )))
                }
            }
        }

        Ok(Self { fields })
    }

    /// Intersect two optional field sets.
    ///
    /// An absent side imposes no restriction, so the other side is returned.
    pub fn intersect(a: Option<&FieldSet>, b: Option<&FieldSet>) -> Option<FieldSet> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.intersection(b)),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }

    /// Unite two optional field sets.
    ///
    /// Defined only when both sides are present; otherwise the result is absent.
    pub fn unite(a: Option<&FieldSet>, b: Option<&FieldSet>) -> Option<FieldSet> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.union(b)),
            _ => None,
        }
    }

    /// Members present in both sets
    pub fn intersection(&self, other: &FieldSet) -> FieldSet {
        Self {
            fields: self.fields.intersection(&other.fields).cloned().collect(),
        }
    }

    /// Members present in either set
    pub fn union(&self, other: &FieldSet) -> FieldSet {
        Self {
            fields: self.fields.union(&other.fields).cloned().collect(),
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Serialize as a sorted array of names
    pub fn to_value(&self) -> Value {
        Value::Array(self.fields.iter().cloned().map(Value::String).collect())
    }

    /// Keep only the members of this set (and the record identifier).
    ///
    /// Non-object records are returned unchanged.
    pub fn project(&self, record: &Value) -> Value {
        match record {
            Value::Object(obj) => Value::Object(
                obj.iter()
                    .filter(|(key, _)| key.as_str() == ID_FIELD || self.contains(key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl TryFrom<Vec<String>> for FieldSet {
    type Error = FieldSetError;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        if let Some(index) = fields.iter().position(String::is_empty) {
            return Err(FieldSetError::invalid(format!(
                "field name at index {} is empty",
                index
            )));
        }
        Ok(Self::new(fields))
    }
}

impl From<FieldSet> for Vec<String> {
    fn from(set: FieldSet) -> Self {
        set.fields.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Field sets keyed by model name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSetMap {
    models: BTreeMap<String, FieldSet>,
}

impl FieldSetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>, fields: FieldSet) -> Self {
        self.models.insert(model.into(), fields);
        self
    }

    /// Parse `{ "<model>": [<field>, ...], ... }`
    pub fn parse(value: &Value) -> FieldSetResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            FieldSetError::invalid(format!(
                "expected an object mapping models to field names, got {}",
                kind(value)
            ))
        })?;

        let mut models = BTreeMap::new();
        for (model, fields) in obj {
            if model.is_empty() {
                return Err(FieldSetError::invalid("model name is empty"));
            }
            let set = FieldSet::parse(fields).map_err(|FieldSetError::InvalidFieldSet(reason)| {
                FieldSetError::invalid(format!("model '{}': {}", model, reason))
            })?;
            models.insert(model.clone(), set);
        }

        Ok(Self { models })
    }

    /// Field set for a model; absent when the model is not listed
    pub fn get(&self, model: &str) -> Option<&FieldSet> {
        self.models.get(model)
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        for (model, fields) in &self.models {
            obj.insert(model.clone(), fields.to_value());
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(names: &[&str]) -> FieldSet {
        FieldSet::new(names.iter().copied())
    }

    #[test]
    fn test_equality_is_order_independent() {
        assert_eq!(set(&["a", "b"]), set(&["b", "a"]));
        assert_eq!(set(&["a", "a", "b"]).len(), 2);
    }

    #[test]
    fn test_intersect_absent_is_identity() {
        let x = set(&["name"]);
        assert_eq!(FieldSet::intersect(None, Some(&x)), Some(x.clone()));
        assert_eq!(FieldSet::intersect(Some(&x), None), Some(x));
        assert_eq!(FieldSet::intersect(None, None), None);
    }

    #[test]
    fn test_intersect_common_members() {
        let result = FieldSet::intersect(Some(&set(&["a", "b"])), Some(&set(&["b", "c"])));
        assert_eq!(result, Some(set(&["b"])));
    }

    #[test]
    fn test_intersect_disjoint_is_empty_not_absent() {
        let result = FieldSet::intersect(Some(&set(&["a"])), Some(&set(&["b"])));
        assert_eq!(result, Some(FieldSet::empty()));
    }

    #[test]
    fn test_unite_absent_absorbs() {
        let x = set(&["name"]);
        assert_eq!(FieldSet::unite(None, Some(&x)), None);
        assert_eq!(FieldSet::unite(Some(&x), None), None);
        assert_eq!(FieldSet::unite(None, None), None);
    }

    #[test]
    fn test_unite_members_of_either() {
        let result = FieldSet::unite(Some(&set(&["a"])), Some(&set(&["b", "a"])));
        assert_eq!(result, Some(set(&["a", "b"])));
    }

    #[test]
    fn test_parse_valid() {
        let parsed = FieldSet::parse(&json!(["name", "email"])).unwrap();
        assert!(parsed.contains("name"));
        assert!(parsed.contains("email"));
        assert_eq!(parsed.to_value(), json!(["email", "name"]));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(FieldSet::parse(&json!({"name": true})).is_err());
        assert!(FieldSet::parse(&json!("name")).is_err());
        assert!(FieldSet::parse(&json!(null)).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_members() {
        assert!(FieldSet::parse(&json!(["name", ""])).is_err());
        assert!(FieldSet::parse(&json!(["name", 1])).is_err());
        assert!(FieldSet::parse(&json!([["nested"]])).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let ok: FieldSet = serde_json::from_value(json!(["a"])).unwrap();
        assert_eq!(ok, set(&["a"]));
        assert!(serde_json::from_value::<FieldSet>(json!([""])).is_err());
    }

    #[test]
    fn test_project_keeps_members_and_id() {
        let record = json!({"id": "u1", "name": "Ada", "email": "ada@example.com"});
        assert_eq!(
            set(&["name"]).project(&record),
            json!({"id": "u1", "name": "Ada"})
        );
    }

    #[test]
    fn test_field_set_map() {
        let map = FieldSetMap::parse(&json!({
            "users": ["name"],
            "posts": ["title", "body"]
        }))
        .unwrap();

        assert_eq!(map.get("users"), Some(&set(&["name"])));
        assert_eq!(map.get("posts").map(FieldSet::len), Some(2));
        assert_eq!(map.get("comments"), None);
        assert_eq!(map.models().collect::<Vec<_>>(), vec!["posts", "users"]);
    }

    #[test]
    fn test_field_set_map_rejects_invalid() {
        assert!(FieldSetMap::parse(&json!(["name"])).is_err());
        let err = FieldSetMap::parse(&json!({"users": [""]})).unwrap_err();
        assert!(err.to_string().contains("users"));
    }
}
