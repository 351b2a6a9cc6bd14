//! Access values: the outcome of evaluating permission grants.
//!
//! A grant is either absolute (`true` = everything, `false` = nothing) or
//! scoped to a field set and/or a record filter. Union combines grants that
//! apply to the same caller; intersection narrows a grant by a request.

use serde_json::{Map, Value};

use crate::fields::FieldSet;
use crate::filter::{FilterParser, QueryFilter};
use crate::json::kind;

use super::errors::{AccessError, AccessResult};

const FIELDS_KEY: &str = "fields";
const FILTER_KEY: &str = "filter";

/// Access granted to a caller for one model and action
#[derive(Debug, Clone, PartialEq)]
pub enum AccessValue {
    /// Unconditional allow or deny
    Absolute(bool),
    /// Allowed, restricted to visible fields and/or matching records.
    ///
    /// A missing part imposes no restriction.
    Scoped {
        fields: Option<FieldSet>,
        filter: Option<QueryFilter>,
    },
}

impl Default for AccessValue {
    fn default() -> Self {
        AccessValue::Absolute(false)
    }
}

impl AccessValue {
    pub fn allow() -> Self {
        AccessValue::Absolute(true)
    }

    pub fn deny() -> Self {
        AccessValue::Absolute(false)
    }

    /// Build a scoped value, normalized
    pub fn scoped(fields: Option<FieldSet>, filter: Option<QueryFilter>) -> Self {
        AccessValue::Scoped { fields, filter }.normalize()
    }

    /// Parse an access literal under the operator `prefix`
    pub fn parse(value: &Value, prefix: &str) -> AccessResult<Self> {
        Self::parse_with(value, &FilterParser::new(prefix))
    }

    /// Parse an access literal, reading its filter with `parser`
    pub fn parse_with(value: &Value, parser: &FilterParser) -> AccessResult<Self> {
        let obj = match value {
            Value::Bool(allowed) => return Ok(AccessValue::Absolute(*allowed)),
            Value::Null => return Ok(AccessValue::deny()),
            Value::Object(obj) => obj,
            other => {
                return Err(AccessError::invalid(format!(
                    "expected a boolean or an object, got {}",
                    kind(other)
                )))
            }
        };

        if let Some(key) = obj.keys().find(|key| *key != FIELDS_KEY && *key != FILTER_KEY) {
            return Err(AccessError::invalid(format!("unexpected key '{}'", key)));
        }
        if obj.is_empty() {
            return Err(AccessError::invalid(format!(
                "expected at least one of '{}' or '{}'",
                FIELDS_KEY, FILTER_KEY
            )));
        }

        let fields = obj.get(FIELDS_KEY).map(FieldSet::parse).transpose()?;
        let filter = obj.get(FILTER_KEY).map(|f| parser.parse(f)).transpose()?;

        Ok(Self::scoped(fields, filter))
    }

    /// Logical AND: the access both values allow
    pub fn intersect(self, other: AccessValue) -> AccessValue {
        match (self, other) {
            (AccessValue::Absolute(false), _) | (_, AccessValue::Absolute(false)) => {
                AccessValue::deny()
            }
            (AccessValue::Absolute(true), value) | (value, AccessValue::Absolute(true)) => value,
            (
                AccessValue::Scoped {
                    fields: fields_a,
                    filter: filter_a,
                },
                AccessValue::Scoped {
                    fields: fields_b,
                    filter: filter_b,
                },
            ) => {
                let fields = FieldSet::intersect(fields_a.as_ref(), fields_b.as_ref());
                let filter = match (filter_a, filter_b) {
                    (Some(a), Some(b)) => Some(a.intersect_with(b)),
                    (a, None) | (None, a) => a,
                };
                Self::scoped(fields, filter)
            }
        }
    }

    /// Logical OR: the access either value allows.
    ///
    /// A part is kept only when both sides restrict it.
    pub fn unite(self, other: AccessValue) -> AccessValue {
        match (self, other) {
            (AccessValue::Absolute(true), _) | (_, AccessValue::Absolute(true)) => {
                AccessValue::allow()
            }
            (AccessValue::Absolute(false), value) | (value, AccessValue::Absolute(false)) => value,
            (
                AccessValue::Scoped {
                    fields: fields_a,
                    filter: filter_a,
                },
                AccessValue::Scoped {
                    fields: fields_b,
                    filter: filter_b,
                },
            ) => {
                let fields = FieldSet::unite(fields_a.as_ref(), fields_b.as_ref());
                let filter = match (filter_a, filter_b) {
                    (Some(a), Some(b)) => Some(a.unite_with(b)),
                    _ => None,
                };
                Self::scoped(fields, filter)
            }
        }
    }

    /// Unite every value; no values means no access
    pub fn unite_all<I>(values: I) -> AccessValue
    where
        I: IntoIterator<Item = AccessValue>,
    {
        values
            .into_iter()
            .fold(AccessValue::deny(), AccessValue::unite)
    }

    /// Collapse unrestricted scopes to `Absolute(true)`
    fn normalize(self) -> AccessValue {
        match self {
            AccessValue::Scoped { fields, filter } => {
                let filter = filter.filter(|f| !f.is_match_all());
                if fields.is_none() && filter.is_none() {
                    AccessValue::allow()
                } else {
                    AccessValue::Scoped { fields, filter }
                }
            }
            absolute => absolute,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessValue::Absolute(true))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessValue::Absolute(false))
    }

    pub fn fields(&self) -> Option<&FieldSet> {
        match self {
            AccessValue::Scoped { fields, .. } => fields.as_ref(),
            AccessValue::Absolute(_) => None,
        }
    }

    pub fn filter(&self) -> Option<&QueryFilter> {
        match self {
            AccessValue::Scoped { filter, .. } => filter.as_ref(),
            AccessValue::Absolute(_) => None,
        }
    }

    /// Serialize as `true`, `false` or `{fields?, filter?}` under `prefix`
    pub fn to_value(&self, prefix: &str) -> Value {
        match self {
            AccessValue::Absolute(allowed) => Value::Bool(*allowed),
            AccessValue::Scoped { fields, filter } => {
                let mut obj = Map::new();
                if let Some(fields) = fields {
                    obj.insert(FIELDS_KEY.to_string(), fields.to_value());
                }
                if let Some(filter) = filter {
                    obj.insert(FILTER_KEY.to_string(), filter.serialize(prefix));
                }
                Value::Object(obj)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn access(value: Value) -> AccessValue {
        AccessValue::parse(&value, "$").unwrap()
    }

    #[test]
    fn test_parse_absolute() {
        assert_eq!(access(json!(true)), AccessValue::allow());
        assert_eq!(access(json!(false)), AccessValue::deny());
        assert_eq!(access(Value::Null), AccessValue::deny());
    }

    #[test]
    fn test_parse_rejects_bad_literals() {
        for literal in [
            json!(1),
            json!("yes"),
            json!([]),
            json!({}),
            json!({"fields": ["a"], "extra": 1}),
            json!({"fields": "a"}),
            json!({"fields": [""]}),
            json!({"filter": {"a": {"$bogus": 1}}}),
        ] {
            assert!(AccessValue::parse(&literal, "$").is_err(), "{}", literal);
        }
    }

    #[test]
    fn test_parse_error_kinds() {
        let err = AccessValue::parse(&json!({"fields": 3}), "$").unwrap_err();
        assert_eq!(err.code(), "AERO_INVALID_FIELD_SET");

        let err = AccessValue::parse(&json!({"filter": 3}), "$").unwrap_err();
        assert_eq!(err.code(), "AERO_INVALID_QUERY_FILTER");

        let err = AccessValue::parse(&json!(7), "$").unwrap_err();
        assert_eq!(err.code(), "AERO_INVALID_ACCESS_VALUE");
    }

    #[test]
    fn test_unrestricted_scope_normalizes_to_allow() {
        assert!(access(json!({"filter": {}})).is_allowed());
        assert!(access(json!({"filter": null})).is_allowed());
        assert!(AccessValue::scoped(None, Some(QueryFilter::match_all())).is_allowed());
    }

    #[test]
    fn test_deny_absorbs_intersect() {
        let scoped = access(json!({"fields": ["a"]}));
        assert!(scoped.clone().intersect(AccessValue::deny()).is_denied());
        assert!(AccessValue::deny().intersect(scoped).is_denied());
    }

    #[test]
    fn test_allow_absorbs_unite() {
        let scoped = access(json!({"filter": {"a": 1}}));
        assert!(scoped.clone().unite(AccessValue::allow()).is_allowed());
        assert!(AccessValue::allow().unite(scoped).is_allowed());
    }

    #[test]
    fn test_identities() {
        let scoped = access(json!({"fields": ["a"], "filter": {"b": 2}}));
        assert_eq!(scoped.clone().intersect(AccessValue::allow()), scoped);
        assert_eq!(scoped.clone().unite(AccessValue::deny()), scoped);
    }

    #[test]
    fn test_grant_union_and_intersection() {
        let a = access(json!({"fields": ["name"], "filter": {"age": {"$gte": 18}}}));
        let b = access(json!({"fields": ["name", "email"]}));

        assert_eq!(
            a.clone().unite(b.clone()).to_value("$"),
            json!({"fields": ["email", "name"]})
        );
        assert_eq!(
            a.intersect(b).to_value("$"),
            json!({"fields": ["name"], "filter": {"age": {"$gte": 18}}})
        );
    }

    #[test]
    fn test_unite_all_empty_is_deny() {
        assert!(AccessValue::unite_all(Vec::new()).is_denied());

        let united = AccessValue::unite_all(vec![
            access(json!({"filter": {"owner": "u1"}})),
            access(json!({"filter": {"public": true}})),
        ]);
        assert_eq!(
            united.to_value("$"),
            json!({"filter": {"$or": [{"owner": "u1"}, {"public": true}]}})
        );
    }

    #[test]
    fn test_to_value_under_storage_prefix() {
        let value = access(json!({"filter": {"age": {"$lt": 13}}}));
        assert_eq!(value.to_value("_"), json!({"filter": {"age": {"_lt": 13}}}));
    }
}
