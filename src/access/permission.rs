//! Permission records and role-based grant resolution.
//!
//! A permission grants an access value on one model and action to a list of
//! roles. An empty role list makes the permission public. Resolution unites
//! every applicable grant, so rules declared independently widen each other.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::filter::FilterParser;

use super::errors::{AccessError, AccessResult};
use super::value::AccessValue;

/// Operation a permission applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "read" => Some(Action::Read),
            "write" => Some(Action::Write),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PermissionLiteral {
    model: String,
    action: Action,
    #[serde(default)]
    roles: Vec<String>,
    access: Value,
}

/// One grant of access on a model and action
#[derive(Debug, Clone, PartialEq)]
pub struct Permission {
    pub model: String,
    pub action: Action,
    /// Roles the grant applies to; empty means everyone
    pub roles: Vec<String>,
    pub access: AccessValue,
}

impl Permission {
    pub fn new(model: impl Into<String>, action: Action, access: AccessValue) -> Self {
        Self {
            model: model.into(),
            action,
            roles: Vec::new(),
            access,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Parse `{model, action, roles?, access}` under the operator `prefix`
    pub fn parse(value: &Value, prefix: &str) -> AccessResult<Self> {
        Self::parse_with(value, &FilterParser::new(prefix))
    }

    pub fn parse_with(value: &Value, parser: &FilterParser) -> AccessResult<Self> {
        let literal: PermissionLiteral = serde_json::from_value(value.clone())
            .map_err(|e| AccessError::invalid(format!("invalid permission: {}", e)))?;

        if literal.model.is_empty() {
            return Err(AccessError::invalid("permission model is empty"));
        }
        if literal.roles.iter().any(String::is_empty) {
            return Err(AccessError::invalid(format!(
                "permission on '{}' lists an empty role",
                literal.model
            )));
        }

        Ok(Self {
            access: AccessValue::parse_with(&literal.access, parser)?,
            model: literal.model,
            action: literal.action,
            roles: literal.roles,
        })
    }

    pub fn is_public(&self) -> bool {
        self.roles.is_empty()
    }

    /// Whether the grant applies to `model`, `action` and a caller with `roles`
    pub fn applies_to(&self, model: &str, action: Action, roles: &[String]) -> bool {
        self.model == model
            && self.action == action
            && (self.is_public() || self.roles.iter().any(|role| roles.contains(role)))
    }

    pub fn to_value(&self, prefix: &str) -> Value {
        json!({
            "model": self.model,
            "action": self.action.as_str(),
            "roles": self.roles,
            "access": self.access.to_value(prefix),
        })
    }
}

/// All permissions declared for a deployment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionSet {
    permissions: Vec<Permission>,
}

impl PermissionSet {
    pub fn new(permissions: Vec<Permission>) -> Self {
        Self { permissions }
    }

    /// Parse an array of permission literals
    pub fn parse(value: &Value, prefix: &str) -> AccessResult<Self> {
        Self::parse_with(value, &FilterParser::new(prefix))
    }

    pub fn parse_with(value: &Value, parser: &FilterParser) -> AccessResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| AccessError::invalid("expected an array of permissions"))?;

        let mut permissions = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let permission = Permission::parse_with(item, parser).map_err(|e| match e {
                AccessError::InvalidAccessValue(reason) => {
                    AccessError::invalid(format!("permission {}: {}", index, reason))
                }
                other => other,
            })?;
            permissions.push(permission);
        }
        Ok(Self { permissions })
    }

    pub fn push(&mut self, permission: Permission) {
        self.permissions.push(permission);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Unite the grants applicable to a caller. No applicable grant denies.
    pub fn resolve(&self, model: &str, action: Action, roles: &[String]) -> AccessValue {
        let matching: Vec<&Permission> = self
            .permissions
            .iter()
            .filter(|p| p.applies_to(model, action, roles))
            .collect();

        let access = AccessValue::unite_all(matching.iter().map(|p| p.access.clone()));

        debug!(
            model,
            action = action.as_str(),
            matched = matching.len(),
            allowed = !access.is_denied(),
            "Resolved access grant"
        );
        access
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn permissions() -> PermissionSet {
        PermissionSet::parse(
            &json!([
                {"model": "posts", "action": "read", "access": {"filter": {"published": true}}},
                {"model": "posts", "action": "read", "roles": ["editor"], "access": true},
                {"model": "posts", "action": "write", "roles": ["author"],
                 "access": {"fields": ["title", "body"], "filter": {"author_id": "$actor"}}}
            ]),
            "$",
        )
        .unwrap()
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::from_name("READ"), Some(Action::Read));
        assert_eq!(Action::from_name("publish"), None);
        assert_eq!(Action::Delete.to_string(), "delete");
    }

    #[test]
    fn test_public_grant_applies_to_everyone() {
        let access = permissions().resolve("posts", Action::Read, &[]);
        assert_eq!(access.to_value("$"), json!({"filter": {"published": true}}));
    }

    #[test]
    fn test_role_grant_widens_public_grant() {
        let access = permissions().resolve("posts", Action::Read, &roles(&["editor"]));
        assert!(access.is_allowed());
    }

    #[test]
    fn test_no_matching_grant_denies() {
        let set = permissions();
        assert!(set.resolve("posts", Action::Delete, &roles(&["editor"])).is_denied());
        assert!(set.resolve("posts", Action::Write, &roles(&["reader"])).is_denied());
        assert!(set.resolve("comments", Action::Read, &[]).is_denied());
    }

    #[test]
    fn test_parse_rejects_bad_permissions() {
        for literal in [
            json!({"model": "posts", "action": "read", "access": true}),
            json!([{"model": "posts", "action": "publish", "access": true}]),
            json!([{"model": "", "action": "read", "access": true}]),
            json!([{"model": "posts", "action": "read"}]),
            json!([{"model": "posts", "action": "read", "roles": [""], "access": true}]),
            json!([{"model": "posts", "action": "read", "access": true, "extra": 1}]),
            json!([{"model": "posts", "action": "read", "access": 3}]),
        ] {
            assert!(PermissionSet::parse(&literal, "$").is_err(), "{}", literal);
        }
    }

    #[test]
    fn test_to_value_roundtrip() {
        let set = permissions();
        let values: Vec<Value> = set.iter().map(|p| p.to_value("$")).collect();
        let reparsed = PermissionSet::parse(&Value::Array(values), "$").unwrap();
        assert_eq!(reparsed, set);
    }
}
