//! Request-scoped caller identity and the authorization step.
//!
//! Authorization narrows the caller's own request (visible fields and record
//! filter) by the grant resolved for them. What survives is the query the
//! storage layer runs.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::fields::FieldSet;
use crate::filter::QueryFilter;

use super::errors::{AccessError, AccessResult};
use super::permission::{Action, PermissionSet};
use super::value::AccessValue;

/// Caller identity carried with each request
#[derive(Debug, Clone)]
pub struct AccessContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    /// The authenticated actor (None if anonymous)
    pub actor_id: Option<String>,

    /// Roles held by the actor
    pub roles: Vec<String>,
}

impl AccessContext {
    /// Create context for an authenticated actor
    pub fn authenticated(actor_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            actor_id: Some(actor_id.into()),
            roles: Vec::new(),
        }
    }

    /// Create context for anonymous access
    pub fn anonymous() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            actor_id: None,
            roles: Vec::new(),
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

    pub fn is_authenticated(&self) -> bool {
        self.actor_id.is_some()
    }

    /// Narrow the caller's request by `grant`.
    ///
    /// `fields` and `filter` are what the caller asked for; `None` asks for
    /// everything. A deny maps to `Forbidden` for an authenticated actor and
    /// to `Unauthorized` for an anonymous caller.
    pub fn authorize(
        &self,
        model: &str,
        action: Action,
        grant: AccessValue,
        fields: Option<FieldSet>,
        filter: Option<QueryFilter>,
    ) -> AccessResult<ScopedQuery> {
        let requested = AccessValue::scoped(fields, filter);

        match grant.intersect(requested) {
            AccessValue::Absolute(false) => Err(self.denied(model, action)),
            AccessValue::Absolute(true) => {
                debug!(request_id = %self.request_id, model, action = action.as_str(), "Access granted");
                Ok(ScopedQuery::unrestricted())
            }
            AccessValue::Scoped { fields, filter } => {
                debug!(request_id = %self.request_id, model, action = action.as_str(), "Scoped access granted");
                Ok(ScopedQuery {
                    fields,
                    filter: filter.unwrap_or_default(),
                })
            }
        }
    }

    /// Resolve the caller's grant from `permissions`, then authorize
    pub fn authorize_with(
        &self,
        permissions: &PermissionSet,
        model: &str,
        action: Action,
        fields: Option<FieldSet>,
        filter: Option<QueryFilter>,
    ) -> AccessResult<ScopedQuery> {
        let grant = permissions.resolve(model, action, &self.roles);
        self.authorize(model, action, grant, fields, filter)
    }

    fn denied(&self, model: &str, action: Action) -> AccessError {
        warn!(
            request_id = %self.request_id,
            actor = self.actor_id.as_deref().unwrap_or("<anonymous>"),
            model,
            action = action.as_str(),
            "Access denied"
        );
        let model = model.to_string();
        let action = action.as_str().to_string();
        if self.is_authenticated() {
            AccessError::Forbidden { model, action }
        } else {
            AccessError::Unauthorized { model, action }
        }
    }
}

impl Default for AccessContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// The query left after authorization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedQuery {
    /// Visible fields; `None` means all
    pub fields: Option<FieldSet>,
    pub filter: QueryFilter,
}

impl ScopedQuery {
    pub fn unrestricted() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grant(value: serde_json::Value) -> AccessValue {
        AccessValue::parse(&value, "$").unwrap()
    }

    #[test]
    fn test_forbidden_vs_unauthorized() {
        let actor = AccessContext::authenticated("u1");
        let err = actor
            .authorize("posts", Action::Delete, AccessValue::deny(), None, None)
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden { .. }));

        let anonymous = AccessContext::anonymous();
        let err = anonymous
            .authorize("posts", Action::Delete, AccessValue::deny(), None, None)
            .unwrap_err();
        assert!(matches!(err, AccessError::Unauthorized { .. }));
    }

    #[test]
    fn test_allow_passes_request_through() {
        let ctx = AccessContext::authenticated("u1");
        let fields = FieldSet::new(["title"]);
        let filter = QueryFilter::parse(&json!({"draft": false}), "$").unwrap();

        let query = ctx
            .authorize(
                "posts",
                Action::Read,
                AccessValue::allow(),
                Some(fields.clone()),
                Some(filter.clone()),
            )
            .unwrap();
        assert_eq!(query.fields, Some(fields));
        assert_eq!(query.filter, filter);
    }

    #[test]
    fn test_request_is_narrowed_by_grant() {
        let ctx = AccessContext::authenticated("u1");
        let query = ctx
            .authorize(
                "posts",
                Action::Read,
                grant(json!({"fields": ["title", "body"], "filter": {"published": true}})),
                Some(FieldSet::new(["title", "secret"])),
                Some(QueryFilter::parse(&json!({"tag": "rust"}), "$").unwrap()),
            )
            .unwrap();

        assert_eq!(query.fields, Some(FieldSet::new(["title"])));
        assert_eq!(
            query.filter.serialize("$"),
            json!({"$and": [{"published": true}, {"tag": "rust"}]})
        );
    }

    #[test]
    fn test_unrestricted_request_and_grant() {
        let query = AccessContext::anonymous()
            .authorize("posts", Action::Read, AccessValue::allow(), None, None)
            .unwrap();
        assert_eq!(query, ScopedQuery::unrestricted());
        assert!(query.filter.is_match_all());
    }

    #[test]
    fn test_authorize_with_roles() {
        let permissions = PermissionSet::parse(
            &json!([{"model": "posts", "action": "write", "roles": ["author"], "access": true}]),
            "$",
        )
        .unwrap();

        let author = AccessContext::authenticated("u1").with_roles(["author"]);
        assert!(author
            .authorize_with(&permissions, "posts", Action::Write, None, None)
            .is_ok());

        let reader = AccessContext::authenticated("u2").with_roles(["reader"]);
        let err = reader
            .authorize_with(&permissions, "posts", Action::Write, None, None)
            .unwrap_err();
        assert_eq!(err.code(), "AERO_FORBIDDEN");
    }
}
