//! # Access Control
//!
//! Access values, permission records and the authorization step that turns
//! a caller's roles and request into a scoped storage query.

mod context;
mod errors;
mod permission;
mod value;

pub use context::{AccessContext, ScopedQuery};
pub use errors::{AccessError, AccessResult, ErrorResponse};
pub use permission::{Action, Permission, PermissionSet};
pub use value::AccessValue;
