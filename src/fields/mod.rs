//! # Field Sets
//!
//! Named-field visibility sets. An absent set (`None`) means every field is
//! visible, an empty set means none are.

mod errors;
mod field_set;

pub use errors::{FieldSetError, FieldSetResult};
pub use field_set::{FieldSet, FieldSetMap, ID_FIELD};
