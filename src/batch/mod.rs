//! # Storage Batching
//!
//! The storage collaborator interface, an in-memory backend and the
//! request-scoped batching cache that wraps any backend.

mod cache;
mod errors;
mod key;
mod memory;
mod storage;

pub use cache::{BatchingStorage, Lookup};
pub use errors::{StorageError, StorageResult};
pub use key::CacheKey;
pub use memory::InMemoryStorage;
pub use storage::{record_id, FindResult, Pagination, Record, StorageBackend};
