//! Request-scoped batching cache.
//!
//! [`BatchingStorage`] wraps a storage backend for the lifetime of one
//! request. Identical queries share a single result, and single-record
//! lookups issued in the same scheduler turn are coalesced into one
//! multi-identifier backend call per (batching key, filter).
//!
//! ## Flow
//!
//! 1. A lookup computes its cache key and returns the cached shared result
//!    on a hit.
//! 2. On a miss it joins the pending queue for its batch and yields once.
//!    The first member to resume drains the whole queue, so everything
//!    enqueued in the same turn lands in one batch on any runtime flavor.
//! 3. The drained batch runs in a spawned task that issues one backend call
//!    and routes each record back to its caller, projected to the caller's
//!    own fields. A lookup arriving after the drain opens a new batch.
//! 4. A failure reaches every member of the batch and evicts their cache
//!    entries, so the next lookup queries again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexSet;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::access::ScopedQuery;
use crate::config::AccessConfig;
use crate::fields::{FieldSet, ID_FIELD};
use crate::filter::QueryFilter;
use crate::observability::MetricsRegistry;

use super::errors::{StorageError, StorageResult};
use super::key::{BatchKey, CacheKey};
use super::storage::{record_id, FindResult, Pagination, Record, StorageBackend};

type SharedResult<T> = Shared<BoxFuture<'static, StorageResult<T>>>;

/// A single-record lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub model: String,
    pub id: String,
    /// Visible fields; `None` means all
    pub fields: Option<FieldSet>,
    pub filter: QueryFilter,
    /// Lookups with the same batching key and filter share a backend call.
    /// Defaults to the model.
    pub batch_key: Option<String>,
}

impl Lookup {
    pub fn new(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
            fields: None,
            filter: QueryFilter::match_all(),
            batch_key: None,
        }
    }

    pub fn with_fields(mut self, fields: FieldSet) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_batch_key(mut self, batch_key: impl Into<String>) -> Self {
        self.batch_key = Some(batch_key.into());
        self
    }

    /// Restrict the lookup to an authorized query
    pub fn scoped(mut self, query: ScopedQuery) -> Self {
        self.fields = query.fields;
        self.filter = query.filter;
        self
    }
}

struct PendingLookup {
    id: String,
    fields: Option<FieldSet>,
    cache_key: CacheKey,
    entry: SharedResult<Option<Record>>,
    sender: oneshot::Sender<StorageResult<Option<Record>>>,
}

/// Lookups waiting to be drained together
struct PendingBatch {
    generation: u64,
    members: Vec<PendingLookup>,
}

#[derive(Default)]
struct BatchState {
    lookups: HashMap<CacheKey, SharedResult<Option<Record>>>,
    queries: HashMap<CacheKey, SharedResult<FindResult>>,
    pending: HashMap<BatchKey, PendingBatch>,
    next_generation: u64,
}

fn lock(state: &Mutex<BatchState>) -> MutexGuard<'_, BatchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Storage wrapper that memoizes and coalesces lookups within one request.
///
/// Clones share the same cache; use [`BatchingStorage::new_scope`] for the
/// next request.
#[derive(Clone)]
pub struct BatchingStorage {
    inner: Arc<dyn StorageBackend>,
    state: Arc<Mutex<BatchState>>,
    batching_enabled: bool,
    metrics: Arc<MetricsRegistry>,
}

impl BatchingStorage {
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(BatchState::default())),
            batching_enabled: true,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn from_config(inner: Arc<dyn StorageBackend>, config: &AccessConfig) -> Self {
        Self::new(inner).with_batching(config.batching_enabled)
    }

    /// Toggle coalescing. Lookups stay memoized either way.
    pub fn with_batching(mut self, enabled: bool) -> Self {
        self.batching_enabled = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// A fresh request scope over the same backend and counters
    pub fn new_scope(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            state: Arc::new(Mutex::new(BatchState::default())),
            batching_enabled: self.batching_enabled,
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn inner(&self) -> &Arc<dyn StorageBackend> {
        &self.inner
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn is_batching_enabled(&self) -> bool {
        self.batching_enabled
    }

    /// Load one record, serializing the filter for the wrapped backend
    pub async fn load(&self, lookup: Lookup) -> StorageResult<Option<Record>> {
        let filter = lookup.filter.translate(self.inner.operator_prefix())?;
        let batch_key = lookup.batch_key.unwrap_or_else(|| lookup.model.clone());
        self.find_one(&lookup.model, &lookup.id, lookup.fields, filter, batch_key)
            .await
    }

    /// Run a paged query, serializing the filter for the wrapped backend
    pub async fn query(
        &self,
        model: &str,
        fields: Option<&FieldSet>,
        filter: &QueryFilter,
        pagination: &Pagination,
    ) -> StorageResult<FindResult> {
        let filter = filter.translate(self.inner.operator_prefix())?;
        self.find_memoized(model, fields, &filter, pagination).await
    }

    fn state(&self) -> MutexGuard<'_, BatchState> {
        lock(&self.state)
    }

    fn flusher(&self) -> Flusher {
        Flusher {
            inner: Arc::clone(&self.inner),
            state: Arc::downgrade(&self.state),
            metrics: Arc::clone(&self.metrics),
        }
    }

    async fn find_one(
        &self,
        model: &str,
        id: &str,
        fields: Option<FieldSet>,
        filter: Value,
        batch_key: String,
    ) -> StorageResult<Option<Record>> {
        let (cache_key, entry) = self.enqueue(model, id, fields, filter, batch_key);
        let result = entry.clone().await;
        if result.is_err() {
            evict(&mut self.state().lookups, &cache_key, &entry);
        }
        result
    }

    fn enqueue(
        &self,
        model: &str,
        id: &str,
        fields: Option<FieldSet>,
        filter: Value,
        batch_key: String,
    ) -> (CacheKey, SharedResult<Option<Record>>) {
        let cache_key = CacheKey::find_one(model, id, fields.as_ref(), &filter);
        let mut state = self.state();

        if let Some(entry) = state.lookups.get(&cache_key) {
            self.metrics.increment_cache_hits();
            return (cache_key, entry.clone());
        }
        self.metrics.increment_cache_misses();

        if !self.batching_enabled {
            let inner = Arc::clone(&self.inner);
            let metrics = Arc::clone(&self.metrics);
            let (model, id) = (model.to_string(), id.to_string());
            let entry = async move {
                metrics.increment_backend_calls();
                inner.find_one_by_id(&model, &id, fields.as_ref(), &filter).await
            }
            .boxed()
            .shared();
            state.lookups.insert(cache_key.clone(), entry.clone());
            return (cache_key, entry);
        }

        let key = BatchKey {
            model: model.to_string(),
            batch_key,
            filter: filter.to_string(),
        };
        let queued = state.pending.get(&key).map(|batch| batch.generation);
        let generation = match queued {
            Some(generation) => generation,
            None => {
                state.next_generation += 1;
                state.next_generation
            }
        };

        // Every member yields once and then drains its batch if nobody has yet.
        // The drain runs inside the caller's own task, so lookups issued in the
        // same turn are queued before any of them can drain.
        let (sender, receiver) = oneshot::channel();
        let flusher = self.flusher();
        let drain_key = key.clone();
        let entry = async move {
            tokio::task::yield_now().await;
            flusher.drain(&drain_key, generation, filter);
            receiver.await.unwrap_or_else(|_| {
                Err(StorageError::FlushAborted(
                    "flush ended without delivering a result".to_string(),
                ))
            })
        }
        .boxed()
        .shared();
        state.lookups.insert(cache_key.clone(), entry.clone());

        state
            .pending
            .entry(key)
            .or_insert_with(|| PendingBatch {
                generation,
                members: Vec::new(),
            })
            .members
            .push(PendingLookup {
                id: id.to_string(),
                fields,
                cache_key: cache_key.clone(),
                entry: entry.clone(),
                sender,
            });

        (cache_key, entry)
    }

    async fn find_memoized(
        &self,
        model: &str,
        fields: Option<&FieldSet>,
        filter: &Value,
        pagination: &Pagination,
    ) -> StorageResult<FindResult> {
        let cache_key = CacheKey::find(model, pagination, fields, filter);

        let entry = {
            let mut state = self.state();
            match state.queries.get(&cache_key) {
                Some(entry) => {
                    self.metrics.increment_cache_hits();
                    entry.clone()
                }
                None => {
                    self.metrics.increment_cache_misses();
                    let inner = Arc::clone(&self.inner);
                    let metrics = Arc::clone(&self.metrics);
                    let model = model.to_string();
                    let fields = fields.cloned();
                    let filter = filter.clone();
                    let pagination = pagination.clone();
                    let entry = async move {
                        metrics.increment_backend_calls();
                        inner
                            .find(&model, fields.as_ref(), &filter, &pagination)
                            .await
                    }
                    .boxed()
                    .shared();
                    state.queries.insert(cache_key.clone(), entry.clone());
                    entry
                }
            }
        };

        let result = entry.clone().await;
        if let Err(err) = &result {
            self.metrics.increment_batch_failures();
            warn!(model, error = %err, "Query failed");
            evict(&mut self.state().queries, &cache_key, &entry);
        }
        result
    }
}

/// Drains pending batches and runs their backend calls.
///
/// Holds the scope state weakly: pending entries live in that state and
/// carry a flusher themselves.
#[derive(Clone)]
struct Flusher {
    inner: Arc<dyn StorageBackend>,
    state: Weak<Mutex<BatchState>>,
    metrics: Arc<MetricsRegistry>,
}

impl Flusher {
    /// Take the batch if it is still the `generation` queued under `key`, and
    /// spawn its backend call. The call runs even if every caller goes away.
    fn drain(&self, key: &BatchKey, generation: u64, filter: Value) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let members = {
            let mut state = lock(&state);
            let current = state.pending.get(key).map(|batch| batch.generation);
            if current == Some(generation) {
                state.pending.remove(key).map(|batch| batch.members)
            } else {
                None
            }
        };
        let Some(group) = members else {
            return;
        };

        let flusher = self.clone();
        let key = key.clone();
        tokio::spawn(async move {
            flusher.flush(key, filter, group).await;
        });
    }

    async fn flush(self, key: BatchKey, filter: Value, group: Vec<PendingLookup>) {
        self.metrics.increment_batches_flushed();
        debug!(
            model = %key.model,
            batch_key = %key.batch_key,
            size = group.len(),
            "Flushing batched lookups"
        );

        match self.fetch_group(&key.model, &filter, &group).await {
            Ok(records) => {
                for (member, record) in group.into_iter().zip(records) {
                    // The caller may have gone away; the shared entry still holds the result
                    let _ = member.sender.send(Ok(record));
                }
            }
            Err(err) => {
                self.metrics.increment_batch_failures();
                warn!(
                    model = %key.model,
                    batch_key = %key.batch_key,
                    size = group.len(),
                    error = %err,
                    "Batched lookup failed"
                );

                if let Some(state) = self.state.upgrade() {
                    let mut state = lock(&state);
                    for member in &group {
                        evict(&mut state.lookups, &member.cache_key, &member.entry);
                    }
                }
                for member in group {
                    let _ = member.sender.send(Err(err.clone()));
                }
            }
        }
    }

    /// Answer every member of a batch, in member order
    async fn fetch_group(
        &self,
        model: &str,
        filter: &Value,
        group: &[PendingLookup],
    ) -> StorageResult<Vec<Option<Record>>> {
        self.metrics.increment_backend_calls();

        if let [member] = group {
            let record = self
                .inner
                .find_one_by_id(model, &member.id, member.fields.as_ref(), filter)
                .await?;
            return Ok(vec![record]);
        }

        let ids: IndexSet<&str> = group.iter().map(|m| m.id.as_str()).collect();
        let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();

        let mut members = group.iter();
        let mut fields = members.next().and_then(|m| m.fields.clone());
        for member in members {
            fields = FieldSet::unite(fields.as_ref(), member.fields.as_ref());
        }
        let fields = fields.map(|f| f.union(&FieldSet::new([ID_FIELD])));

        let records = self
            .inner
            .find_by_ids(model, &ids, fields.as_ref(), filter)
            .await?;
        self.metrics.add_lookups_coalesced(group.len() as u64);

        let by_id: HashMap<String, Record> = records
            .into_iter()
            .filter_map(|record| record_id(&record).map(|id| (id, record)))
            .collect();

        Ok(group
            .iter()
            .map(|member| {
                by_id.get(&member.id).map(|record| match &member.fields {
                    Some(fields) => fields.project(record),
                    None => record.clone(),
                })
            })
            .collect())
    }
}

/// Drop `key` if it still maps to `entry`
fn evict<T: Clone>(
    entries: &mut HashMap<CacheKey, SharedResult<T>>,
    key: &CacheKey,
    entry: &SharedResult<T>,
) {
    if entries.get(key).is_some_and(|current| current.ptr_eq(entry)) {
        entries.remove(key);
    }
}

#[async_trait]
impl StorageBackend for BatchingStorage {
    fn operator_prefix(&self) -> &str {
        self.inner.operator_prefix()
    }

    async fn find(
        &self,
        model: &str,
        fields: Option<&FieldSet>,
        filter: &Value,
        pagination: &Pagination,
    ) -> StorageResult<FindResult> {
        self.find_memoized(model, fields, filter, pagination).await
    }

    async fn find_one_by_id(
        &self,
        model: &str,
        id: &str,
        fields: Option<&FieldSet>,
        filter: &Value,
    ) -> StorageResult<Option<Record>> {
        self.find_one(model, id, fields.cloned(), filter.clone(), model.to_string())
            .await
    }

    async fn find_by_ids(
        &self,
        model: &str,
        ids: &[String],
        fields: Option<&FieldSet>,
        filter: &Value,
    ) -> StorageResult<Vec<Record>> {
        self.metrics.increment_backend_calls();
        self.inner.find_by_ids(model, ids, fields, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::InMemoryStorage;
    use serde_json::json;

    fn storage() -> BatchingStorage {
        let inner = InMemoryStorage::new();
        inner
            .insert("users", json!({"id": "1", "name": "Ada", "email": "ada@example.com"}))
            .unwrap();
        inner
            .insert("users", json!({"id": "2", "name": "Bob", "email": "bob@example.com"}))
            .unwrap();
        BatchingStorage::new(Arc::new(inner))
    }

    #[test]
    fn test_lookup_builder() {
        let lookup = Lookup::new("users", "1")
            .with_fields(FieldSet::new(["name"]))
            .with_batch_key("users-by-id");
        assert_eq!(lookup.batch_key.as_deref(), Some("users-by-id"));
        assert!(lookup.filter.is_match_all());

        let scoped = lookup.scoped(ScopedQuery::unrestricted());
        assert_eq!(scoped.fields, None);
    }

    #[tokio::test]
    async fn test_projects_each_caller_to_own_fields() {
        let storage = storage();
        let (a, b) = tokio::join!(
            storage.load(Lookup::new("users", "1").with_fields(FieldSet::new(["name"]))),
            storage.load(Lookup::new("users", "2").with_fields(FieldSet::new(["email"]))),
        );

        assert_eq!(a.unwrap(), Some(json!({"id": "1", "name": "Ada"})));
        assert_eq!(b.unwrap(), Some(json!({"id": "2", "email": "bob@example.com"})));
        assert_eq!(storage.metrics().snapshot().backend_calls, 1);
    }

    #[tokio::test]
    async fn test_memoizes_within_scope() {
        let storage = storage();
        let first = storage.load(Lookup::new("users", "1")).await.unwrap();
        let second = storage.load(Lookup::new("users", "1")).await.unwrap();

        assert_eq!(first, second);
        let snapshot = storage.metrics().snapshot();
        assert_eq!(snapshot.backend_calls, 1);
        assert_eq!(snapshot.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_disabled_batching_still_memoizes() {
        let storage = storage().with_batching(false);
        let (a, b) = tokio::join!(
            storage.load(Lookup::new("users", "1")),
            storage.load(Lookup::new("users", "2")),
        );
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert_eq!(storage.metrics().backend_calls(), 2);

        storage.load(Lookup::new("users", "1")).await.unwrap();
        assert_eq!(storage.metrics().backend_calls(), 2);
    }

    #[tokio::test]
    async fn test_query_is_memoized() {
        let storage = storage();
        let filter = QueryFilter::parse(&json!({"name": "Ada"}), "$").unwrap();

        let first = storage
            .query("users", None, &filter, &Pagination::default())
            .await
            .unwrap();
        let second = storage
            .query("users", None, &filter, &Pagination::default())
            .await
            .unwrap();

        assert_eq!(first.count, 1);
        assert_eq!(first, second);
        assert_eq!(storage.metrics().backend_calls(), 1);
    }
}
