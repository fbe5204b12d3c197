//! In-process document store.
//!
//! Mirrors the semantics of a hosted document database closely enough for
//! local runs and tests: insertion-ordered collections, equality/inequality
//! filters, single-field ordering that skips documents lacking the field, and
//! optional enforcement of composite indexes for filtered + ordered queries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use super::{
    compare_values, lookup_field, Direction, Document, DocumentData, DocumentStore, Query,
    StoreError, Subscription,
};

const CHANGE_BUFFER: usize = 256;
const GENERATED_ID_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeIndex {
    pub collection_group: String,
    pub fields: Vec<String>,
}

impl CompositeIndex {
    pub fn new(collection_group: &str, fields: &[&str]) -> Self {
        CompositeIndex {
            collection_group: collection_group.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

struct StoredDocument {
    seq: u64,
    data: DocumentData,
}

struct Inner {
    collections: RwLock<HashMap<String, HashMap<String, StoredDocument>>>,
    /// `None` serves every query; `Some` rejects composite queries not listed.
    indexes: RwLock<Option<HashSet<CompositeIndex>>>,
    changes: broadcast::Sender<String>,
    sequence: AtomicU64,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        MemoryStore {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                indexes: RwLock::new(None),
                changes,
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// A store that rejects filtered + ordered queries unless a matching
    /// composite index has been declared.
    pub fn with_index_enforcement(indexes: impl IntoIterator<Item = CompositeIndex>) -> Self {
        let store = Self::new();
        *store.inner.indexes.write() = Some(indexes.into_iter().collect());
        store
    }

    pub fn add_index(&self, index: CompositeIndex) {
        if let Some(indexes) = self.inner.indexes.write().as_mut() {
            indexes.insert(index);
        }
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .get(collection)
            .map_or(0, HashMap::len)
    }

    fn check_index(&self, query: &Query) -> Result<(), StoreError> {
        if !query.needs_composite_index() {
            return Ok(());
        }
        let indexes = self.inner.indexes.read();
        let Some(indexes) = indexes.as_ref() else {
            return Ok(());
        };

        let wanted = CompositeIndex {
            collection_group: query.collection_group().to_string(),
            fields: query.index_fields(),
        };
        if indexes.contains(&wanted) {
            Ok(())
        } else {
            Err(StoreError::MissingIndex(format!(
                "query on '{}' requires an index on ({})",
                wanted.collection_group,
                wanted.fields.join(", ")
            )))
        }
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.check_index(query)?;

        let collections = self.inner.collections.read();
        let Some(collection) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<(&String, &StoredDocument)> = collection
            .iter()
            .filter(|(_, doc)| query.filters.iter().all(|f| f.matches(&doc.data)))
            .collect();
        matched.sort_by_key(|(_, doc)| doc.seq);

        if let Some(order) = &query.order_by {
            let key = |doc: &StoredDocument| -> Value {
                lookup_field(&doc.data, &order.field).cloned().unwrap_or(Value::Null)
            };
            matched.retain(|(_, doc)| lookup_field(&doc.data, &order.field).is_some());
            matched.sort_by(|(_, a), (_, b)| {
                let ordering = compare_values(&key(a), &key(b));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        Ok(matched
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|(id, doc)| Document::new(id.clone(), doc.data.clone()))
            .collect())
    }

    fn write(&self, collection: &str, id: &str, data: DocumentData) {
        let seq = self.inner.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        {
            let mut collections = self.inner.collections.write();
            let docs = collections.entry(collection.to_string()).or_default();
            match docs.get_mut(id) {
                Some(existing) => existing.data = data,
                None => {
                    docs.insert(id.to_string(), StoredDocument { seq, data });
                }
            }
        }
        self.notify(collection);
    }

    fn notify(&self, collection: &str) {
        // No receivers simply means nobody is listening.
        let _ = self.inner.changes.send(collection.to_string());
    }
}

fn generate_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(GENERATED_ID_LEN);
    id
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .inner
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|doc| Document::new(id, doc.data.clone())))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.run_query(query)
    }

    async fn add(&self, collection: &str, data: DocumentData) -> Result<String, StoreError> {
        let id = generate_id();
        self.write(collection, &id, data);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: DocumentData) -> Result<(), StoreError> {
        self.write(collection, id, data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: DocumentData) -> Result<(), StoreError> {
        {
            let mut collections = self.inner.collections.write();
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
            for (key, value) in fields {
                doc.data.insert(key, value);
            }
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let removed = self
            .inner
            .collections
            .write()
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            self.notify(collection);
        }
        Ok(removed)
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError> {
        self.check_index(&query)?;

        let store = self.clone();
        let mut changes = self.inner.changes.subscribe();

        Ok(Subscription::spawn(move |sender| async move {
            if sender.send(store.run_query(&query)).await.is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(path) if path != query.collection => continue,
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        let snapshot = store.run_query(&query);
                        let failed = snapshot.is_err();
                        if sender.send(snapshot).await.is_err() || failed {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
