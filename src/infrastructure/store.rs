//! Document store seam.
//!
//! Every persistent record of the service lives in a collection of JSON
//! documents. Backends implement [`DocumentStore`]; the rest of the crate only
//! ever talks to an `Arc<dyn DocumentStore>` built once at startup.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use derive_more::Display;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

pub mod memory;
pub mod postgres;
pub mod subscription;

pub use subscription::{LiveQuery, Subscription};

pub type DocumentData = Map<String, Value>;
pub type SharedStore = Arc<dyn DocumentStore>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: DocumentData,
}

impl Document {
    pub fn new(id: impl Into<String>, data: DocumentData) -> Self {
        Document { id: id.into(), data }
    }

    /// Decodes the document into a record, exposing the document id as `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data)).map_err(StoreError::from)
    }

    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup_field(&self.data, path)
    }
}

/// Decodes every document, dropping (and logging) the ones that don't fit `T`.
pub fn decode_all<T: DeserializeOwned>(docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(document_id = %doc.id, "Skipping malformed document: {}", e);
                None
            }
        })
        .collect()
}

/// Serializes a record into document fields. The `id` key is never stored.
pub fn to_document_data<T: Serialize>(record: &T) -> Result<DocumentData, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(StoreError::Serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum StoreError {
    #[display("Document not found: {_0}")]
    NotFound(String),

    /// The backend needs a composite index to serve a filtered + ordered query.
    #[display("Missing composite index: {_0}")]
    MissingIndex(String),

    #[display("Store unavailable: {_0}")]
    Unavailable(String),

    #[display("Serialization error: {_0}")]
    Serialization(String),

    #[display("Store backend error: {_0}")]
    Backend(String),
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".into()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FieldOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn matches(&self, data: &DocumentData) -> bool {
        let current = lookup_field(data, &self.field);
        match self.op {
            FieldOp::Equal => current == Some(&self.value),
            // Documents lacking the field never match an inequality.
            FieldOp::NotEqual => match current {
                None | Some(Value::Null) => false,
                Some(value) => value != &self.value,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A structured query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(path: impl Into<String>) -> Self {
        Query {
            collection: path.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FieldOp::Equal, value.into())
    }

    pub fn where_not_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FieldOp::NotEqual, value.into())
    }

    fn filter(mut self, field: &str, op: FieldOp, value: Value) -> Self {
        self.filters.push(FieldFilter {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Collection id used for index lookups: the last segment of the path,
    /// so every `projects/{id}/comments` shares the `comments` group.
    pub fn collection_group(&self) -> &str {
        self.collection
            .rsplit('/')
            .next()
            .unwrap_or(self.collection.as_str())
    }

    /// Whether serving this query needs a composite index: a filter combined
    /// with an ordering on a field the filters don't cover.
    pub fn needs_composite_index(&self) -> bool {
        match &self.order_by {
            Some(order) => {
                !self.filters.is_empty() && self.filters.iter().any(|f| f.field != order.field)
            }
            None => false,
        }
    }

    /// Fields of the composite index, filters first then the ordering field.
    pub fn index_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.filters.iter().map(|f| f.field.clone()).collect();
        if let Some(order) = &self.order_by {
            fields.push(order.field.clone());
        }
        fields
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Stores a new document under a generated id and returns that id.
    async fn add(&self, collection: &str, data: DocumentData) -> Result<String, StoreError>;

    /// Creates or replaces the document `id`.
    async fn set(&self, collection: &str, id: &str, data: DocumentData) -> Result<(), StoreError>;

    /// Merges `fields` into an existing document. Fails with `NotFound` if absent.
    async fn update(&self, collection: &str, id: &str, fields: DocumentData) -> Result<(), StoreError>;

    /// Deletes the document, returning whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Runs `query` now and again after every change to its collection.
    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

pub fn lookup_field<'a>(data: &'a DocumentData, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = data.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type first, then by value.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> DocumentData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn decode_exposes_document_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let doc = Document::new("dev1", data(json!({"name": "Alex"})));
        let named: Named = doc.decode().unwrap();
        assert_eq!(named.id, "dev1");
        assert_eq!(named.name, "Alex");
    }

    #[test]
    fn to_document_data_strips_id() {
        let fields = to_document_data(&json!({"id": "x", "title": "Nav Store"})).unwrap();
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["title"], "Nav Store");
    }

    #[test]
    fn not_equal_filter_skips_missing_fields() {
        let filter = FieldFilter {
            field: "category".into(),
            op: FieldOp::NotEqual,
            value: json!("Web App"),
        };
        assert!(filter.matches(&data(json!({"category": "Mobile App"}))));
        assert!(!filter.matches(&data(json!({"category": "Web App"}))));
        assert!(!filter.matches(&data(json!({"title": "no category"}))));
    }

    #[test]
    fn nested_field_lookup() {
        let fields = data(json!({"links": {"github": "https://github.com/a"}}));
        assert_eq!(
            lookup_field(&fields, "links.github"),
            Some(&json!("https://github.com/a"))
        );
        assert_eq!(lookup_field(&fields, "links.twitter"), None);
    }

    #[test]
    fn composite_index_detection() {
        let featured = Query::collection("projects")
            .where_eq("featured", true)
            .order_by("createdAt", Direction::Descending);
        assert!(featured.needs_composite_index());
        assert_eq!(featured.index_fields(), vec!["featured", "createdAt"]);

        let comments = Query::collection("projects/p1/comments")
            .order_by("createdAt", Direction::Descending);
        assert!(!comments.needs_composite_index());
        assert_eq!(comments.collection_group(), "comments");
    }

    #[test]
    fn values_order_by_type_then_value() {
        assert_eq!(compare_values(&json!(null), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(
            compare_values(&json!("2024-01-02"), &json!("2023-12-31")),
            Ordering::Greater
        );
    }
}
