//! PostgreSQL backed document store.
//!
//! Documents live in a single JSONB table keyed by `(collection, id)`; a
//! trigger publishes the collection of every changed row on the
//! `document_changes` channel, which drives subscriptions.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgListener, types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    Direction, Document, DocumentData, DocumentStore, FieldOp, Query, StoreError, Subscription,
};
use crate::db::postgres::create_pool;

const CHANGE_CHANNEL: &str = "document_changes";

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        PgDocumentStore { pool }
    }

    /// Connects, then applies the schema migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = create_pool(database_url, max_connections).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        Ok(PgDocumentStore { pool })
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT id, data FROM documents WHERE collection = ");
        builder.push_bind(query.collection.clone());

        for filter in &query.filters {
            let path = field_path(&filter.field);
            match filter.op {
                FieldOp::Equal => {
                    builder.push(" AND data #> ").push_bind(path);
                    builder.push(" = ").push_bind(Json(filter.value.clone()));
                }
                FieldOp::NotEqual => {
                    builder.push(" AND jsonb_typeof(data #> ").push_bind(path.clone());
                    builder.push(") <> 'null' AND data #> ").push_bind(path);
                    builder.push(" <> ").push_bind(Json(filter.value.clone()));
                }
            }
        }

        match &query.order_by {
            Some(order) => {
                let path = field_path(&order.field);
                builder.push(" AND data #> ").push_bind(path.clone());
                builder.push(" IS NOT NULL ORDER BY data #> ").push_bind(path);
                builder.push(match order.direction {
                    Direction::Ascending => " ASC",
                    Direction::Descending => " DESC",
                });
                builder.push(", seq ASC");
            }
            None => {
                builder.push(" ORDER BY seq ASC");
            }
        }

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows: Vec<(String, Json<DocumentData>)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(data))| Document::new(id, data))
            .collect())
    }
}

fn field_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row: Option<(String, Json<DocumentData>)> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, Json(data))| Document::new(id, data)))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.fetch(query).await
    }

    async fn add(&self, collection: &str, data: DocumentData) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(Value::Object(data)))
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: DocumentData) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(Value::Object(data)))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: DocumentData) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = data || $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{collection}/{id}")));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let store = self.clone();
        Ok(Subscription::spawn(move |sender| async move {
            if sender.send(store.fetch(&query).await).await.is_err() {
                return;
            }
            loop {
                match listener.recv().await {
                    Ok(notification) if notification.payload() != query.collection => continue,
                    Ok(_) => {
                        let snapshot = store.fetch(&query).await;
                        let failed = snapshot.is_err();
                        if sender.send(snapshot).await.is_err() || failed {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Document change listener failed: {}", e);
                        let _ = sender.send(Err(StoreError::from(e))).await;
                        break;
                    }
                }
            }
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(StoreError::from)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
