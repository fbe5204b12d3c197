use async_trait::async_trait;
use serde_json::Value;

use crate::{
    constants::comments_path,
    entities::comment::Comment,
    repositories::store_repo::StoreCommentRepo,
    store::{
        decode_all, to_document_data, Direction, DocumentData, LiveQuery, Query, SharedStore,
        StoreError,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Comments of a project, newest first.
    async fn list(&self, project_id: &str) -> Result<Vec<Comment>, StoreError>;
    async fn find(&self, project_id: &str, comment_id: &str) -> Result<Option<Comment>, StoreError>;
    async fn insert(&self, project_id: &str, comment: &Comment) -> Result<String, StoreError>;
    async fn update(&self, project_id: &str, comment_id: &str, changes: DocumentData) -> Result<(), StoreError>;
    async fn delete(&self, project_id: &str, comment_id: &str) -> Result<bool, StoreError>;

    /// The rating of every comment document, including malformed ones.
    async fn list_ratings(&self, project_id: &str) -> Result<Vec<Option<f64>>, StoreError>;

    async fn watch(&self, project_id: &str) -> Result<LiveQuery<Comment>, StoreError>;
}

impl StoreCommentRepo {
    pub fn new(store: SharedStore) -> Self {
        StoreCommentRepo { store }
    }

    fn newest_first(project_id: &str) -> Query {
        Query::collection(comments_path(project_id)).order_by("createdAt", Direction::Descending)
    }
}

#[async_trait]
impl CommentRepository for StoreCommentRepo {
    async fn list(&self, project_id: &str) -> Result<Vec<Comment>, StoreError> {
        let docs = self.store.query(&Self::newest_first(project_id)).await?;
        Ok(decode_all(&docs))
    }

    async fn find(&self, project_id: &str, comment_id: &str) -> Result<Option<Comment>, StoreError> {
        self.store
            .get(&comments_path(project_id), comment_id)
            .await?
            .map(|doc| doc.decode::<Comment>())
            .transpose()
    }

    async fn insert(&self, project_id: &str, comment: &Comment) -> Result<String, StoreError> {
        let data = to_document_data(comment)?;
        self.store.add(&comments_path(project_id), data).await
    }

    async fn update(&self, project_id: &str, comment_id: &str, changes: DocumentData) -> Result<(), StoreError> {
        self.store.update(&comments_path(project_id), comment_id, changes).await
    }

    async fn delete(&self, project_id: &str, comment_id: &str) -> Result<bool, StoreError> {
        self.store.delete(&comments_path(project_id), comment_id).await
    }

    async fn list_ratings(&self, project_id: &str) -> Result<Vec<Option<f64>>, StoreError> {
        let docs = self
            .store
            .query(&Query::collection(comments_path(project_id)))
            .await?;
        Ok(docs
            .iter()
            .map(|doc| doc.field("rating").and_then(Value::as_f64))
            .collect())
    }

    async fn watch(&self, project_id: &str) -> Result<LiveQuery<Comment>, StoreError> {
        let subscription = self.store.subscribe(Self::newest_first(project_id)).await?;
        Ok(LiveQuery::new(subscription))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::store::{memory::MemoryStore, DocumentStore};

    fn repo() -> (StoreCommentRepo, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (StoreCommentRepo::new(store.clone()), store)
    }

    fn data(value: Value) -> DocumentData {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let (repo, store) = repo();
        let path = comments_path("p1");
        store
            .add(&path, data(json!({"text": "old", "rating": 3, "createdAt": "2024-01-01T00:00:00.000Z"})))
            .await
            .unwrap();
        store
            .add(&path, data(json!({"text": "new", "rating": 5, "createdAt": "2024-02-01T00:00:00.000Z"})))
            .await
            .unwrap();

        let texts: Vec<_> = repo.list("p1").await.unwrap().into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn ratings_include_malformed_documents() {
        let (repo, store) = repo();
        let path = comments_path("p1");
        store.add(&path, data(json!({"rating": 4.5}))).await.unwrap();
        store.add(&path, data(json!({"rating": "five"}))).await.unwrap();
        store.add(&path, data(json!({"text": "no rating"}))).await.unwrap();

        let ratings = repo.list_ratings("p1").await.unwrap();
        assert_eq!(ratings.len(), 3);
        assert_eq!(ratings.iter().flatten().copied().collect::<Vec<_>>(), vec![4.5]);

        assert_eq!(repo.list("p1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn malformed_rating_does_not_hide_a_comment() {
        let (repo, store) = repo();
        let id = store
            .add(&comments_path("p1"), data(json!({"userId": "u1", "rating": "five"})))
            .await
            .unwrap();

        let comment = repo.find("p1", &id).await.unwrap().unwrap();
        assert_eq!(comment.user_id, "u1");
        assert_eq!(comment.rating, None);
    }

    #[tokio::test]
    async fn comments_are_scoped_per_project() {
        let (repo, store) = repo();
        store.add(&comments_path("p1"), data(json!({"rating": 4}))).await.unwrap();
        assert!(repo.list("p2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn watch_emits_initial_and_updated_snapshots() {
        let (repo, store) = repo();
        let mut live = repo.watch("p1").await.unwrap();
        assert!(live.next().await.unwrap().unwrap().is_empty());

        store
            .add(&comments_path("p1"), data(json!({"text": "hi", "rating": 5, "createdAt": "2024-01-01T00:00:00.000Z"})))
            .await
            .unwrap();
        let snapshot = live.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text, "hi");
    }
}
