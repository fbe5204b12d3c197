use async_trait::async_trait;

use crate::{
    constants::PROJECTS_COLLECTION,
    entities::{comment::RatingSummary, document_fields::timestamp, project::Project},
    repositories::store_repo::StoreProjectRepo,
    store::{
        decode_all, to_document_data, Direction, DocumentData, LiveQuery, Query, SharedStore,
        StoreError,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Project>, StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Project>, StoreError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Project>, StoreError>;

    /// Featured projects, newest first. Needs the `featured + createdAt` index.
    async fn list_featured(&self, limit: usize) -> Result<Vec<Project>, StoreError>;
    /// Every featured project, in store order.
    async fn list_featured_unordered(&self) -> Result<Vec<Project>, StoreError>;

    async fn list_by_category(&self, category: &str, limit: Option<usize>) -> Result<Vec<Project>, StoreError>;
    async fn list_outside_category(&self, category: &str, limit: usize) -> Result<Vec<Project>, StoreError>;

    /// A developer's projects, newest first. Needs the `developerId + createdAt` index.
    async fn list_by_developer(&self, developer_id: &str) -> Result<Vec<Project>, StoreError>;
    async fn list_by_developer_unordered(&self, developer_id: &str) -> Result<Vec<Project>, StoreError>;

    async fn insert(&self, project: &Project) -> Result<String, StoreError>;
    async fn update_fields(&self, id: &str, changes: DocumentData) -> Result<(), StoreError>;
    async fn write_rating(&self, id: &str, summary: RatingSummary) -> Result<(), StoreError>;
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn watch_featured(&self, limit: usize) -> Result<LiveQuery<Project>, StoreError>;
    async fn watch_featured_unordered(&self) -> Result<LiveQuery<Project>, StoreError>;
    async fn watch_all(&self) -> Result<LiveQuery<Project>, StoreError>;
}

impl StoreProjectRepo {
    pub fn new(store: SharedStore) -> Self {
        StoreProjectRepo { store }
    }

    async fn fetch(&self, query: Query) -> Result<Vec<Project>, StoreError> {
        let docs = self.store.query(&query).await?;
        Ok(decode_all(&docs))
    }

    fn featured_query() -> Query {
        Query::collection(PROJECTS_COLLECTION).where_eq("featured", true)
    }

    fn developer_query(developer_id: &str) -> Query {
        Query::collection(PROJECTS_COLLECTION).where_eq("developerId", developer_id)
    }
}

#[async_trait]
impl ProjectRepository for StoreProjectRepo {
    async fn list_all(&self) -> Result<Vec<Project>, StoreError> {
        self.fetch(Query::collection(PROJECTS_COLLECTION)).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Project>, StoreError> {
        self.store
            .get(PROJECTS_COLLECTION, id)
            .await?
            .map(|doc| doc.decode::<Project>())
            .transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Project>, StoreError> {
        let query = Query::collection(PROJECTS_COLLECTION)
            .where_eq("slug", slug)
            .limit(1);
        Ok(self.fetch(query).await?.into_iter().next())
    }

    async fn list_featured(&self, limit: usize) -> Result<Vec<Project>, StoreError> {
        let query = Self::featured_query()
            .order_by("createdAt", Direction::Descending)
            .limit(limit);
        self.fetch(query).await
    }

    async fn list_featured_unordered(&self) -> Result<Vec<Project>, StoreError> {
        self.fetch(Self::featured_query()).await
    }

    async fn list_by_category(&self, category: &str, limit: Option<usize>) -> Result<Vec<Project>, StoreError> {
        let mut query = Query::collection(PROJECTS_COLLECTION).where_eq("category", category);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        self.fetch(query).await
    }

    async fn list_outside_category(&self, category: &str, limit: usize) -> Result<Vec<Project>, StoreError> {
        let query = Query::collection(PROJECTS_COLLECTION)
            .where_not_eq("category", category)
            .limit(limit);
        self.fetch(query).await
    }

    async fn list_by_developer(&self, developer_id: &str) -> Result<Vec<Project>, StoreError> {
        let query = Self::developer_query(developer_id).order_by("createdAt", Direction::Descending);
        self.fetch(query).await
    }

    async fn list_by_developer_unordered(&self, developer_id: &str) -> Result<Vec<Project>, StoreError> {
        self.fetch(Self::developer_query(developer_id)).await
    }

    async fn insert(&self, project: &Project) -> Result<String, StoreError> {
        let data = to_document_data(project)?;
        self.store.add(PROJECTS_COLLECTION, data).await
    }

    async fn update_fields(&self, id: &str, changes: DocumentData) -> Result<(), StoreError> {
        self.store.update(PROJECTS_COLLECTION, id, changes).await
    }

    async fn write_rating(&self, id: &str, summary: RatingSummary) -> Result<(), StoreError> {
        let mut fields = to_document_data(&summary)?;
        fields.insert("updatedAt".to_string(), timestamp::now());
        self.store.update(PROJECTS_COLLECTION, id, fields).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(PROJECTS_COLLECTION, id).await
    }

    async fn watch_featured(&self, limit: usize) -> Result<LiveQuery<Project>, StoreError> {
        let query = Self::featured_query()
            .order_by("createdAt", Direction::Descending)
            .limit(limit);
        Ok(LiveQuery::new(self.store.subscribe(query).await?))
    }

    async fn watch_featured_unordered(&self) -> Result<LiveQuery<Project>, StoreError> {
        Ok(LiveQuery::new(self.store.subscribe(Self::featured_query()).await?))
    }

    async fn watch_all(&self) -> Result<LiveQuery<Project>, StoreError> {
        let query = Query::collection(PROJECTS_COLLECTION);
        Ok(LiveQuery::new(self.store.subscribe(query).await?))
    }
}

/// Whether a slug is taken by a project other than `exclude_id`.
pub async fn slug_taken<R: ProjectRepository + ?Sized>(
    repo: &R,
    slug: &str,
    exclude_id: Option<&str>,
) -> Result<bool, StoreError> {
    Ok(repo
        .find_by_slug(slug)
        .await?
        .is_some_and(|existing| Some(existing.id.as_str()) != exclude_id))
}
