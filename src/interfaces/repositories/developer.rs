use async_trait::async_trait;

use crate::{
    constants::DEVELOPERS_COLLECTION,
    entities::developer::Developer,
    repositories::store_repo::StoreDeveloperRepo,
    store::{decode_all, to_document_data, Query, SharedStore, StoreError},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeveloperRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Developer>, StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Developer>, StoreError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Developer>, StoreError>;
    async fn insert(&self, developer: &Developer) -> Result<String, StoreError>;
}

impl StoreDeveloperRepo {
    pub fn new(store: SharedStore) -> Self {
        StoreDeveloperRepo { store }
    }
}

#[async_trait]
impl DeveloperRepository for StoreDeveloperRepo {
    async fn list_all(&self) -> Result<Vec<Developer>, StoreError> {
        let docs = self.store.query(&Query::collection(DEVELOPERS_COLLECTION)).await?;
        Ok(decode_all(&docs))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Developer>, StoreError> {
        self.store
            .get(DEVELOPERS_COLLECTION, id)
            .await?
            .map(|doc| doc.decode::<Developer>())
            .transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Developer>, StoreError> {
        let query = Query::collection(DEVELOPERS_COLLECTION)
            .where_eq("slug", slug)
            .limit(1);
        let docs = self.store.query(&query).await?;
        Ok(decode_all(&docs).into_iter().next())
    }

    async fn insert(&self, developer: &Developer) -> Result<String, StoreError> {
        let data = to_document_data(developer)?;
        self.store.add(DEVELOPERS_COLLECTION, data).await
    }
}
