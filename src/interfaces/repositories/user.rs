use async_trait::async_trait;

use crate::{
    constants::USERS_COLLECTION,
    entities::user::User,
    repositories::store_repo::StoreUserRepo,
    store::{to_document_data, DocumentData, SharedStore, StoreError},
};

/// Public user profiles, keyed by the identity provider's uid.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    /// Writes the whole profile document `users/{user.id}`.
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;
    async fn update_user(&self, id: &str, changes: DocumentData) -> Result<(), StoreError>;
}

impl StoreUserRepo {
    pub fn new(store: SharedStore) -> Self {
        StoreUserRepo { store }
    }
}

#[async_trait]
impl UserRepository for StoreUserRepo {
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.store
            .get(USERS_COLLECTION, id)
            .await?
            .map(|doc| doc.decode::<User>())
            .transpose()
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let data = to_document_data(user)?;
        self.store.set(USERS_COLLECTION, &user.id, data).await
    }

    async fn update_user(&self, id: &str, changes: DocumentData) -> Result<(), StoreError> {
        self.store.update(USERS_COLLECTION, id, changes).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn saved_profile_is_keyed_by_uid() {
        let repo = StoreUserRepo::new(Arc::new(MemoryStore::new()));
        let user = User {
            id: "uid-1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            avatar: None,
            created_at: None,
            updated_at: None,
        };
        repo.save_user(&user).await.unwrap();

        let mut changes = DocumentData::new();
        changes.insert("avatar".into(), json!("https://img.example.com/ada.png"));
        repo.update_user("uid-1", changes).await.unwrap();

        let stored = repo.get_user_by_id("uid-1").await.unwrap().unwrap();
        assert_eq!(stored.id, "uid-1");
        assert_eq!(stored.avatar.as_deref(), Some("https://img.example.com/ada.png"));

        let missing = repo.update_user("nobody", DocumentData::new()).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }
}
