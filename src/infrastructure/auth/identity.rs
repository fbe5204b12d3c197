//! Identity provider over the `accounts` collection.
//!
//! Accounts hold credentials and provider-side profile data (display name,
//! photo). The public profile in `users` is a mirror maintained by the auth
//! use case, never read back here.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::{
    auth::{
        google::GoogleProfile,
        password::{hash_password, verify_password},
    },
    constants::ACCOUNTS_COLLECTION,
    entities::{
        option_fields::OptionField,
        user::{Account, AuthProvider, Identity},
    },
    errors::AuthError,
    store::{to_document_data, DocumentData, Query, SharedStore, StoreError},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates a password account. Fails with `EmailInUse` for a known email.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Signs in with a verified Google identity, linking or creating the account.
    async fn sign_in_with_google(&self, profile: &GoogleProfile) -> Result<Identity, AuthError>;

    async fn update_profile(
        &self,
        uid: &str,
        display_name: OptionField<String>,
        photo_url: OptionField<String>,
    ) -> Result<Identity, AuthError>;

    async fn get_identity(&self, uid: &str) -> Result<Option<Identity>, AuthError>;
}

pub struct LocalIdentityProvider {
    store: SharedStore,
}

impl LocalIdentityProvider {
    pub fn new(store: SharedStore) -> Self {
        LocalIdentityProvider { store }
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Option<Account>, AuthError> {
        let query = Query::collection(ACCOUNTS_COLLECTION)
            .where_eq(field, value)
            .limit(1);
        let docs = self.store.query(&query).await.map_err(store_failure)?;
        docs.first()
            .map(|doc| doc.decode::<Account>())
            .transpose()
            .map_err(store_failure)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        self.find_by_field("email", &normalize_email(email)).await
    }

    async fn insert(&self, mut account: Account) -> Result<Account, AuthError> {
        let data = to_document_data(&account).map_err(store_failure)?;
        account.id = self
            .store
            .add(ACCOUNTS_COLLECTION, data)
            .await
            .map_err(store_failure)?;
        Ok(account)
    }

    async fn load(&self, uid: &str) -> Result<Option<Account>, AuthError> {
        self.store
            .get(ACCOUNTS_COLLECTION, uid)
            .await
            .map_err(store_failure)?
            .map(|doc| doc.decode::<Account>())
            .transpose()
            .map_err(store_failure)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn store_failure(err: StoreError) -> AuthError {
    tracing::error!("Identity store failure: {}", err);
    AuthError::ProviderUnavailable(err.to_string())
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let password_hash = hash_password(password)?;
        let account = self
            .insert(Account {
                id: String::new(),
                email: normalize_email(email),
                password_hash: Some(password_hash),
                display_name: Some(display_name.trim().to_string()),
                photo_url: None,
                provider: AuthProvider::Password,
                provider_subject: None,
                created_at: Some(Utc::now()),
            })
            .await?;

        tracing::info!(uid = %account.id, "Account created");
        Ok(Identity::from(&account))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or(AuthError::WrongCredentials)?;

        // Google-only accounts have no password to check.
        let hash = account
            .password_hash
            .as_deref()
            .ok_or(AuthError::WrongCredentials)?;

        let is_password_valid = verify_password(password, hash).map_err(|e| {
            tracing::warn!(uid = %account.id, "Password verification failed: {}", e);
            AuthError::WrongCredentials
        })?;
        if !is_password_valid {
            return Err(AuthError::WrongCredentials);
        }

        Ok(Identity::from(&account))
    }

    async fn sign_in_with_google(&self, profile: &GoogleProfile) -> Result<Identity, AuthError> {
        if let Some(account) = self.find_by_field("providerSubject", &profile.subject).await? {
            return Ok(Identity::from(&account));
        }

        if let Some(account) = self.find_by_email(&profile.email).await? {
            let mut link = DocumentData::new();
            link.insert("providerSubject".into(), Value::String(profile.subject.clone()));
            if account.photo_url.is_none() {
                if let Some(picture) = &profile.picture {
                    link.insert("photoUrl".into(), Value::String(picture.clone()));
                }
            }
            self.store
                .update(ACCOUNTS_COLLECTION, &account.id, link)
                .await
                .map_err(store_failure)?;
            tracing::info!(uid = %account.id, "Linked Google identity to existing account");

            let linked = self.load(&account.id).await?.unwrap_or(account);
            return Ok(Identity::from(&linked));
        }

        let account = self
            .insert(Account {
                id: String::new(),
                email: normalize_email(&profile.email),
                password_hash: None,
                display_name: profile.name.clone(),
                photo_url: profile.picture.clone(),
                provider: AuthProvider::Google,
                provider_subject: Some(profile.subject.clone()),
                created_at: Some(Utc::now()),
            })
            .await?;

        tracing::info!(uid = %account.id, "Account created from Google sign-in");
        Ok(Identity::from(&account))
    }

    async fn update_profile(
        &self,
        uid: &str,
        display_name: OptionField<String>,
        photo_url: OptionField<String>,
    ) -> Result<Identity, AuthError> {
        let mut changes = DocumentData::new();
        if let Some(name) = display_name.into_option() {
            changes.insert("displayName".into(), name.map(Value::String).unwrap_or(Value::Null));
        }
        if let Some(photo) = photo_url.into_option() {
            changes.insert("photoUrl".into(), photo.map(Value::String).unwrap_or(Value::Null));
        }

        if !changes.is_empty() {
            self.store
                .update(ACCOUNTS_COLLECTION, uid, changes)
                .await
                .map_err(|e| match e {
                    StoreError::NotFound(_) => AuthError::AccountNotFound,
                    other => store_failure(other),
                })?;
        }

        self.load(uid)
            .await?
            .map(|account| Identity::from(&account))
            .ok_or(AuthError::AccountNotFound)
    }

    async fn get_identity(&self, uid: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.load(uid).await?.map(|account| Identity::from(&account)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::memory::MemoryStore;

    const PASSWORD: &str = "Quasar-Lantern-47-Orbit!";

    fn provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let idp = provider();
        let created = idp.create_account("Ada@Example.com", PASSWORD, "Ada").await.unwrap();
        assert_eq!(created.email, "ada@example.com");
        assert_eq!(created.display_name.as_deref(), Some("Ada"));

        let signed_in = idp.sign_in_with_password("ada@example.com", PASSWORD).await.unwrap();
        assert_eq!(signed_in.uid, created.uid);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let idp = provider();
        idp.create_account("ada@example.com", PASSWORD, "Ada").await.unwrap();
        assert!(matches!(
            idp.create_account("ada@example.com", PASSWORD, "Ada").await,
            Err(AuthError::EmailInUse)
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let idp = provider();
        idp.create_account("ada@example.com", PASSWORD, "Ada").await.unwrap();
        assert!(matches!(
            idp.sign_in_with_password("ada@example.com", "Wrong-Password-1!").await,
            Err(AuthError::WrongCredentials)
        ));
        assert!(matches!(
            idp.sign_in_with_password("nobody@example.com", PASSWORD).await,
            Err(AuthError::WrongCredentials)
        ));
    }

    #[tokio::test]
    async fn google_sign_in_links_existing_email() {
        let idp = provider();
        let created = idp.create_account("ada@example.com", PASSWORD, "Ada").await.unwrap();

        let profile = GoogleProfile {
            subject: "google-123".into(),
            email: "ada@example.com".into(),
            name: Some("Ada L.".into()),
            picture: Some("https://lh3.googleusercontent.com/a".into()),
        };
        let linked = idp.sign_in_with_google(&profile).await.unwrap();
        assert_eq!(linked.uid, created.uid);
        assert_eq!(linked.photo_url.as_deref(), Some("https://lh3.googleusercontent.com/a"));

        let again = idp.sign_in_with_google(&profile).await.unwrap();
        assert_eq!(again.uid, created.uid);
    }

    #[tokio::test]
    async fn google_only_account_cannot_use_password() {
        let idp = provider();
        let profile = GoogleProfile {
            subject: "google-9".into(),
            email: "grace@example.com".into(),
            name: None,
            picture: None,
        };
        let identity = idp.sign_in_with_google(&profile).await.unwrap();
        assert_eq!(identity.provider, AuthProvider::Google);
        assert!(idp.sign_in_with_password("grace@example.com", PASSWORD).await.is_err());
    }

    #[tokio::test]
    async fn update_profile_clears_photo() {
        let idp = provider();
        let created = idp.create_account("ada@example.com", PASSWORD, "Ada").await.unwrap();

        let updated = idp
            .update_profile(
                &created.uid,
                OptionField::SetToValue("Ada Lovelace".into()),
                OptionField::SetToNull,
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(updated.photo_url, None);

        assert!(matches!(
            idp.update_profile("missing", OptionField::SetToValue("x".into()), OptionField::Unchanged).await,
            Err(AuthError::AccountNotFound)
        ));
    }
}
