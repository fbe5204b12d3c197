use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{
    future::ready,
    stream::{self, BoxStream},
    StreamExt,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use validator::Validate;

use crate::{
    auth::{
        google::OAuthTokenVerifier, identity::IdentityProvider, jwt::remaining_ttl,
        revocation::TokenRevocations,
    },
    entities::{
        document_fields::timestamp,
        token::{AuthResponse, Claims},
        user::{
            GoogleSignInRequest, Identity, SignInRequest, SignUpRequest, UpdateProfileRequest, User,
            DEFAULT_GOOGLE_USER_NAME, DEFAULT_USER_NAME,
        },
    },
    errors::{AppError, AuthError},
    repositories::{token::TokenServiceRepository, user::UserRepository},
    store::{DocumentData, StoreError},
};

const AUTH_EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    /// First event of every stream: the state at subscription time.
    Current,
    SignedIn,
    SignedOut,
    ProfileUpdated,
}

/// An auth-state change of one user. `user` is `None` once signed out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub user_id: String,
    pub user: Option<User>,
    pub at: DateTime<Utc>,
}

impl AuthEvent {
    fn new(kind: AuthEventKind, user_id: &str, user: Option<User>) -> Self {
        AuthEvent {
            kind,
            user_id: user_id.to_string(),
            user,
            at: Utc::now(),
        }
    }
}

/// Identity collaborators of [`AuthHandler`], picked at startup.
#[derive(Clone)]
pub struct AuthProviders {
    pub identity: Arc<dyn IdentityProvider>,
    pub oauth: Arc<dyn OAuthTokenVerifier>,
    pub revocations: Arc<dyn TokenRevocations>,
}

pub struct AuthHandler<U, T>
where
    U: UserRepository,
    T: TokenServiceRepository,
{
    pub user_repo: U,
    pub token_service: T,
    pub providers: AuthProviders,
    admin_emails: HashSet<String>,
    events: broadcast::Sender<AuthEvent>,
}

impl<U, T> AuthHandler<U, T>
where
    U: UserRepository,
    T: TokenServiceRepository,
{
    pub fn new(user_repo: U, token_service: T, providers: AuthProviders, admin_emails: &[String]) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_BUFFER);
        AuthHandler {
            user_repo,
            token_service,
            providers,
            admin_emails: admin_emails
                .iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            events,
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.contains(&email.trim().to_lowercase())
    }

    fn publish(&self, kind: AuthEventKind, user_id: &str, user: Option<User>) {
        // No receivers is the normal case.
        let _ = self.events.send(AuthEvent::new(kind, user_id, user));
    }

    /// Registers a password account and writes its profile document.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        let identity = self
            .providers
            .identity
            .create_account(&request.email, &request.password, request.name.trim())
            .await?;

        let user = User::from_identity(&identity, DEFAULT_USER_NAME);
        self.user_repo.save_user(&user).await?;
        tracing::info!(user_id = %user.id, "Account created");

        self.signed_in(user)
    }

    pub async fn sign_in(&self, request: SignInRequest) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        let identity = self
            .providers
            .identity
            .sign_in_with_password(&request.email, &request.password)
            .await?;

        let user = self.ensure_profile(&identity, DEFAULT_USER_NAME).await?;
        tracing::info!(user_id = %user.id, "User signed in");
        self.signed_in(user)
    }

    pub async fn sign_in_with_google(&self, request: GoogleSignInRequest) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        let profile = self.providers.oauth.verify(&request.id_token).await?;
        let identity = self.providers.identity.sign_in_with_google(&profile).await?;

        let user = self.ensure_profile(&identity, DEFAULT_GOOGLE_USER_NAME).await?;
        tracing::info!(user_id = %user.id, "User signed in with Google");
        self.signed_in(user)
    }

    fn signed_in(&self, user: User) -> Result<AuthResponse, AuthError> {
        let response = self.create_auth_response(user)?;
        self.publish(AuthEventKind::SignedIn, &response.user.id, Some(response.user.clone()));
        Ok(response)
    }

    /// The mirrored profile of `identity`, created from provider data when
    /// missing.
    async fn ensure_profile(&self, identity: &Identity, fallback_name: &str) -> Result<User, AuthError> {
        if let Some(user) = self.user_repo.get_user_by_id(&identity.uid).await? {
            return Ok(user);
        }

        let user = User::from_identity(identity, fallback_name);
        self.user_repo.save_user(&user).await?;
        tracing::info!(user_id = %user.id, "Profile document created");
        Ok(user)
    }

    /// Issues a fresh access/refresh pair for `user`.
    pub fn create_auth_response(&self, user: User) -> Result<AuthResponse, AuthError> {
        let admin = self.is_admin(&user.email);

        let access_token = self.token_service.create_jwt(&user, admin).map_err(|e| {
            tracing::warn!("Failed to create JWT: {}", e);
            AuthError::TokenCreation
        })?;

        let refresh_token = self.token_service.create_refresh_jwt(&user.id).map_err(|e| {
            tracing::warn!("Failed to create refresh JWT: {}", e);
            AuthError::TokenCreation
        })?;

        Ok(AuthResponse::new(access_token, refresh_token, user))
    }

    /// Rotates a refresh token: the presented one is revoked and a new pair
    /// is issued. Each refresh token yields at most one new pair.
    pub async fn refresh_token(&self, token: &str) -> Result<AuthResponse, AuthError> {
        let decoded = self.token_service.decode_refresh_jwt(token)?;
        let claims = decoded.claims;

        let claimed = self
            .providers
            .revocations
            .revoke_if_new(&claims.jti, remaining_ttl(claims.exp))
            .await?;
        if !claimed {
            tracing::warn!(user_id = %claims.sub, "Revoked refresh token presented");
            return Err(AuthError::TokenRevoked);
        }

        let identity = self
            .providers
            .identity
            .get_identity(&claims.sub)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        let user = self.ensure_profile(&identity, DEFAULT_USER_NAME).await?;

        self.create_auth_response(user)
    }

    /// Revokes the access token and, when given and owned by the same user,
    /// the refresh token.
    pub async fn sign_out(&self, claims: &Claims, refresh_token: Option<&str>) -> Result<(), AuthError> {
        self.providers
            .revocations
            .revoke(&claims.jti, remaining_ttl(claims.exp))
            .await?;

        if let Some(token) = refresh_token {
            match self.token_service.decode_refresh_jwt(token) {
                Ok(decoded) if decoded.claims.sub == claims.sub => {
                    self.providers
                        .revocations
                        .revoke(&decoded.claims.jti, remaining_ttl(decoded.claims.exp))
                        .await?;
                }
                Ok(_) => tracing::warn!(user_id = %claims.sub, "Refresh token of another user ignored"),
                Err(e) => tracing::debug!("Unusable refresh token on sign-out: {}", e),
            }
        }

        tracing::info!(user_id = %claims.sub, "User signed out");
        self.publish(AuthEventKind::SignedOut, &claims.sub, None);
        Ok(())
    }

    /// Whether an access token id has been revoked. A failing revocation
    /// backend is logged and treated as "not revoked".
    pub async fn is_token_revoked(&self, jti: &str) -> bool {
        self.providers
            .revocations
            .is_revoked(jti)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Revocation check failed: {}", e);
                false
            })
    }

    /// Writes name and avatar to the identity provider and the profile
    /// document.
    pub async fn update_profile(&self, claims: &Claims, request: UpdateProfileRequest) -> Result<User, AuthError> {
        request.validate()?;

        if request.is_empty() {
            return self
                .user_repo
                .get_user_by_id(&claims.sub)
                .await?
                .ok_or(AuthError::AccountNotFound);
        }

        let mut changes = DocumentData::new();
        if let Some(name) = request.name.value_ref() {
            changes.insert("name".to_string(), Value::String(name.trim().to_string()));
        }
        if let Some(avatar) = request.avatar.clone().into_option() {
            changes.insert("avatar".to_string(), avatar.map(Value::String).unwrap_or(Value::Null));
        }
        changes.insert("updatedAt".to_string(), timestamp::now());

        let identity = self
            .providers
            .identity
            .update_profile(&claims.sub, request.name, request.avatar)
            .await?;

        match self.user_repo.update_user(&claims.sub, changes).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                self.user_repo
                    .save_user(&User::from_identity(&identity, DEFAULT_USER_NAME))
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }

        let user = self
            .user_repo
            .get_user_by_id(&claims.sub)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        tracing::info!(user_id = %user.id, "Profile updated");
        self.publish(AuthEventKind::ProfileUpdated, &user.id, Some(user.clone()));
        Ok(user)
    }

    pub async fn current_user(&self, user_id: &str) -> Result<User, AppError> {
        self.user_repo
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// A public profile. Read failures yield `None`.
    pub async fn get_user(&self, user_id: &str) -> Option<User> {
        self.user_repo.get_user_by_id(user_id).await.unwrap_or_else(|e| {
            tracing::error!(user_id = %user_id, "Failed to read user: {}", e);
            None
        })
    }

    /// Auth-state changes of `user_id`, starting with its current state.
    pub async fn auth_state_changes(&self, user_id: &str) -> BoxStream<'static, AuthEvent> {
        let receiver = self.events.subscribe();
        let current = AuthEvent::new(AuthEventKind::Current, user_id, self.get_user(user_id).await);
        let user_id = user_id.to_string();

        let changes = stream::unfold(receiver, move |mut receiver| {
            let user_id = user_id.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) if event.user_id == user_id => return Some((event, receiver)),
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("Auth-state subscriber lagged by {} events", skipped);
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });

        stream::once(ready(current)).chain(changes).boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::*;

    use super::*;
    use crate::{
        auth::{
            google::{GoogleProfile, MockOAuthTokenVerifier},
            identity::LocalIdentityProvider,
            jwt::JwtService,
            revocation::MemoryRevocations,
        },
        entities::user::AuthProvider,
        repositories::{store_repo::StoreUserRepo, user::MockUserRepository},
        settings::AppConfig,
        store::{memory::MemoryStore, SharedStore},
    };

    const PASSWORD: &str = "Quasar-Lantern-47-Orbit!";

    type Handler = AuthHandler<StoreUserRepo, JwtService>;

    fn handler_with(oauth: MockOAuthTokenVerifier) -> (Handler, Arc<MemoryRevocations>) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let revocations = Arc::new(MemoryRevocations::new());
        let providers = AuthProviders {
            identity: Arc::new(LocalIdentityProvider::new(store.clone())),
            oauth: Arc::new(oauth),
            revocations: revocations.clone(),
        };
        let handler = AuthHandler::new(
            StoreUserRepo::new(store),
            JwtService::new(&AppConfig::for_tests()),
            providers,
            &["Admin@Example.com".to_string()],
        );
        (handler, revocations)
    }

    fn handler() -> Handler {
        handler_with(MockOAuthTokenVerifier::new()).0
    }

    fn sign_up(email: &str, name: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.into(),
            password: PASSWORD.into(),
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn sign_up_mirrors_profile_and_flags_admins() {
        let handler = handler();
        let response = handler.sign_up(sign_up("admin@example.com", "Root")).await.unwrap();
        assert_eq!(response.user.name, "Root");
        assert_eq!(response.token_type, "Bearer");

        let claims = handler.token_service.decode_jwt(&response.access_token).unwrap().claims;
        assert!(claims.admin);

        let profile = handler.current_user(&response.user.id).await.unwrap();
        assert_eq!(profile.email, "admin@example.com");
    }

    #[tokio::test]
    async fn sign_in_with_wrong_password_fails() {
        let handler = handler();
        handler.sign_up(sign_up("ada@example.com", "Ada")).await.unwrap();

        let err = handler
            .sign_in(SignInRequest {
                email: "ada@example.com".into(),
                password: "Wrong-Password-1!".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WrongCredentials));
    }

    #[tokio::test]
    async fn refresh_rotates_and_revokes_the_old_token() {
        let handler = handler();
        let first = handler.sign_up(sign_up("ada@example.com", "Ada")).await.unwrap();

        let second = handler.refresh_token(&first.refresh_token).await.unwrap();
        assert_eq!(second.user.id, first.user.id);

        let reused = handler.refresh_token(&first.refresh_token).await.unwrap_err();
        assert!(matches!(reused, AuthError::TokenRevoked));
    }

    /// Suspends before each call so concurrent requests interleave.
    struct YieldingRevocations(MemoryRevocations);

    #[async_trait::async_trait]
    impl TokenRevocations for YieldingRevocations {
        async fn revoke(&self, jti: &str, ttl_seconds: u64) -> Result<(), AuthError> {
            tokio::task::yield_now().await;
            self.0.revoke(jti, ttl_seconds).await
        }

        async fn revoke_if_new(&self, jti: &str, ttl_seconds: u64) -> Result<bool, AuthError> {
            tokio::task::yield_now().await;
            self.0.revoke_if_new(jti, ttl_seconds).await
        }

        async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
            tokio::task::yield_now().await;
            self.0.is_revoked(jti).await
        }

        async fn purge_expired(&self) -> usize {
            self.0.purge_expired().await
        }

        async fn ping(&self) -> Result<(), AuthError> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "yielding"
        }
    }

    #[tokio::test]
    async fn concurrent_refreshes_issue_a_single_session() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let handler = AuthHandler::new(
            StoreUserRepo::new(store.clone()),
            JwtService::new(&AppConfig::for_tests()),
            AuthProviders {
                identity: Arc::new(LocalIdentityProvider::new(store)),
                oauth: Arc::new(MockOAuthTokenVerifier::new()),
                revocations: Arc::new(YieldingRevocations(MemoryRevocations::new())),
            },
            &[],
        );
        let session = handler.sign_up(sign_up("ada@example.com", "Ada")).await.unwrap();

        let (first, second) = tokio::join!(
            handler.refresh_token(&session.refresh_token),
            handler.refresh_token(&session.refresh_token)
        );

        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(first.err().or(second.err()), Some(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn sign_out_revokes_both_tokens() {
        let (handler, revocations) = handler_with(MockOAuthTokenVerifier::new());
        let session = handler.sign_up(sign_up("ada@example.com", "Ada")).await.unwrap();
        let claims = handler.token_service.decode_jwt(&session.access_token).unwrap().claims;

        handler
            .sign_out(&claims, Some(&session.refresh_token))
            .await
            .unwrap();

        assert_eq!(revocations.len(), 2);
        assert!(handler.is_token_revoked(&claims.jti).await);
        assert!(handler.refresh_token(&session.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn google_sign_in_uses_fallback_name() {
        let mut oauth = MockOAuthTokenVerifier::new();
        oauth.expect_verify().with(eq("google-id-token")).returning(|_| {
            Ok(GoogleProfile {
                subject: "g-123".into(),
                email: "grace@example.com".into(),
                name: None,
                picture: None,
            })
        });
        let (handler, _) = handler_with(oauth);

        let response = handler
            .sign_in_with_google(GoogleSignInRequest {
                id_token: "google-id-token".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.user.name, "Google User");
        assert!(!handler.token_service.decode_jwt(&response.access_token).unwrap().claims.admin);
    }

    #[tokio::test]
    async fn profile_update_clears_avatar_and_notifies() {
        let handler = handler();
        let session = handler.sign_up(sign_up("ada@example.com", "Ada")).await.unwrap();
        let claims = handler.token_service.decode_jwt(&session.access_token).unwrap().claims;

        let mut changes = handler.auth_state_changes(&claims.sub).await;
        let current = changes.next().await.unwrap();
        assert_eq!(current.kind, AuthEventKind::Current);

        let request: UpdateProfileRequest =
            serde_json::from_value(serde_json::json!({"name": "Ada L.", "avatar": null})).unwrap();
        let user = handler.update_profile(&claims, request).await.unwrap();
        assert_eq!(user.name, "Ada L.");
        assert!(user.avatar.is_none());

        let event = changes.next().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::ProfileUpdated);
        assert_eq!(event.user.unwrap().name, "Ada L.");
    }

    #[tokio::test]
    async fn missing_profile_is_created_on_sign_in() {
        let mut users = MockUserRepository::new();
        users.expect_get_user_by_id().returning(|_| Ok(None));
        users
            .expect_save_user()
            .withf(|user| user.name == "User" && user.email == "ada@example.com")
            .times(1)
            .returning(|_| Ok(()));

        let mut identity = crate::auth::identity::MockIdentityProvider::new();
        identity.expect_sign_in_with_password().returning(|email, _| {
            Ok(Identity {
                uid: "u1".into(),
                email: email.to_string(),
                display_name: None,
                photo_url: None,
                provider: AuthProvider::Password,
            })
        });

        let handler = AuthHandler::new(
            users,
            JwtService::new(&AppConfig::for_tests()),
            AuthProviders {
                identity: Arc::new(identity),
                oauth: Arc::new(MockOAuthTokenVerifier::new()),
                revocations: Arc::new(MemoryRevocations::new()),
            },
            &[],
        );

        let response = handler
            .sign_in(SignInRequest {
                email: "ada@example.com".into(),
                password: PASSWORD.into(),
            })
            .await
            .unwrap();
        assert_eq!(response.user.id, "u1");
    }
}
