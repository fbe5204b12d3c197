use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;
pub mod shared_repos;

pub use domain::{entities, use_cases};
pub use interfaces::{handlers, repositories, middlewares, routes};
pub use infrastructure::{auth, db, seed, store};

use auth::{
    google::GoogleTokenVerifier,
    identity::LocalIdentityProvider,
    jwt::JwtService,
    revocation::{MemoryRevocations, RedisRevocations, TokenRevocations},
};
use errors::AuthError;
use repositories::store_repo::{StoreCommentRepo, StoreDeveloperRepo, StoreProjectRepo, StoreUserRepo};
use settings::{AppConfig, StoreBackend};
use shared_repos::SharedRepositories;
use store::{memory::MemoryStore, postgres::PgDocumentStore, SharedStore, StoreError};
use use_cases::{
    auth::{AuthHandler, AuthProviders},
    comments::CommentHandler,
    developers::DeveloperHandler,
    projects::ProjectHandler,
};

pub type AppProjectHandler = ProjectHandler<StoreProjectRepo, StoreDeveloperRepo>;
pub type AppCommentHandler = CommentHandler<StoreCommentRepo, StoreProjectRepo, StoreUserRepo>;
pub type AppDeveloperHandler = DeveloperHandler<StoreDeveloperRepo>;
pub type AppAuthHandler = AuthHandler<StoreUserRepo, JwtService>;

pub struct AppState {
    pub project_handler: AppProjectHandler,
    pub comment_handler: AppCommentHandler,
    pub developer_handler: AppDeveloperHandler,
    pub auth_handler: AppAuthHandler,
    pub store: SharedStore,
    pub featured_count: usize,
    pub related_count: usize,
}

impl AppState {
    pub fn new(config: &AppConfig, store: SharedStore, providers: AuthProviders) -> Self {
        let repos = SharedRepositories::new(store.clone());

        let project_handler = ProjectHandler::new(repos.project_repo.clone(), repos.developer_repo.clone());
        let comment_handler = CommentHandler::new(
            repos.comment_repo,
            repos.project_repo,
            repos.user_repo.clone(),
        );
        let developer_handler = DeveloperHandler::new(repos.developer_repo);
        let auth_handler = AuthHandler::new(
            repos.user_repo,
            JwtService::new(config),
            providers,
            &config.admin_email_list(),
        );

        AppState {
            project_handler,
            comment_handler,
            developer_handler,
            auth_handler,
            store,
            featured_count: config.featured_count,
            related_count: config.related_count,
        }
    }
}

/// Opens the configured document store.
pub async fn connect_store(config: &AppConfig) -> Result<SharedStore, StoreError> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Using the in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let store =
                PgDocumentStore::connect(&config.database_url, config.database_max_connections).await?;
            tracing::info!("Using the PostgreSQL document store");
            Ok(Arc::new(store))
        }
    }
}

/// Builds the identity collaborators: the local identity provider over
/// `store`, Google ID-token verification and the revocation list (Redis when
/// configured).
pub fn build_auth_providers(config: &AppConfig, store: SharedStore) -> Result<AuthProviders, AuthError> {
    let revocations: Arc<dyn TokenRevocations> = match &config.redis_url {
        Some(url) => Arc::new(RedisRevocations::from_url(url)?),
        None => {
            tracing::warn!("No Redis configured; token revocations are kept in process");
            Arc::new(MemoryRevocations::new())
        }
    };

    if config.google_client_id.trim().is_empty() {
        tracing::warn!("google_client_id is not set; Google sign-in is disabled");
    }

    Ok(AuthProviders {
        identity: Arc::new(LocalIdentityProvider::new(store)),
        oauth: Arc::new(GoogleTokenVerifier::new(config.google_client_id.clone())),
        revocations,
    })
}
