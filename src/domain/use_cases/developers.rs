use crate::{
    entities::developer::{Developer, NewDeveloperRequest},
    errors::AppError,
    repositories::developer::DeveloperRepository,
};

pub struct DeveloperHandler<D>
where
    D: DeveloperRepository,
{
    pub developer_repo: D,
}

impl<D> DeveloperHandler<D>
where
    D: DeveloperRepository,
{
    pub fn new(developer_repo: D) -> Self {
        DeveloperHandler { developer_repo }
    }

    pub async fn list_developers(&self) -> Vec<Developer> {
        self.developer_repo.list_all().await.unwrap_or_else(|e| {
            tracing::error!("Failed to list developers: {}", e);
            Vec::new()
        })
    }

    pub async fn get_developer(&self, id: &str) -> Option<Developer> {
        self.developer_repo.find_by_id(id).await.unwrap_or_else(|e| {
            tracing::error!(developer_id = %id, "Failed to read developer: {}", e);
            None
        })
    }

    pub async fn get_developer_by_slug(&self, slug: &str) -> Option<Developer> {
        self.developer_repo.find_by_slug(slug).await.unwrap_or_else(|e| {
            tracing::error!(slug = %slug, "Failed to read developer: {}", e);
            None
        })
    }

    /// Creates a developer profile with a unique slug.
    pub async fn create_developer(&self, req: NewDeveloperRequest) -> Result<Developer, AppError> {
        let mut developer = Developer::try_from(req)?;

        if self.developer_repo.find_by_slug(&developer.slug).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "A developer with slug '{}' already exists",
                developer.slug
            )));
        }

        developer.id = self.developer_repo.insert(&developer).await?;
        tracing::info!(developer_id = %developer.id, "Developer created");
        Ok(developer)
    }
}
