use std::future::Future;

use futures::{stream::BoxStream, StreamExt};
use validator::Validate;

use crate::{
    entities::{
        project::{NewProjectRequest, Project, ProjectCreatedResponse, ProjectDetail, UpdateProjectRequest},
        validation::{single_field_error, MIN_SLUG_LENGTH},
    },
    errors::AppError,
    repositories::{
        developer::DeveloperRepository,
        project::{slug_taken, ProjectRepository},
    },
    store::StoreError,
    use_cases::{
        catalog::{all_categories, all_tech_stacks, filter_projects, sort_projects, ProjectFilter, SortDirection, SortKey},
        live,
    },
};

pub struct ProjectHandler<P, D>
where
    P: ProjectRepository,
    D: DeveloperRepository,
{
    pub project_repo: P,
    pub developer_repo: D,
}

/// Orders projects by `createdAt` descending. Projects without a timestamp
/// compare equal to everything, so they keep their original slots.
pub fn sort_newest_first(mut projects: Vec<Project>) -> Vec<Project> {
    let slots: Vec<usize> = projects
        .iter()
        .enumerate()
        .filter(|(_, p)| p.created_at.is_some())
        .map(|(i, _)| i)
        .collect();

    let mut dated: Vec<Project> = slots.iter().map(|&i| projects[i].clone()).collect();
    dated.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    for (slot, project) in slots.into_iter().zip(dated) {
        projects[slot] = project;
    }
    projects
}

/// Runs the indexed query; on a missing index runs `unordered` and sorts in
/// memory.
async fn newest_first_with_fallback<F>(
    context: &'static str,
    indexed: impl Future<Output = Result<Vec<Project>, StoreError>>,
    unordered: impl FnOnce() -> F,
    limit: Option<usize>,
) -> Vec<Project>
where
    F: Future<Output = Result<Vec<Project>, StoreError>>,
{
    let result = match indexed.await {
        Err(StoreError::MissingIndex(index)) => {
            tracing::warn!("{}: index {} missing, sorting in memory", context, index);
            unordered().await.map(|projects| {
                let mut sorted = sort_newest_first(projects);
                if let Some(limit) = limit {
                    sorted.truncate(limit);
                }
                sorted
            })
        }
        other => other,
    };

    result.unwrap_or_else(|e| {
        tracing::error!("{}: {}", context, e);
        Vec::new()
    })
}

impl<P, D> ProjectHandler<P, D>
where
    P: ProjectRepository,
    D: DeveloperRepository,
{
    pub fn new(project_repo: P, developer_repo: D) -> Self {
        ProjectHandler {
            project_repo,
            developer_repo,
        }
    }

    /// Every project, degraded to an empty list when the store fails.
    pub async fn all_projects(&self) -> Vec<Project> {
        self.project_repo.list_all().await.unwrap_or_else(|e| {
            tracing::error!("Failed to list projects: {}", e);
            Vec::new()
        })
    }

    /// Filters, then optionally sorts, the full catalog.
    pub async fn list_projects(
        &self,
        filter: &ProjectFilter,
        sort: Option<(SortKey, SortDirection)>,
    ) -> Vec<Project> {
        let projects = self.all_projects().await;
        let filtered = if filter.is_empty() {
            projects
        } else {
            filter_projects(&projects, filter)
        };

        match sort {
            Some((key, direction)) => sort_projects(&filtered, key, direction),
            None => filtered,
        }
    }

    pub async fn technologies(&self) -> Vec<String> {
        all_tech_stacks(&self.all_projects().await)
    }

    pub async fn categories(&self) -> Vec<String> {
        all_categories(&self.all_projects().await)
    }

    pub async fn get_project(&self, id: &str) -> Option<Project> {
        self.project_repo.find_by_id(id).await.unwrap_or_else(|e| {
            tracing::error!(project_id = %id, "Failed to read project: {}", e);
            None
        })
    }

    pub async fn get_project_by_slug(&self, slug: &str) -> Option<Project> {
        self.project_repo.find_by_slug(slug).await.unwrap_or_else(|e| {
            tracing::error!(slug = %slug, "Failed to read project: {}", e);
            None
        })
    }

    /// The project page for `slug`. A dangling `developerId` yields no developer.
    pub async fn get_project_detail(&self, slug: &str) -> Option<ProjectDetail> {
        let project = self.get_project_by_slug(slug).await?;

        let developer = if project.developer_id.is_empty() {
            None
        } else {
            self.developer_repo
                .find_by_id(&project.developer_id)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!(developer_id = %project.developer_id, "Failed to read developer: {}", e);
                    None
                })
        };

        Some(ProjectDetail { project, developer })
    }

    pub async fn projects_by_category(&self, category: &str) -> Vec<Project> {
        self.project_repo
            .list_by_category(category, None)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(category = %category, "Failed to list projects: {}", e);
                Vec::new()
            })
    }

    /// Up to `limit` featured projects, newest first.
    pub async fn featured_projects(&self, limit: usize) -> Vec<Project> {
        if limit == 0 {
            return Vec::new();
        }
        newest_first_with_fallback(
            "Featured projects",
            self.project_repo.list_featured(limit),
            || self.project_repo.list_featured_unordered(),
            Some(limit),
        )
        .await
    }

    /// A developer's projects, newest first.
    pub async fn projects_by_developer(&self, developer_id: &str) -> Vec<Project> {
        newest_first_with_fallback(
            "Developer projects",
            self.project_repo.list_by_developer(developer_id),
            || self.project_repo.list_by_developer_unordered(developer_id),
            None,
        )
        .await
    }

    /// Up to `count` projects other than `project_id`: same category first,
    /// padded from other categories. Without `category` the source project's
    /// own category is used.
    pub async fn related_projects(
        &self,
        project_id: &str,
        category: Option<&str>,
        count: usize,
    ) -> Vec<Project> {
        if count == 0 {
            return Vec::new();
        }

        let category = match category {
            Some(category) => category.to_string(),
            None => match self.get_project(project_id).await {
                Some(project) => project.category,
                None => return Vec::new(),
            },
        };

        // One extra row covers the source project showing up in the results.
        let mut related: Vec<Project> = match self
            .project_repo
            .list_by_category(&category, Some(count + 1))
            .await
        {
            Ok(same) => same
                .into_iter()
                .filter(|p| p.id != project_id)
                .take(count)
                .collect(),
            Err(e) => {
                tracing::error!(category = %category, "Failed to list related projects: {}", e);
                Vec::new()
            }
        };

        if related.len() < count {
            let remaining = count - related.len();
            match self
                .project_repo
                .list_outside_category(&category, remaining + 1)
                .await
            {
                Ok(others) => {
                    let padding: Vec<Project> = others
                        .into_iter()
                        .filter(|p| p.id != project_id && !related.iter().any(|r| r.id == p.id))
                        .take(remaining)
                        .collect();
                    related.extend(padding);
                }
                Err(e) => {
                    tracing::error!(category = %category, "Failed to pad related projects: {}", e);
                }
            }
        }

        related
    }

    /// Creates a project. The slug comes from the title when absent and must
    /// be unused.
    pub async fn create_project(&self, req: NewProjectRequest) -> Result<ProjectCreatedResponse, AppError> {
        let project = Project::try_from(req)?;

        if slug_taken(&self.project_repo, &project.slug, None).await? {
            return Err(AppError::Conflict(format!(
                "A project with slug '{}' already exists",
                project.slug
            )));
        }

        let id = self.project_repo.insert(&project).await?;
        tracing::info!(project_id = %id, slug = %project.slug, "Project created");

        Ok(ProjectCreatedResponse {
            id,
            slug: project.slug,
        })
    }

    /// Applies a partial update. Rating fields are never touched here.
    pub async fn update_project(&self, id: &str, req: UpdateProjectRequest) -> Result<Project, AppError> {
        req.validate()?;

        let existing = self
            .project_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", id)))?;

        if req.is_empty() {
            return Ok(existing);
        }

        let mut changes = req.to_changes()?;

        let new_slug = if req.regenerates_slug() {
            let title = req.title.value_ref().unwrap_or(&existing.title);
            let generated = slug::slugify(title);
            if generated.len() < MIN_SLUG_LENGTH as usize {
                return Err(single_field_error(
                    "slug",
                    "slug_too_short",
                    "Generated slug is too short; please provide a custom slug",
                )
                .into());
            }
            changes.insert("slug".to_string(), generated.clone().into());
            Some(generated)
        } else {
            req.slug.value_ref().cloned()
        };

        if let Some(slug) = new_slug.filter(|s| *s != existing.slug) {
            if slug_taken(&self.project_repo, &slug, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "A project with slug '{}' already exists",
                    slug
                )));
            }
        }

        self.project_repo.update_fields(id, changes).await?;
        tracing::info!(project_id = %id, "Project updated");

        self.project_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", id)))
    }

    /// Deletes a project. Its comments are left behind, unreachable.
    pub async fn delete_project(&self, id: &str) -> Result<(), AppError> {
        if !self.project_repo.delete(id).await? {
            return Err(AppError::NotFound(format!("Project {} not found", id)));
        }
        tracing::info!(project_id = %id, "Project deleted");
        Ok(())
    }

    /// Live featured listing; each item replaces the previous one.
    pub async fn live_featured(&self, limit: usize) -> BoxStream<'static, Vec<Project>> {
        match self.project_repo.watch_featured(limit).await {
            Ok(live) => live::snapshots(live, "Featured projects"),
            Err(StoreError::MissingIndex(index)) => {
                tracing::warn!("Featured projects: index {} missing, sorting snapshots in memory", index);
                match self.project_repo.watch_featured_unordered().await {
                    Ok(live) => {
                        let sorted = live.map(move |snapshot| {
                            snapshot.map(|projects| {
                                let mut sorted = sort_newest_first(projects);
                                sorted.truncate(limit);
                                sorted
                            })
                        });
                        live::snapshots(sorted, "Featured projects")
                    }
                    Err(e) => live::failed("featured projects", &e),
                }
            }
            Err(e) => live::failed("featured projects", &e),
        }
    }

    pub async fn live_projects(&self) -> BoxStream<'static, Vec<Project>> {
        match self.project_repo.watch_all().await {
            Ok(live) => live::snapshots(live, "Projects"),
            Err(e) => live::failed("projects", &e),
        }
    }
}
