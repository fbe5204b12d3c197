use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    constants::MAX_LIST_LIMIT,
    entities::{
        project::{Complexity, NewProjectRequest, UpdateProjectRequest},
        validation::single_field_error,
    },
    errors::AppError,
    use_cases::{
        catalog::{ProjectFilter, SortDirection, SortKey},
        extractors::AdminClaims,
    },
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct ProjectListQuery {
    #[serde(rename = "type")]
    pub types: Option<String>,
    pub tech: Option<String>,
    pub status: Option<String>,
    pub complexity: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<SortKey>,
    pub direction: Option<SortDirection>,
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

impl ProjectListQuery {
    pub fn to_filter(&self) -> Result<ProjectFilter, AppError> {
        let complexity = split_list(self.complexity.as_deref())
            .iter()
            .map(|c| c.parse::<Complexity>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                AppError::from(single_field_error(
                    "complexity",
                    "invalid_complexity",
                    "Complexity must be beginner, intermediate or advanced",
                ))
            })?;

        Ok(ProjectFilter {
            types: split_list(self.types.as_deref()),
            tech: split_list(self.tech.as_deref()),
            status: split_list(self.status.as_deref()),
            complexity,
            search: self.search.clone(),
        })
    }

    pub fn sort(&self) -> Option<(SortKey, SortDirection)> {
        self.sort_by.map(|key| (key, self.direction.unwrap_or_default()))
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedQuery {
    pub limit: Option<usize>,
    pub category: Option<String>,
}

#[instrument(skip(state, query))]
pub async fn list_projects(
    state: web::Data<AppState>,
    query: web::Query<ProjectListQuery>,
) -> Result<impl Responder, AppError> {
    let project_handler = &state.project_handler;

    let filter = query.to_filter()?;
    let projects = project_handler.list_projects(&filter, query.sort()).await;

    Ok(HttpResponse::Ok().json(projects))
}

#[instrument(skip(state, query))]
pub async fn featured_projects(
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> Result<impl Responder, AppError> {
    let limit = query.limit.unwrap_or(state.featured_count).min(MAX_LIST_LIMIT);

    let projects = state.project_handler.featured_projects(limit).await;
    Ok(HttpResponse::Ok().json(projects))
}

#[instrument(skip(state))]
pub async fn technologies(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(state.project_handler.technologies().await))
}

#[instrument(skip(state))]
pub async fn categories(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(state.project_handler.categories().await))
}

#[instrument(skip(state))]
pub async fn projects_by_category(
    category: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let projects = state.project_handler.projects_by_category(&category).await;
    Ok(HttpResponse::Ok().json(projects))
}

#[instrument(skip(state))]
pub async fn get_project_by_slug(
    slug: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let detail = state
        .project_handler
        .get_project_detail(&slug)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Project '{}' not found", slug)))?;

    Ok(HttpResponse::Ok().json(detail))
}

#[instrument(skip(state))]
pub async fn get_project(
    project_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let project = state
        .project_handler
        .get_project(&project_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project_id)))?;

    Ok(HttpResponse::Ok().json(project))
}

#[instrument(skip(state, query))]
pub async fn related_projects(
    project_id: web::Path<String>,
    state: web::Data<AppState>,
    query: web::Query<RelatedQuery>,
) -> Result<impl Responder, AppError> {
    let count = query.limit.unwrap_or(state.related_count).min(MAX_LIST_LIMIT);

    let projects = state
        .project_handler
        .related_projects(&project_id, query.category.as_deref(), count)
        .await;

    Ok(HttpResponse::Ok().json(projects))
}

#[instrument(skip(_claims, state, data))]
pub async fn create_project(
    _claims: AdminClaims,
    state: web::Data<AppState>,
    data: web::Json<NewProjectRequest>,
) -> Result<impl Responder, AppError> {
    let response = state.project_handler.create_project(data.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

#[instrument(skip(_claims, state, data))]
pub async fn update_project(
    _claims: AdminClaims,
    project_id: web::Path<String>,
    state: web::Data<AppState>,
    data: web::Json<UpdateProjectRequest>,
) -> Result<impl Responder, AppError> {
    let project = state
        .project_handler
        .update_project(&project_id, data.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(project))
}

#[instrument(skip(_claims, state))]
pub async fn delete_project(
    _claims: AdminClaims,
    project_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    state.project_handler.delete_project(&project_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Recomputes the stored rating aggregate from the project's comments.
#[instrument(skip(_claims, state))]
pub async fn recalculate_rating(
    _claims: AdminClaims,
    project_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let summary = state.comment_handler.recalculate_rating(&project_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_lists_become_filter_constraints() {
        let query = ProjectListQuery {
            types: Some("Web App, Mobile App".into()),
            tech: Some("React,,Vue".into()),
            complexity: Some("advanced".into()),
            ..Default::default()
        };

        let filter = query.to_filter().unwrap();
        assert_eq!(filter.types, vec!["Web App", "Mobile App"]);
        assert_eq!(filter.tech, vec!["React", "Vue"]);
        assert_eq!(filter.complexity, vec![Complexity::Advanced]);
        assert!(filter.status.is_empty());
    }

    #[test]
    fn unknown_complexity_is_rejected() {
        let query = ProjectListQuery {
            complexity: Some("expert".into()),
            ..Default::default()
        };
        assert!(matches!(query.to_filter(), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn direction_defaults_to_ascending() {
        let query = ProjectListQuery {
            sort_by: Some(SortKey::Name),
            ..Default::default()
        };
        assert_eq!(query.sort(), Some((SortKey::Name, SortDirection::Asc)));
        assert_eq!(ProjectListQuery::default().sort(), None);
    }
}
