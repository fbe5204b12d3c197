use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::developer::NewDeveloperRequest,
    errors::AppError,
    use_cases::extractors::AdminClaims,
    AppState,
};

#[instrument(skip(state))]
pub async fn list_developers(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(state.developer_handler.list_developers().await))
}

#[instrument(skip(state))]
pub async fn get_developer(
    developer_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let developer = state
        .developer_handler
        .get_developer(&developer_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Developer {} not found", developer_id)))?;

    Ok(HttpResponse::Ok().json(developer))
}

#[instrument(skip(state))]
pub async fn get_developer_by_slug(
    slug: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let developer = state
        .developer_handler
        .get_developer_by_slug(&slug)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Developer '{}' not found", slug)))?;

    Ok(HttpResponse::Ok().json(developer))
}

/// Projects credited to the developer, newest first.
#[instrument(skip(state))]
pub async fn developer_projects(
    developer_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let projects = state.project_handler.projects_by_developer(&developer_id).await;
    Ok(HttpResponse::Ok().json(projects))
}

#[instrument(skip(_claims, state, data))]
pub async fn create_developer(
    _claims: AdminClaims,
    state: web::Data<AppState>,
    data: web::Json<NewDeveloperRequest>,
) -> Result<impl Responder, AppError> {
    let developer = state.developer_handler.create_developer(data.into_inner()).await?;
    Ok(HttpResponse::Created().json(developer))
}
