use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::comment::{NewCommentRequest, UpdateCommentRequest},
    errors::AppError,
    use_cases::extractors::AuthClaims,
    AppState,
};

#[instrument(skip(state))]
pub async fn list_comments(
    project_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let comments = state.comment_handler.list_comments(&project_id).await;
    Ok(HttpResponse::Ok().json(comments))
}

#[instrument(skip(claims, state, data))]
pub async fn add_comment(
    claims: AuthClaims,
    project_id: web::Path<String>,
    state: web::Data<AppState>,
    data: web::Json<NewCommentRequest>,
) -> Result<impl Responder, AppError> {
    let comment_handler = &state.comment_handler;

    let comment = comment_handler
        .add_comment(&project_id, &claims, data.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(comment))
}

#[instrument(skip(claims, state, data))]
pub async fn update_comment(
    claims: AuthClaims,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
    data: web::Json<UpdateCommentRequest>,
) -> Result<impl Responder, AppError> {
    let (project_id, comment_id) = path.into_inner();

    let comment = state
        .comment_handler
        .update_comment(&project_id, &comment_id, &claims, data.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(comment))
}

#[instrument(skip(claims, state))]
pub async fn delete_comment(
    claims: AuthClaims,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let (project_id, comment_id) = path.into_inner();

    state
        .comment_handler
        .delete_comment(&project_id, &comment_id, &claims)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
