//! Server-sent event endpoints. Each event carries one full JSON snapshot.

use actix_web::{web, HttpResponse, Responder};
use futures::{stream::BoxStream, StreamExt};
use serde::Serialize;
use tracing::instrument;

use crate::{
    constants::MAX_LIST_LIMIT,
    errors::AppError,
    handlers::projects::LimitQuery,
    use_cases::extractors::AuthClaims,
    AppState,
};

fn event<T: Serialize>(snapshot: &T) -> Result<web::Bytes, actix_web::Error> {
    let json = serde_json::to_string(snapshot).map_err(|e| {
        tracing::error!("Failed to encode live snapshot: {}", e);
        actix_web::error::ErrorInternalServerError(e)
    })?;
    Ok(web::Bytes::from(format!("data: {}\n\n", json)))
}

fn event_stream<T>(stream: BoxStream<'static, T>) -> HttpResponse
where
    T: Serialize + Send + 'static,
{
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream.map(|snapshot| event(&snapshot)))
}

#[instrument(skip(state, query))]
pub async fn live_featured(
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> Result<impl Responder, AppError> {
    let limit = query.limit.unwrap_or(state.featured_count).min(MAX_LIST_LIMIT);
    Ok(event_stream(state.project_handler.live_featured(limit).await))
}

#[instrument(skip(state))]
pub async fn live_projects(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    Ok(event_stream(state.project_handler.live_projects().await))
}

#[instrument(skip(state))]
pub async fn live_comments(
    project_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    Ok(event_stream(state.comment_handler.live_comments(&project_id).await))
}

/// Auth-state changes of the signed-in caller, starting with the current state.
#[instrument(skip(claims, state))]
pub async fn live_auth_state(
    claims: AuthClaims,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    Ok(event_stream(state.auth_handler.auth_state_changes(&claims.sub).await))
}
