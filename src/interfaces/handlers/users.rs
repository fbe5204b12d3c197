use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::user::UpdateProfileRequest,
    errors::{AppError, AuthError},
    use_cases::extractors::AuthClaims,
    AppState,
};

#[instrument(skip(claims, state))]
pub async fn me(claims: AuthClaims, state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let user = state.auth_handler.current_user(&claims.sub).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[instrument(skip(claims, state, data))]
pub async fn update_me(
    claims: AuthClaims,
    state: web::Data<AppState>,
    data: web::Json<UpdateProfileRequest>,
) -> Result<impl Responder, AuthError> {
    let user = state
        .auth_handler
        .update_profile(&claims, data.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

#[instrument(skip(state))]
pub async fn get_user(
    user_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = state
        .auth_handler
        .get_user(&user_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    Ok(HttpResponse::Ok().json(user))
}
