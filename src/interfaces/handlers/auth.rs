use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::user::{GoogleSignInRequest, RefreshRequest, SignInRequest, SignOutRequest, SignUpRequest},
    errors::AuthError,
    use_cases::extractors::AuthClaims,
    AppState,
};

#[instrument(skip(state, data))]
pub async fn sign_up(
    state: web::Data<AppState>,
    data: web::Json<SignUpRequest>,
) -> Result<impl Responder, AuthError> {
    let response = state.auth_handler.sign_up(data.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

#[instrument(skip(state, data))]
pub async fn sign_in(
    state: web::Data<AppState>,
    data: web::Json<SignInRequest>,
) -> Result<impl Responder, AuthError> {
    let response = state.auth_handler.sign_in(data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip(state, data))]
pub async fn sign_in_with_google(
    state: web::Data<AppState>,
    data: web::Json<GoogleSignInRequest>,
) -> Result<impl Responder, AuthError> {
    let response = state.auth_handler.sign_in_with_google(data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip(state, data))]
pub async fn refresh_token(
    state: web::Data<AppState>,
    data: web::Json<RefreshRequest>,
) -> Result<impl Responder, AuthError> {
    let response = state.auth_handler.refresh_token(&data.refresh_token).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Revokes the caller's access token and, when given, its refresh token.
#[instrument(skip(claims, state, data))]
pub async fn sign_out(
    claims: AuthClaims,
    state: web::Data<AppState>,
    data: Option<web::Json<SignOutRequest>>,
) -> Result<impl Responder, AuthError> {
    let refresh_token = data.and_then(|body| body.into_inner().refresh_token);

    state
        .auth_handler
        .sign_out(&claims, refresh_token.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({"message": "Signed out successfully"})))
}
