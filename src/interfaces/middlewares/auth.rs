use actix_web::{
    body::BoxBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, HttpMessage, ResponseError,
};
use futures_util::future::{ok, Ready, LocalBoxFuture};
use std::{rc::Rc, task::{Context, Poll}};

use crate::{entities::token::Claims, errors::AuthError, repositories::token::TokenServiceRepository, AppState};

const API_PREFIX: &str = "/api/v1";

/// Verifies bearer tokens.
///
/// A valid, unrevoked access token attaches its [`Claims`] to the request on
/// every route. Protected routes additionally reject requests without one,
/// and `/api/v1/admin` requires the admin flag.
pub struct AuthMiddleware;

impl<S> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Rc::new(service),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let protected = requires_auth(req.path(), req.method());

            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                tracing::error!("AppState missing in middleware");
                return Ok(reject(req, AuthError::ProviderUnavailable("auth not initialised".into())));
            };

            let claims = match extract_token(&req) {
                Some(token) => match verify(&state, &token).await {
                    Ok(claims) => Some(claims),
                    Err(e) if protected => {
                        tracing::warn!(path = %req.path(), "Rejected access token: {}", e);
                        return Ok(reject(req, e));
                    }
                    // Public routes ignore a bad token.
                    Err(_) => None,
                },
                None => None,
            };

            match claims {
                Some(claims) => {
                    if is_admin_route(req.path()) && !claims.admin {
                        tracing::warn!(user_id = %claims.sub, path = %req.path(), "Admin access required");
                        return Ok(reject(req, AuthError::Forbidden("Admin access required".into())));
                    }
                    req.extensions_mut().insert(claims);
                }
                None if protected => {
                    tracing::warn!(path = %req.path(), "Missing or malformed Authorization header");
                    return Ok(reject(req, AuthError::MissingCredentials));
                }
                None => {}
            }

            service.call(req).await
        })
    }
}

async fn verify(state: &AppState, token: &str) -> Result<Claims, AuthError> {
    let claims = state.auth_handler.token_service.decode_jwt(token)?.claims;
    if state.auth_handler.is_token_revoked(&claims.jti).await {
        return Err(AuthError::TokenRevoked);
    }
    Ok(claims)
}

fn is_admin_route(path: &str) -> bool {
    path.strip_prefix(API_PREFIX)
        .is_some_and(|rest| rest == "/admin" || rest.starts_with("/admin/"))
}

fn requires_auth(path: &str, method: &Method) -> bool {
    if method == Method::OPTIONS {
        return false;
    }
    let Some(rest) = path.strip_prefix(API_PREFIX) else {
        return false;
    };

    if is_admin_route(path) {
        return true;
    }

    match rest {
        "/users/me" | "/auth/sign-out" | "/auth/state/live" => true,
        // Comment writes: /projects/{id}/comments[/{comment_id}]
        _ => {
            method != Method::GET
                && rest.starts_with("/projects/")
                && rest.split('/').nth(3) == Some("comments")
        }
    }
}

fn extract_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            let parts: Vec<&str> = header.split_whitespace().collect();
            if parts.len() == 2 && parts[0].eq_ignore_ascii_case("bearer") {
                Some(parts[1].to_string())
            } else {
                None
            }
        })
}

fn reject(req: ServiceRequest, error: AuthError) -> ServiceResponse<BoxBody> {
    req.into_response(error.error_response())
}
