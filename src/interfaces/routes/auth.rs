use actix_web::web;

use crate::handlers::{auth, live};

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/sign-up", web::post().to(auth::sign_up))
            .route("/sign-in", web::post().to(auth::sign_in))
            .route("/google", web::post().to(auth::sign_in_with_google))
            .route("/refresh", web::post().to(auth::refresh_token))
            .route("/sign-out", web::post().to(auth::sign_out))
            .route("/state/live", web::get().to(live::live_auth_state))
    );
}
