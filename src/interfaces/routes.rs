use actix_web::web;

use crate::handlers::{home::home, system::health_check};

mod admin;
mod auth;
mod comments;
mod developers;
mod json_error;
mod projects;
mod users;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home);

    cfg.service(
        web::scope("/api/v1")
            .service(health_check)
            .configure(projects::config_routes)
            .configure(developers::config_routes)
            .configure(auth::config_routes)
            .configure(users::config_routes)
            .configure(admin::config_routes)
    );

    cfg.configure(json_error::config_routes);
}
