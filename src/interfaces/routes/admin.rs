use actix_web::web;

use crate::handlers::{developers, projects};

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(
                web::resource("/projects")
                    .route(web::post().to(projects::create_project))
            )
            .service(
                web::resource("/projects/{project_id}")
                    .route(web::patch().to(projects::update_project))
                    .route(web::delete().to(projects::delete_project))
            )
            .service(
                web::resource("/projects/{project_id}/rating")
                    .route(web::post().to(projects::recalculate_rating))
            )
            .service(
                web::resource("/developers")
                    .route(web::post().to(developers::create_developer))
            )
    );
}
