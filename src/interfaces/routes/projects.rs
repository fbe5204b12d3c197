use actix_web::web;

use crate::handlers::{live, projects};

use super::comments;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/projects")
            .service(
                web::resource("")
                    .route(web::get().to(projects::list_projects))
            )
            .service(
                web::resource("/featured")
                    .route(web::get().to(projects::featured_projects))
            )
            .service(
                web::resource("/featured/live")
                    .route(web::get().to(live::live_featured))
            )
            .service(
                web::resource("/live")
                    .route(web::get().to(live::live_projects))
            )
            .service(
                web::resource("/technologies")
                    .route(web::get().to(projects::technologies))
            )
            .service(
                web::resource("/categories")
                    .route(web::get().to(projects::categories))
            )
            .service(
                web::resource("/category/{category}")
                    .route(web::get().to(projects::projects_by_category))
            )
            .service(
                web::resource("/slug/{slug}")
                    .route(web::get().to(projects::get_project_by_slug))
            )
            .configure(comments::config_routes)
            .service(
                web::resource("/{project_id}/related")
                    .route(web::get().to(projects::related_projects))
            )
            .service(
                web::resource("/{project_id}")
                    .route(web::get().to(projects::get_project))
            )
    );
}
