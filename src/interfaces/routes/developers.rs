use actix_web::web;

use crate::handlers::developers;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/developers")
            .service(
                web::resource("")
                    .route(web::get().to(developers::list_developers))
            )
            .service(
                web::resource("/slug/{slug}")
                    .route(web::get().to(developers::get_developer_by_slug))
            )
            .service(
                web::resource("/{developer_id}/projects")
                    .route(web::get().to(developers::developer_projects))
            )
            .service(
                web::resource("/{developer_id}")
                    .route(web::get().to(developers::get_developer))
            )
    );
}
