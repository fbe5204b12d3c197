use actix_web::web;

use crate::handlers::{comments, live};

/// Comment resources, nested under the `/projects` scope.
pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{project_id}/comments")
            .route(web::get().to(comments::list_comments))
            .route(web::post().to(comments::add_comment))
    )
    .service(
        web::resource("/{project_id}/comments/live")
            .route(web::get().to(live::live_comments))
    )
    .service(
        web::resource("/{project_id}/comments/{comment_id}")
            .route(web::patch().to(comments::update_comment))
            .route(web::delete().to(comments::delete_comment))
    );
}
