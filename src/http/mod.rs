pub mod governance_handler;
pub mod health;
pub mod overlay_handler;


use actix_web::web;
use std::sync::Arc;

use crate::query::QueryHooks;
use crate::service::GovernanceService;

/// Shared state handed to every handler
pub struct AppState {
    pub hooks: Arc<QueryHooks>,
    pub governance: GovernanceService,
}

/// Register the `/api` routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .service(
                web::scope("/daos/{dao}")
                    .route("/proposals", web::get().to(overlay_handler::list_proposals))
                    .route("/proposals", web::post().to(governance_handler::create_proposal))
                    .route("/proposals/{id}", web::get().to(overlay_handler::get_proposal))
                    .route(
                        "/proposals/{id}/votes",
                        web::post().to(governance_handler::cast_vote),
                    )
                    .route(
                        "/proposals/{id}/execution",
                        web::post().to(governance_handler::execute_proposal),
                    )
                    .route("/transfers", web::get().to(overlay_handler::list_transfers))
                    .route("/deposits", web::post().to(governance_handler::deposit)),
            ),
    );
}
