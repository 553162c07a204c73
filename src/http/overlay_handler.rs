use actix_web::{web, HttpResponse, Responder};
use tracing::debug;

use super::AppState;
use crate::api_error::ApiError;
use crate::query::Liveness;

// Each request is its own view: alive until the response is produced

/// GET /api/daos/{dao}/proposals
pub async fn list_proposals(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let dao = path.into_inner();
    let result = state.hooks.use_proposal_list(&dao, &Liveness::new()).await;
    debug!(dao = %dao, count = result.data.len(), stale = result.stale, "Served proposal list");
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/daos/{dao}/proposals/{id}
///
/// 404 only when the indexer answered and nothing is pending for the id; a
/// failed fetch returns the (possibly empty) result with its error flag.
pub async fn get_proposal(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, ApiError> {
    let (dao, proposal_id) = path.into_inner();
    let result = state
        .hooks
        .use_proposal(&dao, &proposal_id, &Liveness::new())
        .await;

    if result.data.is_none() && !result.is_error() {
        return Err(ApiError::NotFound);
    }
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/daos/{dao}/transfers
pub async fn list_transfers(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let dao = path.into_inner();
    let result = state.hooks.use_transfer_list(&dao, &Liveness::new()).await;
    Ok(HttpResponse::Ok().json(result))
}
