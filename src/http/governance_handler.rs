use actix_web::{web, HttpResponse, Responder};
use tracing::info;

use super::AppState;
use crate::api_error::ApiError;
use crate::service::{CastVoteDto, CreateProposalDto, DepositDto};

// =============================================================================
// PROPOSALS
// =============================================================================

/// POST /api/daos/{dao}/proposals
pub async fn create_proposal(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<CreateProposalDto>,
) -> Result<impl Responder, ApiError> {
    let dao = path.into_inner();
    info!(dao = %dao, title = %req.title, "Received create proposal request");

    let submission = state
        .governance
        .create_proposal(&dao, req.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(submission))
}

/// POST /api/daos/{dao}/proposals/{id}/execution
pub async fn execute_proposal(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, ApiError> {
    let (dao, proposal_id) = path.into_inner();
    info!(dao = %dao, proposal_id = %proposal_id, "Received execute request");

    let tx = state.governance.execute_proposal(&dao, &proposal_id).await?;
    Ok(HttpResponse::Accepted().json(tx))
}

// =============================================================================
// VOTES
// =============================================================================

/// POST /api/daos/{dao}/proposals/{id}/votes
pub async fn cast_vote(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    req: web::Json<CastVoteDto>,
) -> Result<impl Responder, ApiError> {
    let (dao, proposal_id) = path.into_inner();
    info!(
        dao = %dao,
        proposal_id = %proposal_id,
        voter = %req.voter,
        "Received vote request"
    );

    let tx = state
        .governance
        .cast_vote(&dao, &proposal_id, req.into_inner())
        .await?;
    Ok(HttpResponse::Accepted().json(tx))
}

// =============================================================================
// DEPOSITS
// =============================================================================

/// POST /api/daos/{dao}/deposits
pub async fn deposit(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<DepositDto>,
) -> Result<impl Responder, ApiError> {
    let dao = path.into_inner();
    info!(dao = %dao, sender = %req.sender, "Received deposit request");

    let tx = state.governance.deposit(&dao, req.into_inner()).await?;
    Ok(HttpResponse::Accepted().json(tx))
}
