use actix_web::{web, HttpResponse, Result};
use std::collections::BTreeMap;

use super::AppState;
use crate::api_error::ApiError;

pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let store = state.hooks.store();
    let pending: BTreeMap<&'static str, usize> = store
        .counts()
        .into_iter()
        .map(|(kind, count)| (kind.storage_name(), count))
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "network": store.network(),
        "pending": pending
    })))
}
